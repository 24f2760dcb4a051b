//! entishard CLI
//!
//! Command-line tools for inspecting entishard state offline.
//!
//! # Commands
//!
//! - `inspect` - Summarize shard snapshots in a file document store
//! - `schema` - Validate and describe a schema file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// entishard command-line tools.
#[derive(Parser)]
#[command(name = "entishard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the shard snapshots in a document store directory
    Inspect {
        /// Document store directory
        dir: PathBuf,

        /// Only this shard (default: every shard in the directory)
        #[arg(short, long)]
        origin: Option<i64>,

        /// List every entity with its saved fields
        #[arg(short, long)]
        entities: bool,

        /// Check saved entities against this schema file
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate a schema file and describe its types
    Schema {
        /// Schema file (JSON array of entity prefabs)
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect {
            dir,
            origin,
            entities,
            schema,
            format,
        } => {
            commands::inspect::run(&dir, origin, entities, schema.as_deref(), &format)?;
        }
        Commands::Schema { file, format } => {
            commands::schema::run(&file, &format)?;
        }
        Commands::Version => {
            println!("entishard CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("entishard core v{}", entishard_core::VERSION);
        }
    }

    Ok(())
}
