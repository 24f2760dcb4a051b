//! CLI command implementations.

pub mod inspect;
pub mod schema;

use entishard_core::Schema;
use std::path::Path;
use tracing::debug;

/// Reads and validates a schema file.
pub fn load_schema(path: &Path) -> Result<Schema, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read schema {}: {e}", path.display()))?;
    let schema = Schema::from_json(&text)?;
    schema.validate()?;
    debug!(path = %path.display(), types = schema.len(), "schema loaded");
    Ok(schema)
}
