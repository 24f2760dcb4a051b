//! Inspect command implementation.

use super::load_schema;
use entishard_core::{EntityDocument, Schema, ShardDocument, StorageMode};
use entishard_storage::FileDocumentStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store directory.
    pub path: String,
    /// One summary per shard.
    pub shards: Vec<ShardSummary>,
}

/// Summary of one shard document.
#[derive(Debug, Serialize)]
pub struct ShardSummary {
    /// Shard id.
    pub origin: i64,
    /// Recorded storage mode.
    pub storage_mode: StorageMode,
    /// Document size in bytes.
    pub size: u64,
    /// Number of saved entities.
    pub entity_count: usize,
    /// Entity count per type.
    pub types: BTreeMap<String, usize>,
    /// Schema violations (only with a schema).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    /// Saved entities (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<EntityDocument>>,
}

/// Runs the inspect command.
pub fn run(
    dir: &Path,
    origin: Option<i64>,
    show_entities: bool,
    schema: Option<&Path>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = schema.map(load_schema).transpose()?;
    let result = inspect(dir, origin, show_entities, schema.as_ref())?;
    tracing::debug!(dir = %dir.display(), shards = result.shards.len(), "inspected shard documents");

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Reads and summarizes the shard documents in `dir`.
pub fn inspect(
    dir: &Path,
    origin: Option<i64>,
    show_entities: bool,
    schema: Option<&Schema>,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let store = FileDocumentStore::open_read_only(dir)?;
    let origins = match origin {
        Some(origin) => vec![origin],
        None => store.shards_blocking()?,
    };

    let mut shards = Vec::with_capacity(origins.len());
    for origin in origins {
        let bytes = store
            .read_blocking(origin)?
            .ok_or_else(|| format!("No document for shard {origin} in {}", dir.display()))?;
        let doc = ShardDocument::decode(&bytes)?;
        let mut summary = summarize(&doc, bytes.len() as u64, show_entities);
        if doc.origin != origin {
            summary
                .issues
                .push(format!("document records origin {}", doc.origin));
        }
        if let Some(schema) = schema {
            summary.issues.extend(check(&doc, schema));
        }
        shards.push(summary);
    }

    Ok(InspectResult {
        path: dir.display().to_string(),
        shards,
    })
}

fn summarize(doc: &ShardDocument, size: u64, show_entities: bool) -> ShardSummary {
    let mut types = BTreeMap::new();
    for entity in &doc.entities {
        *types.entry(entity.entity_type.clone()).or_insert(0) += 1;
    }
    ShardSummary {
        origin: doc.origin,
        storage_mode: doc.storage_mode,
        size,
        entity_count: doc.entities.len(),
        types,
        issues: Vec::new(),
        entities: show_entities.then(|| doc.entities.clone()),
    }
}

/// Lists what a node would drop or reset when loading `doc` under `schema`.
fn check(doc: &ShardDocument, schema: &Schema) -> Vec<String> {
    let mut issues = Vec::new();
    for entity in &doc.entities {
        let at = format!("{}#{}", entity.entity_type, entity.unique);
        let Some(prefab) = schema.get(&entity.entity_type) else {
            issues.push(format!("{at}: unknown type"));
            continue;
        };
        for (name, value) in &entity.fields {
            match prefab.get_field(name) {
                None => issues.push(format!("{at}: undeclared field {name}")),
                Some(field) if !value.is(field.var_type) => issues.push(format!(
                    "{at}: field {name} holds {}, declared {}",
                    value.var_type(),
                    field.var_type
                )),
                Some(field) if !field.save => {
                    issues.push(format!("{at}: field {name} is not saved"));
                }
                Some(_) => {}
            }
        }
        for (name, rows) in &entity.tables {
            let Some(table) = prefab.get_table(name) else {
                issues.push(format!("{at}: undeclared table {name}"));
                continue;
            };
            let Ok(key_type) = table.key_type() else {
                continue;
            };
            for row in rows {
                if row.key.key_type() != key_type {
                    issues.push(format!("{at}: {name} key {} is not {key_type:?}", row.key));
                }
                for column in &table.columns {
                    match row.columns.get(&column.name) {
                        Some(value) if value.is(column.var_type) => {}
                        _ => issues.push(format!(
                            "{at}: {name}[{}].{} missing or mistyped",
                            row.key, column.name
                        )),
                    }
                }
            }
        }
    }
    issues
}

fn print_text_output(result: &InspectResult) {
    println!("entishard Store Inspection");
    println!("==========================");
    println!();
    println!("Path:   {}", result.path);
    println!("Shards: {}", result.shards.len());

    for shard in &result.shards {
        println!();
        println!("Shard {}:", shard.origin);
        println!("  Storage mode: {}", shard.storage_mode);
        println!("  Size:         {} bytes", shard.size);
        println!("  Entities:     {}", shard.entity_count);
        for (entity_type, count) in &shard.types {
            println!("    {entity_type}: {count}");
        }
        if let Some(entities) = &shard.entities {
            println!("  Saved entities:");
            for entity in entities {
                println!("    [{}] {}", entity.unique, entity.entity_type);
                for (name, value) in &entity.fields {
                    println!("      {name} = {value}");
                }
                for (name, rows) in &entity.tables {
                    println!("      {name}: {} rows", rows.len());
                }
            }
        }
        if !shard.issues.is_empty() {
            println!("  Issues:");
            for issue in &shard.issues {
                println!("    {issue}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entishard_codec::{RowKey, Var, VarType};
    use entishard_core::{EntityPrefab, FieldPrefab, RowDocument, TablePrefab};
    use tempfile::TempDir;

    fn document() -> ShardDocument {
        let mut player = EntityDocument {
            unique: 1,
            entity_type: "player".to_string(),
            fields: BTreeMap::new(),
            tables: BTreeMap::new(),
        };
        player.fields.insert("level".to_string(), Var::Int(3));
        player.fields.insert("mood".to_string(), Var::Int(1));
        player.tables.insert(
            "quest_table".to_string(),
            vec![RowDocument {
                key: RowKey::Int(1),
                columns: BTreeMap::from([("status".to_string(), Var::Str("done".to_string()))]),
            }],
        );
        let ghost = EntityDocument {
            unique: 2,
            entity_type: "ghost".to_string(),
            fields: BTreeMap::new(),
            tables: BTreeMap::new(),
        };
        ShardDocument {
            origin: 5,
            storage_mode: StorageMode::Hot,
            entities: vec![player, ghost],
        }
    }

    fn schema() -> Schema {
        Schema::new().with(
            EntityPrefab::new("player")
                .field(FieldPrefab::new("level", VarType::Int).save())
                .table(
                    TablePrefab::new("quest_table", VarType::Int)
                        .column("status", VarType::Int)
                        .save(),
                ),
        )
    }

    #[test]
    fn check_reports_every_mismatch() {
        let issues = check(&document(), &schema());
        assert_eq!(issues.len(), 3);
        assert!(issues[0].contains("undeclared field mood"));
        assert!(issues[1].contains("quest_table[1].status"));
        assert!(issues[2].contains("ghost#2: unknown type"));
    }

    #[test]
    fn inspect_reads_store_directory() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::open_read_only(dir.path()).unwrap();
        std::fs::write(store.document_path(5), document().encode().unwrap()).unwrap();

        let result = inspect(dir.path(), None, true, Some(&schema())).unwrap();
        assert_eq!(result.shards.len(), 1);
        let shard = &result.shards[0];
        assert_eq!(shard.entity_count, 2);
        assert_eq!(shard.types.get("player"), Some(&1));
        assert_eq!(shard.issues.len(), 3);
        assert_eq!(shard.entities.as_ref().map(Vec::len), Some(2));

        assert!(inspect(dir.path(), Some(6), false, None).is_err());
    }
}
