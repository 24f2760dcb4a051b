//! Schema command implementation.

use super::load_schema;
use entishard_core::{EntityPrefab, Schema};
use serde::Serialize;
use std::path::Path;

/// Description of one entity type.
#[derive(Debug, Serialize)]
pub struct TypeSummary {
    /// Type name.
    pub entity_type: String,
    /// Listing priority.
    pub priority: i32,
    /// Types receiving callbacks, in call order.
    pub dispatch_chain: Vec<String>,
    /// Declared fields.
    pub fields: Vec<String>,
    /// Declared tables.
    pub tables: Vec<String>,
}

/// Runs the schema command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let schema = load_schema(path)?;
    let types = describe(&schema);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&types)?);
        }
        _ => {
            println!("Schema {} is valid: {} types", path.display(), types.len());
            for t in &types {
                println!();
                println!("{} (priority {})", t.entity_type, t.priority);
                println!("  dispatch: {}", t.dispatch_chain.join(" -> "));
                for field in &t.fields {
                    println!("  field {field}");
                }
                for table in &t.tables {
                    println!("  table {table}");
                }
            }
        }
    }

    Ok(())
}

/// Describes every type, highest priority first, then by name.
pub fn describe(schema: &Schema) -> Vec<TypeSummary> {
    let mut types: Vec<TypeSummary> = schema.prefabs().map(summarize).collect();
    types.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.entity_type.cmp(&b.entity_type))
    });
    types
}

fn summarize(prefab: &EntityPrefab) -> TypeSummary {
    TypeSummary {
        entity_type: prefab.entity_type.clone(),
        priority: prefab.priority,
        dispatch_chain: prefab.dispatch_chain().map(String::from).collect(),
        fields: prefab
            .fields
            .iter()
            .map(|f| format!("{}: {}{}", f.name, f.var_type, flags(f.save, f.sync)))
            .collect(),
        tables: prefab
            .tables
            .iter()
            .map(|t| {
                let columns: Vec<String> = t
                    .columns
                    .iter()
                    .map(|c| format!("{}: {}", c.name, c.var_type))
                    .collect();
                format!(
                    "{}[{}] ({}){}",
                    t.name,
                    t.primary_key,
                    columns.join(", "),
                    flags(t.save, t.sync)
                )
            })
            .collect(),
    }
}

fn flags(save: bool, sync: bool) -> &'static str {
    match (save, sync) {
        (true, true) => " [save, sync]",
        (true, false) => " [save]",
        (false, true) => " [sync]",
        (false, false) => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"[
        {"type": "base", "fields": [{"name": "hp", "type": "int", "save": true}]},
        {
            "type": "player",
            "priority": 10,
            "ancestors": ["base"],
            "fields": [{"name": "level", "type": "int", "save": true, "sync": true}],
            "tables": [{
                "name": "quest_table",
                "primary_key": "int",
                "columns": [{"name": "status", "type": "int"}]
            }]
        }
    ]"#;

    #[test]
    fn describe_orders_by_priority() {
        let schema = Schema::from_json(SCHEMA).unwrap();
        let types = describe(&schema);
        assert_eq!(types[0].entity_type, "player");
        assert_eq!(types[0].dispatch_chain, vec!["base", "player"]);
        assert_eq!(types[0].fields, vec!["level: int [save, sync]"]);
        assert_eq!(types[0].tables, vec!["quest_table[int] (status: int)"]);
        assert_eq!(types[1].entity_type, "base");
    }

    #[test]
    fn load_schema_rejects_missing_ancestor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"[{"type": "orphan", "ancestors": ["nobody"]}]"#).unwrap();
        assert!(load_schema(&path).is_err());

        std::fs::write(&path, SCHEMA).unwrap();
        assert_eq!(load_schema(&path).unwrap().len(), 2);
    }
}
