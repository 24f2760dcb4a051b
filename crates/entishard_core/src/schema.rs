//! Entity schema registry.
//!
//! A [`Schema`] maps entity type names to [`EntityPrefab`]s. Prefabs declare
//! the fields and tables every entity of a type carries, which of them are
//! persisted (`save`) and pushed to clients (`sync`), the table key and
//! column types, and the ancestor chain used to fan callbacks out to more
//! general handlers.
//!
//! Schemas are loaded once, before any node activates, and are read-only
//! afterwards. They can be built in code or read from JSON:
//!
//! ```json
//! [{
//!   "type": "player",
//!   "priority": 10,
//!   "ancestors": ["role"],
//!   "fields": [{"name": "level", "type": "int", "save": true, "sync": true}],
//!   "tables": [{
//!     "name": "quest_table", "primary_key": "int", "save": true,
//!     "columns": [{"name": "status", "type": "int"}, {"name": "accept_time", "type": "long"}]
//!   }]
//! }]
//! ```

use crate::error::{CoreError, CoreResult};
use entishard_codec::{KeyType, VarType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::iter;
use std::sync::Arc;

/// Declaration of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPrefab {
    /// Field name, unique within the entity type.
    pub name: String,
    /// Value type.
    #[serde(rename = "type")]
    pub var_type: VarType,
    /// Included in persistence snapshots.
    #[serde(default)]
    pub save: bool,
    /// Changes are pushed to the bound client.
    #[serde(default)]
    pub sync: bool,
}

impl FieldPrefab {
    /// Declares a field that is neither saved nor synced.
    pub fn new(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: name.into(),
            var_type,
            save: false,
            sync: false,
        }
    }

    /// Marks the field as persisted.
    #[must_use]
    pub fn save(mut self) -> Self {
        self.save = true;
        self
    }

    /// Marks the field as synced.
    #[must_use]
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }
}

/// Declaration of one table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPrefab {
    /// Column name, used as the key in persisted rows.
    pub name: String,
    /// Value type.
    #[serde(rename = "type")]
    pub var_type: VarType,
}

/// Declaration of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePrefab {
    /// Table name, unique within the entity type.
    pub name: String,
    /// Declared primary-key type. Must be one of the [`KeyType`]s.
    pub primary_key: VarType,
    /// Ordered columns of every row.
    #[serde(default)]
    pub columns: Vec<ColumnPrefab>,
    /// Included in persistence snapshots.
    #[serde(default)]
    pub save: bool,
    /// Changes are pushed to the bound client.
    #[serde(default)]
    pub sync: bool,
}

impl TablePrefab {
    /// Declares a table without columns that is neither saved nor synced.
    pub fn new(name: impl Into<String>, primary_key: VarType) -> Self {
        Self {
            name: name.into(),
            primary_key,
            columns: Vec::new(),
            save: false,
            sync: false,
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, var_type: VarType) -> Self {
        self.columns.push(ColumnPrefab {
            name: name.into(),
            var_type,
        });
        self
    }

    /// Marks the table as persisted.
    #[must_use]
    pub fn save(mut self) -> Self {
        self.save = true;
        self
    }

    /// Marks the table as synced.
    #[must_use]
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    /// Returns the key type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if the declared key type cannot key a table.
    pub fn key_type(&self) -> CoreResult<KeyType> {
        KeyType::from_var_type(self.primary_key).ok_or_else(|| {
            CoreError::invalid_schema(format!(
                "table {} cannot be keyed by {}",
                self.name, self.primary_key
            ))
        })
    }

    /// Returns the column types in order.
    #[must_use]
    pub fn column_types(&self) -> Vec<VarType> {
        self.columns.iter().map(|c| c.var_type).collect()
    }
}

/// Declaration of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPrefab {
    /// Type name.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Ordering weight for entity listings; higher comes first.
    #[serde(default)]
    pub priority: i32,
    /// Ancestor types, nearest first. Used only for callback dispatch.
    #[serde(default)]
    pub ancestors: Vec<String>,
    /// Field declarations.
    #[serde(default)]
    pub fields: Vec<FieldPrefab>,
    /// Table declarations.
    #[serde(default)]
    pub tables: Vec<TablePrefab>,
}

impl EntityPrefab {
    /// Declares an entity type with no fields, tables or ancestors.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            priority: 0,
            ancestors: Vec::new(),
            fields: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Sets the listing priority.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Appends an ancestor, farther than those already declared.
    #[must_use]
    pub fn ancestor(mut self, entity_type: impl Into<String>) -> Self {
        self.ancestors.push(entity_type.into());
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldPrefab) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends a table.
    #[must_use]
    pub fn table(mut self, table: TablePrefab) -> Self {
        self.tables.push(table);
        self
    }

    /// Looks up a field declaration.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldPrefab> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a table declaration.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TablePrefab> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Type names that receive a callback for this type, in call order.
    ///
    /// The farthest ancestor comes first, the nearest just before the type
    /// itself, which is last.
    pub fn dispatch_chain(&self) -> impl Iterator<Item = &str> {
        self.ancestors
            .iter()
            .rev()
            .map(String::as_str)
            .chain(iter::once(self.entity_type.as_str()))
    }

    /// Checks names are unique and every table key type is valid.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` describing the first problem found.
    pub fn validate(&self) -> CoreResult<()> {
        if self.entity_type.is_empty() {
            return Err(CoreError::invalid_schema("entity type name is empty"));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(CoreError::invalid_schema(format!(
                    "{}: duplicate field {}",
                    self.entity_type, field.name
                )));
            }
        }
        for (i, table) in self.tables.iter().enumerate() {
            if self.tables[..i].iter().any(|t| t.name == table.name) {
                return Err(CoreError::invalid_schema(format!(
                    "{}: duplicate table {}",
                    self.entity_type, table.name
                )));
            }
            table.key_type()?;
        }
        Ok(())
    }
}

/// The registry of entity prefabs.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    prefabs: HashMap<String, Arc<EntityPrefab>>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a prefab, builder style. A later prefab replaces an earlier one
    /// with the same type name.
    #[must_use]
    pub fn with(mut self, prefab: EntityPrefab) -> Self {
        self.register(prefab);
        self
    }

    /// Adds a prefab.
    pub fn register(&mut self, prefab: EntityPrefab) {
        self.prefabs
            .insert(prefab.entity_type.clone(), Arc::new(prefab));
    }

    /// Parses a JSON array of prefabs.
    ///
    /// Prefabs are not validated here; see [`Schema::validate`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if the JSON does not describe prefabs.
    pub fn from_json(text: &str) -> CoreResult<Self> {
        let prefabs: Vec<EntityPrefab> = serde_json::from_str(text)
            .map_err(|e| CoreError::invalid_schema(e.to_string()))?;
        Ok(prefabs.into_iter().fold(Self::new(), Self::with))
    }

    /// Looks up the prefab of an entity type.
    #[must_use]
    pub fn get(&self, entity_type: &str) -> Option<&Arc<EntityPrefab>> {
        self.prefabs.get(entity_type)
    }

    /// Looks up a prefab, failing for unknown types.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` if the type is not registered.
    pub fn require(&self, entity_type: &str) -> CoreResult<&Arc<EntityPrefab>> {
        self.get(entity_type)
            .ok_or_else(|| CoreError::unknown_type(entity_type))
    }

    /// Iterates over all prefabs, in no particular order.
    pub fn prefabs(&self) -> impl Iterator<Item = &EntityPrefab> {
        self.prefabs.values().map(AsRef::as_ref)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    /// Returns true if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }

    /// Validates every prefab and checks that ancestors are registered.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` describing the first problem found.
    pub fn validate(&self) -> CoreResult<()> {
        let mut names: Vec<&String> = self.prefabs.keys().collect();
        names.sort();
        for name in names {
            let prefab = &self.prefabs[name];
            prefab.validate()?;
            if let Some(missing) = prefab.ancestors.iter().find(|a| !self.prefabs.contains_key(*a)) {
                return Err(CoreError::invalid_schema(format!(
                    "{name}: unknown ancestor {missing}"
                )));
            }
        }
        Ok(())
    }
}
