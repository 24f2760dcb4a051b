//! Entity model.
//!
//! An [`Entity`] is an id, a type name, and the fields and tables its
//! prefab declares. Entities are created complete: every declared field
//! holds the null value of its type and every declared table exists, empty.

mod field;
mod table;

pub use field::Field;
pub use table::Table;

pub(crate) use field::check_value;
pub(crate) use table::{check_col, check_key, check_row};

use crate::error::CoreResult;
use crate::schema::EntityPrefab;
use entishard_codec::Nuid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A schema-shaped entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    id: Nuid,
    #[serde(rename = "type")]
    entity_type: String,
    fields: BTreeMap<String, Field>,
    tables: BTreeMap<String, Table>,
    #[serde(skip)]
    activated: bool,
}

impl Entity {
    /// Generates an entity with every declared field and table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if a table declares an unusable key type.
    pub fn generate(id: Nuid, prefab: &EntityPrefab) -> CoreResult<Self> {
        let fields = prefab
            .fields
            .iter()
            .map(|f| (f.name.clone(), Field::new(f.name.as_str(), f.var_type)))
            .collect();
        let tables = prefab
            .tables
            .iter()
            .map(|t| Ok((t.name.clone(), Table::from_prefab(t)?)))
            .collect::<CoreResult<_>>()?;
        Ok(Self {
            id,
            entity_type: prefab.entity_type.clone(),
            fields,
            tables,
            activated: false,
        })
    }

    /// Entity id.
    #[must_use]
    pub fn id(&self) -> Nuid {
        self.id
    }

    /// Type name.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Looks up a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub(crate) fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.get_mut(name)
    }

    /// Iterates over fields by name.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Looks up a table.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub(crate) fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Iterates over tables by name.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Whether the entity is visible to the node's client.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub(crate) fn set_activated(&mut self, activated: bool) {
        self.activated = activated;
    }
}

/// Equality compares id, type and state; the activation flag is runtime
/// bookkeeping and is ignored.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.entity_type == other.entity_type
            && self.fields == other.fields
            && self.tables == other.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldPrefab, TablePrefab};
    use entishard_codec::{NList, RowKey, Var, VarType};

    fn player() -> EntityPrefab {
        EntityPrefab::new("player")
            .field(FieldPrefab::new("level", VarType::Int).save())
            .field(FieldPrefab::new("nick_name", VarType::String))
            .table(
                TablePrefab::new("quest_table", VarType::Int)
                    .column("status", VarType::Int)
                    .column("accept_time", VarType::Long),
            )
    }

    #[test]
    fn entity_generate_is_complete() {
        let entity = Entity::generate(Nuid::new(1, 7), &player()).unwrap();
        assert_eq!(entity.entity_type(), "player");
        assert_eq!(entity.field("level").unwrap().value(), &Var::Int(0));
        assert_eq!(
            entity.field("nick_name").unwrap().value(),
            &Var::Str(String::new())
        );
        let table = entity.table("quest_table").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns(), &[VarType::Int, VarType::Long]);
        assert!(!entity.is_activated());
    }

    #[test]
    fn entity_generate_rejects_bad_key() {
        let prefab = EntityPrefab::new("bad").table(TablePrefab::new("t", VarType::Float));
        assert!(Entity::generate(Nuid::new(1, 1), &prefab).is_err());
    }

    #[test]
    fn entity_equality_ignores_activation() {
        let mut a = Entity::generate(Nuid::new(1, 7), &player()).unwrap();
        let b = a.clone();
        a.set_activated(true);
        assert_eq!(a, b);
        a.table_mut("quest_table")
            .unwrap()
            .set_row(RowKey::Int(1), NList::new().with(0).with(0i64))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn entity_json_roundtrip() {
        let mut entity = Entity::generate(Nuid::new(3, 7), &player()).unwrap();
        entity.field_mut("level").unwrap().set(Var::Int(9)).unwrap();
        let text = serde_json::to_string(&entity).unwrap();
        let back: Entity = serde_json::from_str(&text).unwrap();
        assert_eq!(back, entity);
    }
}
