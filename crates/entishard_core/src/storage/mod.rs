//! Entity storage backends.
//!
//! A node owns exactly one [`EntityStorage`], chosen when the node
//! activates from the shard's persisted [`StorageMode`]:
//!
//! - [`EntityManager`] keeps entities in the node's memory (hot)
//! - [`CacheAdapter`] keeps them as hashes in a remote cache (cold)
//!
//! Both backends enforce the same schema rules and return the same deltas,
//! so the node's callback and sync pipeline does not depend on the mode.

mod cache;
mod manager;

pub use cache::CacheAdapter;
pub use manager::EntityManager;

use crate::entity::Entity;
use crate::error::CoreResult;
use crate::event::{FieldDelta, TableDelta};
use crate::schema::Schema;
use async_trait::async_trait;
use entishard_codec::{NList, Nuid, RowKey, Var};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Where a shard keeps its live entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// In the node's memory.
    Hot,
    /// In the remote cache.
    Cold,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Hot => write!(f, "hot"),
            StorageMode::Cold => write!(f, "cold"),
        }
    }
}

/// Entity state owned by one node.
///
/// Every mutation either applies completely and returns its delta, or fails
/// and leaves state untouched. Absent entities, fields, tables and rows are
/// errors; the node turns them into logged no-ops.
#[async_trait]
pub trait EntityStorage: Send + Sync {
    /// The backend's mode.
    fn mode(&self) -> StorageMode;

    /// Returns true if the entity exists.
    async fn exists(&self, id: Nuid) -> CoreResult<bool>;

    /// Returns the entity's type name.
    async fn entity_type(&self, id: Nuid) -> CoreResult<Option<String>>;

    /// Creates an entity with every declared field and table.
    async fn create(&mut self, id: Nuid, entity_type: &str) -> CoreResult<()>;

    /// Removes an entity and all of its state.
    async fn destroy(&mut self, id: Nuid) -> CoreResult<()>;

    /// Materializes one entity.
    async fn entity(&self, id: Nuid) -> CoreResult<Option<Entity>>;

    /// Materializes every entity, highest priority first.
    async fn entities(&self) -> CoreResult<Vec<Entity>>;

    /// Every entity id, highest priority first.
    async fn ids(&self) -> CoreResult<Vec<Nuid>>;

    /// Whether the entity is visible to the node's client.
    fn is_activated(&self, id: Nuid) -> bool;

    /// Sets the activation flag. Returns false if the entity does not exist.
    async fn set_activated(&mut self, id: Nuid, activated: bool) -> CoreResult<bool>;

    /// Clears every activation flag.
    fn clear_activated(&mut self);

    /// Reads a field.
    async fn get_field(&self, id: Nuid, name: &str) -> CoreResult<Var>;

    /// Writes a field. `None` means the value was unchanged.
    async fn set_field(&mut self, id: Nuid, name: &str, value: Var) -> CoreResult<Option<FieldDelta>>;

    /// Inserts or replaces a row.
    async fn set_row(&mut self, id: Nuid, table: &str, key: RowKey, row: NList) -> CoreResult<TableDelta>;

    /// Deletes a row.
    async fn delete_row(&mut self, id: Nuid, table: &str, key: &RowKey) -> CoreResult<TableDelta>;

    /// Writes one column. `None` means the value was unchanged.
    async fn set_col(
        &mut self,
        id: Nuid,
        table: &str,
        key: &RowKey,
        col: usize,
        value: Var,
    ) -> CoreResult<Option<TableDelta>>;

    /// Reads one column.
    async fn get_col(&self, id: Nuid, table: &str, key: &RowKey, col: usize) -> CoreResult<Option<Var>>;

    /// Reads a row.
    async fn get_row(&self, id: Nuid, table: &str, key: &RowKey) -> CoreResult<Option<NList>>;

    /// Every key of a table, in order.
    async fn keys(&self, id: Nuid, table: &str) -> CoreResult<Vec<RowKey>>;

    /// Removes every row of a table.
    async fn clear_table(&mut self, id: Nuid, table: &str) -> CoreResult<()>;

    /// Installs entities restored from a snapshot.
    ///
    /// Returns the ids that became live in this backend and should receive
    /// a load callback.
    async fn load(&mut self, entities: Vec<Entity>) -> CoreResult<Vec<Nuid>>;
}

/// Priority of a type; unknown types sort last.
pub(crate) fn priority(schema: &Schema, entity_type: &str) -> i32 {
    schema.get(entity_type).map_or(i32::MIN, |p| p.priority)
}

/// Sorts by priority descending, then id ascending.
pub(crate) fn sort_by_priority<T>(schema: &Schema, items: &mut [T], key: impl Fn(&T) -> (Nuid, &str)) {
    items.sort_by_cached_key(|item| {
        let (id, entity_type) = key(item);
        (Reverse(priority(schema, entity_type)), id)
    });
}
