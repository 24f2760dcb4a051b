//! Hot storage: entities in memory.

use super::{sort_by_priority, EntityStorage, StorageMode};
use crate::entity::{Entity, Table};
use crate::error::{CoreError, CoreResult};
use crate::event::{FieldDelta, TableDelta};
use crate::schema::Schema;
use async_trait::async_trait;
use entishard_codec::{NList, Nuid, RowKey, Var};
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory index of a hot shard's entities.
#[derive(Debug)]
pub struct EntityManager {
    schema: Arc<Schema>,
    entities: BTreeMap<Nuid, Entity>,
}

impl EntityManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            entities: BTreeMap::new(),
        }
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, id: Nuid) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Inserts an entity, replacing any entity with the same id.
    pub fn insert(&mut self, entity: Entity) -> Option<Entity> {
        self.entities.insert(entity.id(), entity)
    }

    /// Removes an entity.
    pub fn remove(&mut self, id: Nuid) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if there are no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates over entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    fn require(&self, id: Nuid) -> CoreResult<&Entity> {
        self.entities
            .get(&id)
            .ok_or(CoreError::EntityNotFound { id })
    }

    fn require_mut(&mut self, id: Nuid) -> CoreResult<&mut Entity> {
        self.entities
            .get_mut(&id)
            .ok_or(CoreError::EntityNotFound { id })
    }

    fn table(&self, id: Nuid, name: &str) -> CoreResult<&Table> {
        self.require(id)?
            .table(name)
            .ok_or_else(|| CoreError::table_not_found(id, name))
    }

    fn table_mut(&mut self, id: Nuid, name: &str) -> CoreResult<&mut Table> {
        self.require_mut(id)?
            .table_mut(name)
            .ok_or_else(|| CoreError::table_not_found(id, name))
    }
}

#[async_trait]
impl EntityStorage for EntityManager {
    fn mode(&self) -> StorageMode {
        StorageMode::Hot
    }

    async fn exists(&self, id: Nuid) -> CoreResult<bool> {
        Ok(self.entities.contains_key(&id))
    }

    async fn entity_type(&self, id: Nuid) -> CoreResult<Option<String>> {
        Ok(self.get(id).map(|e| e.entity_type().to_string()))
    }

    async fn create(&mut self, id: Nuid, entity_type: &str) -> CoreResult<()> {
        if self.entities.contains_key(&id) {
            return Err(CoreError::EntityExists { id });
        }
        let entity = Entity::generate(id, self.schema.require(entity_type)?)?;
        self.entities.insert(id, entity);
        Ok(())
    }

    async fn destroy(&mut self, id: Nuid) -> CoreResult<()> {
        self.remove(id)
            .map(|_| ())
            .ok_or(CoreError::EntityNotFound { id })
    }

    async fn entity(&self, id: Nuid) -> CoreResult<Option<Entity>> {
        Ok(self.get(id).cloned())
    }

    async fn entities(&self) -> CoreResult<Vec<Entity>> {
        let mut entities: Vec<Entity> = self.entities.values().cloned().collect();
        sort_by_priority(&self.schema, &mut entities, |e| (e.id(), e.entity_type()));
        Ok(entities)
    }

    async fn ids(&self) -> CoreResult<Vec<Nuid>> {
        let mut ids: Vec<(Nuid, &str)> = self
            .entities
            .values()
            .map(|e| (e.id(), e.entity_type()))
            .collect();
        sort_by_priority(&self.schema, &mut ids, |(id, t)| (*id, *t));
        Ok(ids.into_iter().map(|(id, _)| id).collect())
    }

    fn is_activated(&self, id: Nuid) -> bool {
        self.get(id).is_some_and(Entity::is_activated)
    }

    async fn set_activated(&mut self, id: Nuid, activated: bool) -> CoreResult<bool> {
        Ok(match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.set_activated(activated);
                true
            }
            None => false,
        })
    }

    fn clear_activated(&mut self) {
        for entity in self.entities.values_mut() {
            entity.set_activated(false);
        }
    }

    async fn get_field(&self, id: Nuid, name: &str) -> CoreResult<Var> {
        self.require(id)?
            .field(name)
            .map(|f| f.value().clone())
            .ok_or_else(|| CoreError::field_not_found(id, name))
    }

    async fn set_field(&mut self, id: Nuid, name: &str, value: Var) -> CoreResult<Option<FieldDelta>> {
        self.require_mut(id)?
            .field_mut(name)
            .ok_or_else(|| CoreError::field_not_found(id, name))?
            .set(value)
    }

    async fn set_row(&mut self, id: Nuid, table: &str, key: RowKey, row: NList) -> CoreResult<TableDelta> {
        self.table_mut(id, table)?.set_row(key, row)
    }

    async fn delete_row(&mut self, id: Nuid, table: &str, key: &RowKey) -> CoreResult<TableDelta> {
        self.table_mut(id, table)?.delete_row(key)
    }

    async fn set_col(
        &mut self,
        id: Nuid,
        table: &str,
        key: &RowKey,
        col: usize,
        value: Var,
    ) -> CoreResult<Option<TableDelta>> {
        self.table_mut(id, table)?.set_col(key, col, value)
    }

    async fn get_col(&self, id: Nuid, table: &str, key: &RowKey, col: usize) -> CoreResult<Option<Var>> {
        Ok(self.table(id, table)?.get_col(key, col).cloned())
    }

    async fn get_row(&self, id: Nuid, table: &str, key: &RowKey) -> CoreResult<Option<NList>> {
        Ok(self.table(id, table)?.row(key).cloned())
    }

    async fn keys(&self, id: Nuid, table: &str) -> CoreResult<Vec<RowKey>> {
        Ok(self.table(id, table)?.keys())
    }

    async fn clear_table(&mut self, id: Nuid, table: &str) -> CoreResult<()> {
        self.table_mut(id, table)?.clear();
        Ok(())
    }

    async fn load(&mut self, entities: Vec<Entity>) -> CoreResult<Vec<Nuid>> {
        Ok(entities
            .into_iter()
            .map(|entity| {
                let id = entity.id();
                self.insert(entity);
                id
            })
            .collect())
    }
}
