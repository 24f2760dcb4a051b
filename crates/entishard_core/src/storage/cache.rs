//! Cold storage: entities as hashes in the remote cache.
//!
//! Layout, all in database `origin mod N`:
//!
//! | key | hash field | value |
//! |---|---|---|
//! | `entities:{origin}` | `unique` | type name |
//! | `fields:{unique}:{origin}` | field name | JSON value |
//! | `table:{unique}:{origin}:{name}` | key string | JSON row |
//!
//! The type hash is the authoritative existence check. Missing field hash
//! entries read as the type's null value.

use super::{sort_by_priority, EntityStorage, StorageMode};
use crate::entity::{check_col, check_key, check_row, check_value, Entity};
use crate::error::{CoreError, CoreResult};
use crate::event::{FieldDelta, TableDelta};
use crate::schema::{EntityPrefab, FieldPrefab, Schema, TablePrefab};
use async_trait::async_trait;
use entishard_codec::{json, CodecError, NList, Nuid, RowKey, Var};
use entishard_storage::{CacheClient, CacheCommand, CacheReply};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cold-mode storage backed by a [`CacheClient`].
pub struct CacheAdapter {
    origin: i64,
    db: usize,
    client: Arc<dyn CacheClient>,
    schema: Arc<Schema>,
    activated: HashSet<Nuid>,
}

impl CacheAdapter {
    /// Creates an adapter for one shard.
    pub fn new(origin: i64, client: Arc<dyn CacheClient>, schema: Arc<Schema>) -> Self {
        let databases = i64::try_from(client.databases().max(1)).unwrap_or(i64::MAX);
        // rem_euclid of a positive divisor lies in 0..databases
        let db = usize::try_from(origin.rem_euclid(databases)).unwrap_or(0);
        Self {
            origin,
            db,
            client,
            schema,
            activated: HashSet::new(),
        }
    }

    /// The logical database this shard lives in.
    #[must_use]
    pub fn db(&self) -> usize {
        self.db
    }

    /// The shard this adapter serves.
    #[must_use]
    pub fn origin(&self) -> i64 {
        self.origin
    }

    fn entities_key(&self) -> String {
        format!("entities:{}", self.origin)
    }

    fn fields_key(id: Nuid) -> String {
        format!("fields:{id}")
    }

    fn table_key(id: Nuid, table: &str) -> String {
        format!("table:{id}:{table}")
    }

    /// Number of entities in the type hash.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the cache is unreachable.
    pub async fn len(&self) -> CoreResult<usize> {
        Ok(self.client.hlen(self.db, &self.entities_key()).await?)
    }

    async fn prefab(&self, id: Nuid) -> CoreResult<Arc<EntityPrefab>> {
        let entity_type = self
            .client
            .hget(self.db, &self.entities_key(), &id.unique.to_string())
            .await?
            .ok_or(CoreError::EntityNotFound { id })?;
        Ok(self.schema.require(&entity_type)?.clone())
    }

    async fn field_prefab(&self, id: Nuid, name: &str) -> CoreResult<FieldPrefab> {
        self.prefab(id)
            .await?
            .get_field(name)
            .cloned()
            .ok_or_else(|| CoreError::field_not_found(id, name))
    }

    async fn table_prefab(&self, id: Nuid, name: &str) -> CoreResult<TablePrefab> {
        self.prefab(id)
            .await?
            .get_table(name)
            .cloned()
            .ok_or_else(|| CoreError::table_not_found(id, name))
    }

    async fn read_row(&self, id: Nuid, table: &TablePrefab, key: &RowKey) -> CoreResult<Option<NList>> {
        let text = self
            .client
            .hget(self.db, &Self::table_key(id, &table.name), &key.to_string())
            .await?;
        match text {
            Some(text) => Ok(Some(json::decode_row(&table.column_types(), &text)?)),
            None => Ok(None),
        }
    }

    /// Writes every entity, all fields and tables, in one transaction.
    ///
    /// Existing hashes of these entities are replaced.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the transaction fails; nothing is written.
    pub async fn set_entities(&self, entities: &[Entity]) -> CoreResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let mut commands = vec![CacheCommand::HMSet {
            key: self.entities_key(),
            entries: entities
                .iter()
                .map(|e| (e.id().unique.to_string(), e.entity_type().to_string()))
                .collect(),
        }];
        for entity in entities {
            let fields_key = Self::fields_key(entity.id());
            commands.push(CacheCommand::Del {
                key: fields_key.clone(),
            });
            let fields = entity
                .fields()
                .map(|f| Ok((f.name().to_string(), json::encode_var(f.value())?)))
                .collect::<CoreResult<Vec<_>>>()?;
            if !fields.is_empty() {
                commands.push(CacheCommand::HMSet {
                    key: fields_key,
                    entries: fields,
                });
            }
            for table in entity.tables() {
                let key = Self::table_key(entity.id(), table.name());
                commands.push(CacheCommand::Del { key: key.clone() });
                let rows = table
                    .rows()
                    .map(|(k, row)| Ok((k.to_string(), json::encode_row(row)?)))
                    .collect::<CoreResult<Vec<_>>>()?;
                if !rows.is_empty() {
                    commands.push(CacheCommand::HMSet { key, entries: rows });
                }
            }
        }
        debug!(origin = self.origin, entities = entities.len(), "writing cache entities");
        self.client.exec(self.db, commands).await?;
        Ok(())
    }

    fn decode_entity(
        &self,
        id: Nuid,
        prefab: &EntityPrefab,
        fields: Vec<(String, String)>,
        tables: Vec<Vec<(String, String)>>,
    ) -> CoreResult<Entity> {
        let mut entity = Entity::generate(id, prefab)?;
        for (name, text) in fields {
            let Some(field) = prefab.get_field(&name) else {
                debug!(%id, name = %name, "ignoring undeclared cached field");
                continue;
            };
            let value = json::decode_var(field.var_type, &text)?;
            if let Some(slot) = entity.field_mut(&name) {
                slot.set(value)?;
            }
        }
        for (table, rows) in prefab.tables.iter().zip(tables) {
            let key_type = table.key_type()?;
            let columns = table.column_types();
            let Some(slot) = entity.table_mut(&table.name) else {
                continue;
            };
            for (key, text) in rows {
                slot.set_row(RowKey::parse(key_type, &key)?, json::decode_row(&columns, &text)?)?;
            }
        }
        entity.set_activated(self.activated.contains(&id));
        Ok(entity)
    }

    async fn read_entities(&self, ids: &[(Nuid, Arc<EntityPrefab>)]) -> CoreResult<Vec<Entity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut commands = Vec::new();
        for (id, prefab) in ids {
            commands.push(CacheCommand::HGetAll {
                key: Self::fields_key(*id),
            });
            for table in &prefab.tables {
                commands.push(CacheCommand::HGetAll {
                    key: Self::table_key(*id, &table.name),
                });
            }
        }
        let mut replies = self.client.exec(self.db, commands).await?.into_iter();
        let mut next = move || -> CoreResult<Vec<(String, String)>> {
            Ok(replies
                .next()
                .unwrap_or(CacheReply::Hash(Vec::new()))
                .into_hash()?)
        };

        let mut entities = Vec::with_capacity(ids.len());
        for (id, prefab) in ids {
            let fields = next()?;
            let tables = prefab
                .tables
                .iter()
                .map(|_| next())
                .collect::<CoreResult<Vec<_>>>()?;
            entities.push(self.decode_entity(*id, prefab, fields, tables)?);
        }
        Ok(entities)
    }

    /// Reads the type hash: every live id with its prefab, priority ordered.
    async fn typed_ids(&self) -> CoreResult<Vec<(Nuid, Arc<EntityPrefab>)>> {
        let mut ids = Vec::new();
        for (unique, entity_type) in self.client.hgetall(self.db, &self.entities_key()).await? {
            let unique: i64 = unique
                .parse()
                .map_err(|_| CodecError::decoding_failed(format!("bad entity id {unique}")))?;
            let id = Nuid::new(unique, self.origin);
            match self.schema.get(&entity_type) {
                Some(prefab) => ids.push((id, prefab.clone())),
                None => warn!(%id, entity_type = %entity_type, "cached entity has unknown type"),
            }
        }
        sort_by_priority(&self.schema, &mut ids, |(id, p)| (*id, p.entity_type.as_str()));
        Ok(ids)
    }
}

impl std::fmt::Debug for CacheAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAdapter")
            .field("origin", &self.origin)
            .field("db", &self.db)
            .field("activated", &self.activated.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EntityStorage for CacheAdapter {
    fn mode(&self) -> StorageMode {
        StorageMode::Cold
    }

    async fn exists(&self, id: Nuid) -> CoreResult<bool> {
        Ok(self
            .client
            .hexists(self.db, &self.entities_key(), &id.unique.to_string())
            .await?)
    }

    async fn entity_type(&self, id: Nuid) -> CoreResult<Option<String>> {
        Ok(self
            .client
            .hget(self.db, &self.entities_key(), &id.unique.to_string())
            .await?)
    }

    async fn create(&mut self, id: Nuid, entity_type: &str) -> CoreResult<()> {
        self.schema.require(entity_type)?;
        let created = self
            .client
            .hsetnx(self.db, &self.entities_key(), &id.unique.to_string(), entity_type)
            .await?;
        if !created {
            return Err(CoreError::EntityExists { id });
        }
        Ok(())
    }

    async fn destroy(&mut self, id: Nuid) -> CoreResult<()> {
        let prefab = self.prefab(id).await?;
        let mut commands: Vec<CacheCommand> = prefab
            .tables
            .iter()
            .map(|t| CacheCommand::Del {
                key: Self::table_key(id, &t.name),
            })
            .collect();
        commands.push(CacheCommand::Del {
            key: Self::fields_key(id),
        });
        commands.push(CacheCommand::HDel {
            key: self.entities_key(),
            field: id.unique.to_string(),
        });
        self.client.exec(self.db, commands).await?;
        self.activated.remove(&id);
        Ok(())
    }

    async fn entity(&self, id: Nuid) -> CoreResult<Option<Entity>> {
        let prefab = match self.prefab(id).await {
            Ok(prefab) => prefab,
            Err(CoreError::EntityNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(self.read_entities(&[(id, prefab)]).await?.pop())
    }

    async fn entities(&self) -> CoreResult<Vec<Entity>> {
        let ids = self.typed_ids().await?;
        self.read_entities(&ids).await
    }

    async fn ids(&self) -> CoreResult<Vec<Nuid>> {
        Ok(self.typed_ids().await?.into_iter().map(|(id, _)| id).collect())
    }

    fn is_activated(&self, id: Nuid) -> bool {
        self.activated.contains(&id)
    }

    async fn set_activated(&mut self, id: Nuid, activated: bool) -> CoreResult<bool> {
        if !self.exists(id).await? {
            return Ok(false);
        }
        if activated {
            self.activated.insert(id);
        } else {
            self.activated.remove(&id);
        }
        Ok(true)
    }

    fn clear_activated(&mut self) {
        self.activated.clear();
    }

    async fn get_field(&self, id: Nuid, name: &str) -> CoreResult<Var> {
        let field = self.field_prefab(id, name).await?;
        match self.client.hget(self.db, &Self::fields_key(id), name).await? {
            Some(text) => Ok(json::decode_var(field.var_type, &text)?),
            None => Ok(Var::null(field.var_type)),
        }
    }

    async fn set_field(&mut self, id: Nuid, name: &str, value: Var) -> CoreResult<Option<FieldDelta>> {
        let field = self.field_prefab(id, name).await?;
        check_value(name, field.var_type, &value)?;
        let key = Self::fields_key(id);
        let old = match self.client.hget(self.db, &key, name).await? {
            Some(text) => json::decode_var(field.var_type, &text)?,
            None => Var::null(field.var_type),
        };
        if old == value {
            return Ok(None);
        }
        self.client
            .hset(self.db, &key, name, &json::encode_var(&value)?)
            .await?;
        Ok(Some(FieldDelta { old, new: value }))
    }

    async fn set_row(&mut self, id: Nuid, table: &str, key: RowKey, row: NList) -> CoreResult<TableDelta> {
        let prefab = self.table_prefab(id, table).await?;
        check_key(table, prefab.key_type()?, &key)?;
        check_row(table, &prefab.column_types(), &row)?;
        self.client
            .hset(
                self.db,
                &Self::table_key(id, table),
                &key.to_string(),
                &json::encode_row(&row)?,
            )
            .await?;
        Ok(TableDelta::Row { key, value: row })
    }

    async fn delete_row(&mut self, id: Nuid, table: &str, key: &RowKey) -> CoreResult<TableDelta> {
        let prefab = self.table_prefab(id, table).await?;
        check_key(table, prefab.key_type()?, key)?;
        let value = self
            .read_row(id, &prefab, key)
            .await?
            .ok_or_else(|| CoreError::row_not_found(table, key))?;
        self.client
            .hdel(self.db, &Self::table_key(id, table), &key.to_string())
            .await?;
        Ok(TableDelta::Row {
            key: key.clone(),
            value,
        })
    }

    async fn set_col(
        &mut self,
        id: Nuid,
        table: &str,
        key: &RowKey,
        col: usize,
        value: Var,
    ) -> CoreResult<Option<TableDelta>> {
        let prefab = self.table_prefab(id, table).await?;
        check_key(table, prefab.key_type()?, key)?;
        let columns = check_col(table, &prefab.column_types(), col, &value)?;
        let mut row = self
            .read_row(id, &prefab, key)
            .await?
            .ok_or_else(|| CoreError::row_not_found(table, key))?;
        let slot = row.get_mut(col).ok_or_else(|| CoreError::ColumnOutOfRange {
            table: table.to_string(),
            col,
            columns,
        })?;
        if *slot == value {
            return Ok(None);
        }
        let old = std::mem::replace(slot, value.clone());
        self.client
            .hset(
                self.db,
                &Self::table_key(id, table),
                &key.to_string(),
                &json::encode_row(&row)?,
            )
            .await?;
        Ok(Some(TableDelta::Col {
            key: key.clone(),
            col,
            old,
            new: value,
        }))
    }

    async fn get_col(&self, id: Nuid, table: &str, key: &RowKey, col: usize) -> CoreResult<Option<Var>> {
        let row = self.get_row(id, table, key).await?;
        Ok(row.and_then(|row| row.get(col).cloned()))
    }

    async fn get_row(&self, id: Nuid, table: &str, key: &RowKey) -> CoreResult<Option<NList>> {
        let prefab = self.table_prefab(id, table).await?;
        if key.key_type() != prefab.key_type()? {
            return Ok(None);
        }
        self.read_row(id, &prefab, key).await
    }

    async fn keys(&self, id: Nuid, table: &str) -> CoreResult<Vec<RowKey>> {
        let prefab = self.table_prefab(id, table).await?;
        let key_type = prefab.key_type()?;
        let mut keys = self
            .client
            .hkeys(self.db, &Self::table_key(id, table))
            .await?
            .iter()
            .map(|k| RowKey::parse(key_type, k))
            .collect::<Result<Vec<_>, _>>()?;
        keys.sort();
        Ok(keys)
    }

    async fn clear_table(&mut self, id: Nuid, table: &str) -> CoreResult<()> {
        self.table_prefab(id, table).await?;
        self.client.del(self.db, &Self::table_key(id, table)).await?;
        Ok(())
    }

    async fn load(&mut self, entities: Vec<Entity>) -> CoreResult<Vec<Nuid>> {
        if self.len().await? > 0 {
            debug!(origin = self.origin, "cache already warm, skipping load");
            return Ok(Vec::new());
        }
        self.set_entities(&entities).await?;
        Ok(Vec::new())
    }
}
