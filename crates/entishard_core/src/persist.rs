//! Shard snapshots in the durable document store.
//!
//! Each shard has at most one [`ShardDocument`], keyed by origin and
//! replaced wholesale on every save. A document records the shard's
//! storage mode and the save-flagged fields and tables of its entities.
//! Unflagged state is rebuilt from prefab defaults on load.

use crate::entity::Entity;
use crate::error::CoreResult;
use crate::schema::{EntityPrefab, Schema};
use crate::storage::StorageMode;
use entishard_codec::{cbor, NList, Nuid, RowKey, Var};
use entishard_storage::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The persisted record of one shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardDocument {
    /// Shard id.
    pub origin: i64,
    /// Storage mode, fixed when the shard was first marked persistent.
    pub storage_mode: StorageMode,
    /// Saved entity state.
    #[serde(default)]
    pub entities: Vec<EntityDocument>,
}

impl ShardDocument {
    /// A document with no entities.
    #[must_use]
    pub fn empty(origin: i64, storage_mode: StorageMode) -> Self {
        Self {
            origin,
            storage_mode,
            entities: Vec::new(),
        }
    }

    /// Encodes to CBOR.
    ///
    /// # Errors
    ///
    /// Returns a codec error if encoding fails.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(cbor::to_cbor(self)?)
    }

    /// Decodes from CBOR.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `bytes` is not a shard document.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        Ok(cbor::from_cbor(bytes)?)
    }
}

/// The saved state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    /// Unique part of the id; the origin is the shard's.
    pub unique: i64,
    /// Type name.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Saved fields by name.
    #[serde(default)]
    pub fields: BTreeMap<String, Var>,
    /// Saved tables by name, rows in key order.
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<RowDocument>>,
}

/// One saved table row, columns by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDocument {
    /// Primary key.
    pub key: RowKey,
    /// Column values by column name.
    pub columns: BTreeMap<String, Var>,
}

/// Reads and writes shard snapshots.
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn DocumentStore>,
    schema: Arc<Schema>,
}

impl PersistenceAdapter {
    /// Creates an adapter over a document store.
    pub fn new(store: Arc<dyn DocumentStore>, schema: Arc<Schema>) -> Self {
        Self { store, schema }
    }

    /// Reads a shard's document. A missing document is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error if the read or decode fails.
    pub async fn find(&self, origin: i64) -> CoreResult<Option<ShardDocument>> {
        match self.store.find_one(origin).await? {
            Some(bytes) => Ok(Some(ShardDocument::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The shard's recorded storage mode, if it was ever marked persistent.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error if the read fails.
    pub async fn storage_mode(&self, origin: i64) -> CoreResult<Option<StorageMode>> {
        Ok(self.find(origin).await?.map(|doc| doc.storage_mode))
    }

    /// Records a shard as persistent with `mode`, unless it already has a
    /// record. Returns the shard's effective mode; an existing mode always
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error if the read or write fails.
    pub async fn mark_persistent(&self, origin: i64, mode: StorageMode) -> CoreResult<StorageMode> {
        if let Some(existing) = self.storage_mode(origin).await? {
            if existing != mode {
                warn!(origin, %existing, requested = %mode, "storage mode is fixed, keeping existing");
            }
            return Ok(existing);
        }
        self.store
            .upsert(origin, ShardDocument::empty(origin, mode).encode()?)
            .await?;
        info!(origin, %mode, "shard marked persistent");
        Ok(mode)
    }

    /// The saved part of an entity. `None` if its type is unknown.
    #[must_use]
    pub fn snapshot(&self, entity: &Entity) -> Option<EntityDocument> {
        let prefab = self.schema.get(entity.entity_type())?;
        let fields = prefab
            .fields
            .iter()
            .filter(|f| f.save)
            .filter_map(|f| Some((f.name.clone(), entity.field(&f.name)?.value().clone())))
            .collect();
        let tables = prefab
            .tables
            .iter()
            .filter(|t| t.save)
            .filter_map(|t| {
                let table = entity.table(&t.name)?;
                let rows = table
                    .rows()
                    .map(|(key, row)| RowDocument {
                        key: key.clone(),
                        columns: t
                            .columns
                            .iter()
                            .zip(row.iter())
                            .map(|(c, v)| (c.name.clone(), v.clone()))
                            .collect(),
                    })
                    .collect();
                Some((t.name.clone(), rows))
            })
            .collect();
        Some(EntityDocument {
            unique: entity.id().unique,
            entity_type: entity.entity_type().to_string(),
            fields,
            tables,
        })
    }

    /// Rebuilds an entity from prefab defaults and its saved state.
    ///
    /// Values that no longer match the schema are skipped with a warning;
    /// missing row columns take their null value.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` if the type is not in the schema.
    pub fn restore(&self, origin: i64, doc: &EntityDocument) -> CoreResult<Entity> {
        let prefab = self.schema.require(&doc.entity_type)?;
        let id = Nuid::new(doc.unique, origin);
        let mut entity = Entity::generate(id, prefab)?;
        for (name, value) in &doc.fields {
            let Some(field) = entity.field_mut(name) else {
                debug!(%id, name = %name, "dropping undeclared saved field");
                continue;
            };
            if let Err(e) = field.set(value.clone()) {
                warn!(%id, name = %name, error = %e, "dropping saved field");
            }
        }
        for (name, rows) in &doc.tables {
            restore_table(&mut entity, prefab, name, rows);
        }
        Ok(entity)
    }

    /// Loads and rebuilds every saved entity of a shard. A shard without a
    /// document has no entities.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error if the document cannot be read.
    pub async fn load_entities(&self, origin: i64) -> CoreResult<Vec<Entity>> {
        let Some(doc) = self.find(origin).await? else {
            return Ok(Vec::new());
        };
        Ok(self.restore_all(&doc))
    }

    /// Rebuilds every entity of a document, skipping unknown types.
    #[must_use]
    pub fn restore_all(&self, doc: &ShardDocument) -> Vec<Entity> {
        doc.entities
            .iter()
            .filter_map(|e| match self.restore(doc.origin, e) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    warn!(origin = doc.origin, unique = e.unique, error = %err, "skipping saved entity");
                    None
                }
            })
            .collect()
    }

    /// Replaces the shard's document with a snapshot of `entities`.
    ///
    /// A shard with no entities and no existing record is not written.
    /// Returns true if a document was written.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error if the write fails; the previous
    /// document is kept.
    pub async fn save(&self, origin: i64, mode: StorageMode, entities: &[Entity]) -> CoreResult<bool> {
        if entities.is_empty() && self.store.find_one(origin).await?.is_none() {
            return Ok(false);
        }
        let doc = ShardDocument {
            origin,
            storage_mode: mode,
            entities: entities.iter().filter_map(|e| self.snapshot(e)).collect(),
        };
        self.store.upsert(origin, doc.encode()?).await?;
        debug!(origin, entities = doc.entities.len(), "shard saved");
        Ok(true)
    }
}

fn restore_table(entity: &mut Entity, prefab: &EntityPrefab, name: &str, rows: &[RowDocument]) {
    let id = entity.id();
    let (Some(table_prefab), Some(table)) = (prefab.get_table(name), entity.table_mut(name)) else {
        debug!(%id, table = name, "dropping undeclared saved table");
        return;
    };
    for doc in rows {
        let row: NList = table_prefab
            .columns
            .iter()
            .map(|c| match doc.columns.get(&c.name) {
                Some(v) if v.is(c.var_type) => v.clone(),
                _ => Var::null(c.var_type),
            })
            .collect();
        if let Err(e) = table.set_row(doc.key.clone(), row) {
            warn!(%id, table = name, key = %doc.key, error = %e, "dropping saved row");
        }
    }
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("types", &self.schema.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldPrefab, TablePrefab};
    use entishard_codec::VarType;
    use entishard_storage::InMemoryDocumentStore;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new().with(
                EntityPrefab::new("player")
                    .field(FieldPrefab::new("level", VarType::Int).save())
                    .field(FieldPrefab::new("hp", VarType::Int))
                    .table(
                        TablePrefab::new("quest_table", VarType::Int)
                            .column("status", VarType::Int)
                            .column("accept_time", VarType::Long)
                            .save(),
                    )
                    .table(TablePrefab::new("buff_table", VarType::Int).column("left", VarType::Int)),
            ),
        )
    }

    fn adapter() -> (Arc<InMemoryDocumentStore>, PersistenceAdapter) {
        let store = Arc::new(InMemoryDocumentStore::new());
        (store.clone(), PersistenceAdapter::new(store, schema()))
    }

    fn player(unique: i64) -> Entity {
        let schema = schema();
        let mut e = Entity::generate(Nuid::new(unique, 7), schema.require("player").unwrap()).unwrap();
        e.field_mut("level").unwrap().set(Var::Int(12)).unwrap();
        e.field_mut("hp").unwrap().set(Var::Int(80)).unwrap();
        e.table_mut("quest_table")
            .unwrap()
            .set_row(RowKey::Int(1001), NList::new().with(2).with(1_700_000_000i64))
            .unwrap();
        e.table_mut("buff_table")
            .unwrap()
            .set_row(RowKey::Int(1), NList::new().with(30))
            .unwrap();
        e
    }

    #[test]
    fn persist_snapshot_keeps_saved_only() {
        let (_, p) = adapter();
        let doc = p.snapshot(&player(1)).unwrap();
        assert_eq!(doc.fields.len(), 1);
        assert_eq!(doc.fields["level"], Var::Int(12));
        assert_eq!(doc.tables.keys().collect::<Vec<_>>(), vec!["quest_table"]);
        let row = &doc.tables["quest_table"][0];
        assert_eq!(row.key, RowKey::Int(1001));
        assert_eq!(row.columns["status"], Var::Int(2));
        assert_eq!(row.columns["accept_time"], Var::Long(1_700_000_000));
    }

    #[tokio::test]
    async fn persist_roundtrip_restores_saved_state() {
        let (_, p) = adapter();
        assert!(p.save(7, StorageMode::Hot, &[player(1)]).await.unwrap());
        let loaded = p.load_entities(7).await.unwrap();
        assert_eq!(loaded.len(), 1);
        let e = &loaded[0];
        assert_eq!(e.id(), Nuid::new(1, 7));
        assert_eq!(e.field("level").unwrap().value(), &Var::Int(12));
        assert_eq!(e.field("hp").unwrap().value(), &Var::Int(0));
        assert_eq!(
            e.table("quest_table").unwrap().row(&RowKey::Int(1001)),
            Some(&NList::new().with(2).with(1_700_000_000i64))
        );
        assert!(e.table("buff_table").unwrap().is_empty());
    }

    #[tokio::test]
    async fn persist_missing_document_is_empty() {
        let (_, p) = adapter();
        assert!(p.find(3).await.unwrap().is_none());
        assert!(p.load_entities(3).await.unwrap().is_empty());
        assert_eq!(p.storage_mode(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn persist_empty_shard_without_record_is_skipped() {
        let (store, p) = adapter();
        assert!(!p.save(7, StorageMode::Hot, &[]).await.unwrap());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn persist_empty_shard_with_record_is_cleared() {
        let (_, p) = adapter();
        p.save(7, StorageMode::Hot, &[player(1)]).await.unwrap();
        assert!(p.save(7, StorageMode::Hot, &[]).await.unwrap());
        assert!(p.load_entities(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persist_mark_persistent_keeps_first_mode() {
        let (_, p) = adapter();
        assert_eq!(p.mark_persistent(5, StorageMode::Cold).await.unwrap(), StorageMode::Cold);
        assert_eq!(p.mark_persistent(5, StorageMode::Hot).await.unwrap(), StorageMode::Cold);
        assert_eq!(p.storage_mode(5).await.unwrap(), Some(StorageMode::Cold));
    }

    #[tokio::test]
    async fn persist_failed_write_keeps_previous_document() {
        let (store, p) = adapter();
        p.save(7, StorageMode::Hot, &[player(1)]).await.unwrap();
        store.fail_writes(1);
        assert!(p.save(7, StorageMode::Hot, &[player(1), player(2)]).await.is_err());
        assert_eq!(p.load_entities(7).await.unwrap().len(), 1);
    }

    #[test]
    fn persist_restore_fills_missing_columns() {
        let (_, p) = adapter();
        let mut columns = BTreeMap::new();
        columns.insert("status".to_string(), Var::Int(1));
        columns.insert("accept_time".to_string(), Var::Str("bad".into()));
        let doc = EntityDocument {
            unique: 4,
            entity_type: "player".into(),
            fields: BTreeMap::from([("level".to_string(), Var::Str("x".into()))]),
            tables: BTreeMap::from([(
                "quest_table".to_string(),
                vec![RowDocument {
                    key: RowKey::Int(9),
                    columns,
                }],
            )]),
        };
        let e = p.restore(7, &doc).unwrap();
        assert_eq!(e.field("level").unwrap().value(), &Var::Int(0));
        assert_eq!(
            e.table("quest_table").unwrap().row(&RowKey::Int(9)),
            Some(&NList::new().with(1).with(0i64))
        );
    }

    #[test]
    fn persist_restore_unknown_type_fails() {
        let (_, p) = adapter();
        let doc = EntityDocument {
            unique: 4,
            entity_type: "ghost".into(),
            fields: BTreeMap::new(),
            tables: BTreeMap::new(),
        };
        assert!(p.restore(7, &doc).is_err());
    }
}
