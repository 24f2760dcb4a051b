//! The shard actor.
//!
//! A [`Node`] exclusively owns one shard: every entity whose id has
//! `origin == node.origin()`. Each public operation checks the id's origin
//! first and forwards to the owning node through the [`Cluster`] when it is
//! not its own, returning the remote result unchanged. Local operations go
//! to the node's [`EntityStorage`], and every committed mutation runs the
//! callback pipeline:
//!
//! 1. the delta is dispatched to the modules once per type in the entity's
//!    dispatch chain (farthest ancestor first, the entity's own type last)
//! 2. if the field or table is flagged `sync`, a [`SyncMessage`] goes to the
//!    bound agent, but only while the node is active and the entity is
//!    activated
//!
//! Rejected operations (unknown entity, field, table or row, wrong value
//! type, unchanged value) are logged and return a default result.
//!
//! Operations return [`BoxFuture`]s so that modules can call back into the
//! node, and forwarded calls can recurse through other nodes.

mod timer;

use crate::agent::Agent;
use crate::cluster::Cluster;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::event::{EntityEvent, FieldDelta, FieldEvent, SyncMessage, TableDelta, TableEvent};
use crate::module::ModuleDispatcher;
use crate::persist::PersistenceAdapter;
use crate::schema::{EntityPrefab, Schema};
use crate::stats::ClusterStats;
use crate::storage::{CacheAdapter, EntityManager, EntityStorage, StorageMode};
use entishard_codec::{NList, Nuid, RowKey, Var, VarValue};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timer::TimerSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// The actor owning one shard.
pub struct Node {
    origin: i64,
    storage: Box<dyn EntityStorage>,
    persistence: PersistenceAdapter,
    schema: Arc<Schema>,
    modules: Arc<ModuleDispatcher>,
    stats: Arc<ClusterStats>,
    cluster: Cluster,
    agent: Option<Arc<dyn Agent>>,
    active: Arc<AtomicBool>,
    timers: TimerSet,
}

impl Node {
    /// Builds the node for `origin` and loads its persisted state.
    ///
    /// The storage mode comes from the shard's document, or from the
    /// cluster's default for a shard that was never persisted. Hot shards
    /// fire a load callback for every restored entity.
    pub(crate) async fn activate(cluster: Cluster, origin: i64, active: Arc<AtomicBool>) -> CoreResult<Self> {
        let persistence = cluster.persistence().clone();
        let schema = Arc::clone(cluster.schema());
        let doc = persistence.find(origin).await?;
        let mode = doc
            .as_ref()
            .map_or(cluster.config().default_storage_mode, |d| d.storage_mode);
        let storage: Box<dyn EntityStorage> = match mode {
            StorageMode::Hot => Box::new(EntityManager::new(Arc::clone(&schema))),
            StorageMode::Cold => Box::new(CacheAdapter::new(
                origin,
                Arc::clone(cluster.cache()),
                Arc::clone(&schema),
            )),
        };
        let mut node = Self {
            origin,
            storage,
            persistence,
            schema,
            modules: Arc::clone(cluster.modules()),
            stats: Arc::clone(cluster.stats()),
            cluster,
            agent: None,
            active,
            timers: TimerSet::default(),
        };

        let mut loaded = 0;
        if let Some(doc) = doc {
            let entities = node.persistence.restore_all(&doc);
            for id in node.storage.load(entities).await? {
                loaded += 1;
                if let Some(prefab) = node.prefab(id).await {
                    node.on_entity(&prefab, id, EntityEvent::Load, &NList::new())
                        .await;
                }
            }
        }
        info!(origin, %mode, loaded, "node activated");
        Ok(node)
    }

    /// The shard this node owns.
    #[must_use]
    pub fn origin(&self) -> i64 {
        self.origin
    }

    /// The storage mode of this shard.
    #[must_use]
    pub fn mode(&self) -> StorageMode {
        self.storage.mode()
    }

    /// The cluster this node belongs to.
    #[must_use]
    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// Whether the node is active (its client receives sync messages).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Binds the client agent that receives sync messages.
    pub fn bind_agent(&mut self, agent: Arc<dyn Agent>) {
        self.agent = Some(agent);
    }

    /// Unbinds the client agent.
    pub fn unbind_agent(&mut self) -> Option<Arc<dyn Agent>> {
        self.agent.take()
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Returns true if the entity exists.
    pub fn exists(&mut self, id: Nuid) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "exists", move |node| node.exists(id))
                    .await
                    .unwrap_or(false);
            }
            self.storage.exists(id).await.unwrap_or_else(|e| {
                self.rejected("exists", id, &e);
                false
            })
        })
    }

    /// Returns the entity's type name.
    pub fn get_type(&mut self, id: Nuid) -> BoxFuture<'_, Option<String>> {
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "get_type", move |node| node.get_type(id))
                    .await
                    .flatten();
            }
            self.storage.entity_type(id).await.unwrap_or_else(|e| {
                self.rejected("get_type", id, &e);
                None
            })
        })
    }

    /// Creates an entity and fires its create callback with `args`.
    ///
    /// Returns the id, or [`Nuid::EMPTY`] if the type is unknown or the id
    /// is taken.
    pub fn create(&mut self, id: Nuid, entity_type: &str, args: NList) -> BoxFuture<'_, Nuid> {
        let entity_type = entity_type.to_string();
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "create", move |node| node.create(id, &entity_type, args))
                    .await
                    .unwrap_or(Nuid::EMPTY);
            }
            if let Err(e) = self.storage.create(id, &entity_type).await {
                self.rejected("create", id, &e);
                return Nuid::EMPTY;
            }
            debug!(%id, entity_type = %entity_type, "entity created");
            if let Some(prefab) = self.schema.get(&entity_type).cloned() {
                self.on_entity(&prefab, id, EntityEvent::Create, &args).await;
            }
            id
        })
    }

    /// Creates an entity with a fresh id on shard `origin`.
    pub fn create_new(&mut self, entity_type: &str, origin: i64, args: NList) -> BoxFuture<'_, Nuid> {
        let id = Nuid::new(self.cluster.next_unique(), origin);
        self.create(id, entity_type, args)
    }

    /// Makes an entity visible to the client: sets its activation flag,
    /// fires the entry callback and syncs the full entity.
    pub fn entry(&mut self, id: Nuid) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if id.origin != self.origin {
                self.forward_if_active(id.origin, "entry", move |node| node.entry(id))
                    .await;
                return;
            }
            let Some(prefab) = self.prefab(id).await else {
                debug!(%id, "entry on unknown entity ignored");
                return;
            };
            if let Err(e) = self.storage.set_activated(id, true).await {
                self.rejected("entry", id, &e);
                return;
            }
            self.on_entity(&prefab, id, EntityEvent::Entry, &NList::new())
                .await;
            let entity = match self.storage.entity(id).await {
                Ok(Some(entity)) => entity,
                Ok(None) => return,
                Err(e) => {
                    self.rejected("entry", id, &e);
                    return;
                }
            };
            let activated = self.storage.is_activated(id);
            self.sync(
                SyncMessage::Entity {
                    id,
                    event: EntityEvent::Entry,
                    entity: Some(entity),
                },
                activated,
            )
            .await;
        })
    }

    /// Hides an entity from the client: fires the leave callback, syncs a
    /// tombstone and clears the activation flag.
    pub fn leave(&mut self, id: Nuid) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if id.origin != self.origin {
                self.forward_if_active(id.origin, "leave", move |node| node.leave(id))
                    .await;
                return;
            }
            let Some(prefab) = self.prefab(id).await else {
                debug!(%id, "leave on unknown entity ignored");
                return;
            };
            self.on_entity(&prefab, id, EntityEvent::Leave, &NList::new())
                .await;
            let activated = self.storage.is_activated(id);
            self.sync(
                SyncMessage::Entity {
                    id,
                    event: EntityEvent::Leave,
                    entity: None,
                },
                activated,
            )
            .await;
            if let Err(e) = self.storage.set_activated(id, false).await {
                self.rejected("leave", id, &e);
            }
        })
    }

    /// Removes an entity with all of its state and timers, then fires the
    /// destroy callback and syncs a tombstone.
    pub fn destroy(&mut self, id: Nuid) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if id.origin != self.origin {
                self.forward_if_active(id.origin, "destroy", move |node| node.destroy(id))
                    .await;
                return;
            }
            let Some(prefab) = self.prefab(id).await else {
                debug!(%id, "destroy on unknown entity ignored");
                return;
            };
            let activated = self.storage.is_activated(id);
            if let Err(e) = self.storage.destroy(id).await {
                self.rejected("destroy", id, &e);
                return;
            }
            self.timers.remove_entity(id);
            debug!(%id, "entity destroyed");
            self.on_entity(&prefab, id, EntityEvent::Destroy, &NList::new())
                .await;
            self.sync(
                SyncMessage::Entity {
                    id,
                    event: EntityEvent::Destroy,
                    entity: None,
                },
                activated,
            )
            .await;
        })
    }

    /// Every entity of this shard, highest priority first.
    pub fn get_entities(&mut self) -> BoxFuture<'_, Vec<Entity>> {
        Box::pin(async move {
            self.storage.entities().await.unwrap_or_else(|e| {
                error!(origin = self.origin, error = %e, "failed to read entities");
                Vec::new()
            })
        })
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    /// Reads a field as a [`Var`].
    pub fn get_field_var(&mut self, id: Nuid, name: &str) -> BoxFuture<'_, Option<Var>> {
        let name = name.to_string();
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "get_field", move |node| node.get_field_var(id, &name))
                    .await
                    .flatten();
            }
            match self.storage.get_field(id, &name).await {
                Ok(value) => Some(value),
                Err(e) => {
                    self.rejected("get_field", id, &e);
                    None
                }
            }
        })
    }

    /// Reads a field as `T`; the null value of `T` if it cannot be read.
    pub fn get_field<T>(&mut self, id: Nuid, name: &str) -> BoxFuture<'_, T>
    where
        T: VarValue + Send + 'static,
    {
        let read = self.get_field_var(id, name);
        Box::pin(async move { typed(read.await) })
    }

    /// Writes a field. Returns true if the value changed.
    pub fn set_field(&mut self, id: Nuid, name: &str, value: impl Into<Var>) -> BoxFuture<'_, bool> {
        let name = name.to_string();
        let value = value.into();
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "set_field", move |node| node.set_field(id, &name, value))
                    .await
                    .unwrap_or(false);
            }
            match self.storage.set_field(id, &name, value).await {
                Ok(Some(delta)) => {
                    self.on_field(id, &name, delta).await;
                    true
                }
                Ok(None) => {
                    debug!(%id, name = %name, "field unchanged");
                    false
                }
                Err(e) => {
                    self.rejected("set_field", id, &e);
                    false
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// Reads one column as a [`Var`].
    pub fn get_col_var(
        &mut self,
        id: Nuid,
        table: &str,
        key: impl Into<RowKey>,
        col: usize,
    ) -> BoxFuture<'_, Option<Var>> {
        let table = table.to_string();
        let key = key.into();
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "get_col", move |node| node.get_col_var(id, &table, key, col))
                    .await
                    .flatten();
            }
            self.storage
                .get_col(id, &table, &key, col)
                .await
                .unwrap_or_else(|e| {
                    self.rejected("get_col", id, &e);
                    None
                })
        })
    }

    /// Reads one column as `T`; the null value of `T` if it cannot be read.
    pub fn get_col<T>(&mut self, id: Nuid, table: &str, key: impl Into<RowKey>, col: usize) -> BoxFuture<'_, T>
    where
        T: VarValue + Send + 'static,
    {
        let read = self.get_col_var(id, table, key, col);
        Box::pin(async move { typed(read.await) })
    }

    /// Writes one column of an existing row. Returns true if it changed.
    pub fn set_col(
        &mut self,
        id: Nuid,
        table: &str,
        key: impl Into<RowKey>,
        col: usize,
        value: impl Into<Var>,
    ) -> BoxFuture<'_, bool> {
        let table = table.to_string();
        let key = key.into();
        let value = value.into();
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "set_col", move |node| {
                        node.set_col(id, &table, key, col, value)
                    })
                    .await
                    .unwrap_or(false);
            }
            match self.storage.set_col(id, &table, &key, col, value).await {
                Ok(Some(delta)) => {
                    self.on_table(id, &table, TableEvent::SetCol, delta).await;
                    true
                }
                Ok(None) => {
                    debug!(%id, table = %table, %key, col, "column unchanged");
                    false
                }
                Err(e) => {
                    self.rejected("set_col", id, &e);
                    false
                }
            }
        })
    }

    /// Adds a row (replacing any row with the same key).
    pub fn add_key_value(&mut self, id: Nuid, table: &str, key: impl Into<RowKey>, row: NList) -> BoxFuture<'_, bool> {
        self.put_row(id, table.to_string(), key.into(), row, TableEvent::AddKey)
    }

    /// Replaces a row (inserting it if absent).
    pub fn set_key_value(&mut self, id: Nuid, table: &str, key: impl Into<RowKey>, row: NList) -> BoxFuture<'_, bool> {
        self.put_row(id, table.to_string(), key.into(), row, TableEvent::SetKey)
    }

    fn put_row(&mut self, id: Nuid, table: String, key: RowKey, row: NList, event: TableEvent) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "put_row", move |node| node.put_row(id, table, key, row, event))
                    .await
                    .unwrap_or(false);
            }
            match self.storage.set_row(id, &table, key, row).await {
                Ok(delta) => {
                    self.on_table(id, &table, event, delta).await;
                    true
                }
                Err(e) => {
                    self.rejected("put_row", id, &e);
                    false
                }
            }
        })
    }

    /// Deletes a row. Returns true if it existed.
    pub fn del_key(&mut self, id: Nuid, table: &str, key: impl Into<RowKey>) -> BoxFuture<'_, bool> {
        let table = table.to_string();
        let key = key.into();
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "del_key", move |node| node.del_key(id, &table, key))
                    .await
                    .unwrap_or(false);
            }
            match self.storage.delete_row(id, &table, &key).await {
                Ok(delta) => {
                    self.on_table(id, &table, TableEvent::DelKey, delta).await;
                    true
                }
                Err(e) => {
                    self.rejected("del_key", id, &e);
                    false
                }
            }
        })
    }

    /// Removes every row of a table.
    pub fn clear_table(&mut self, id: Nuid, table: &str) -> BoxFuture<'_, bool> {
        let table = table.to_string();
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "clear_table", move |node| node.clear_table(id, &table))
                    .await
                    .unwrap_or(false);
            }
            match self.storage.clear_table(id, &table).await {
                Ok(()) => {
                    self.on_table(id, &table, TableEvent::Clear, TableDelta::Cleared)
                        .await;
                    true
                }
                Err(e) => {
                    self.rejected("clear_table", id, &e);
                    false
                }
            }
        })
    }

    /// Reads a row.
    pub fn get_key_value(&mut self, id: Nuid, table: &str, key: impl Into<RowKey>) -> BoxFuture<'_, Option<NList>> {
        let table = table.to_string();
        let key = key.into();
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "get_key_value", move |node| {
                        node.get_key_value(id, &table, key)
                    })
                    .await
                    .flatten();
            }
            self.storage
                .get_row(id, &table, &key)
                .await
                .unwrap_or_else(|e| {
                    self.rejected("get_key_value", id, &e);
                    None
                })
        })
    }

    /// Every key of a table, in order.
    pub fn get_keys(&mut self, id: Nuid, table: &str) -> BoxFuture<'_, Vec<RowKey>> {
        let table = table.to_string();
        Box::pin(async move {
            if id.origin != self.origin {
                return self
                    .forward(id.origin, "get_keys", move |node| node.get_keys(id, &table))
                    .await
                    .unwrap_or_default();
            }
            self.storage.keys(id, &table).await.unwrap_or_else(|e| {
                self.rejected("get_keys", id, &e);
                Vec::new()
            })
        })
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Delivers a command to the modules on behalf of an entity.
    pub fn command(&mut self, id: Nuid, command: i32, args: NList) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if id.origin != self.origin {
                self.forward_if_active(id.origin, "command", move |node| node.command(id, command, args))
                    .await;
                return;
            }
            if !self.exists(id).await {
                debug!(%id, command, "command for unknown entity ignored");
                return;
            }
            let modules = Arc::clone(&self.modules);
            modules.callback_command(self, id, command, &args).await;
        })
    }

    /// Delivers a custom event to the modules on behalf of an entity.
    pub fn custom(&mut self, id: Nuid, custom: i32, args: NList) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if id.origin != self.origin {
                self.forward_if_active(id.origin, "custom", move |node| node.custom(id, custom, args))
                    .await;
                return;
            }
            if !self.exists(id).await {
                debug!(%id, custom, "custom event for unknown entity ignored");
                return;
            }
            let modules = Arc::clone(&self.modules);
            modules.callback_custom(self, id, custom, &args).await;
        })
    }

    // ------------------------------------------------------------------
    // Activity and persistence
    // ------------------------------------------------------------------

    /// Activates the node and replays entry for every entity, highest
    /// priority first.
    pub fn active(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.active.store(true, Ordering::SeqCst);
            let ids = match self.storage.ids().await {
                Ok(ids) => ids,
                Err(e) => {
                    error!(origin = self.origin, error = %e, "failed to list entities");
                    return;
                }
            };
            let entities = ids.len();
            for id in ids {
                self.entry(id).await;
            }
            info!(origin = self.origin, entities, "node active");
        })
    }

    /// Deactivates the node, clears every activation flag and flushes.
    pub fn deactive(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.active.store(false, Ordering::SeqCst);
            self.storage.clear_activated();
            info!(origin = self.origin, "node inactive");
            // Already logged and counted by flush.
            let _ = self.flush().await;
        })
    }

    /// Snapshots the shard into the document store.
    ///
    /// # Errors
    ///
    /// Returns the storage or codec error that aborted the cycle. The
    /// previous snapshot is kept and the next cycle retries.
    pub fn flush(&mut self) -> BoxFuture<'_, CoreResult<()>> {
        Box::pin(async move {
            let result = self.save().await;
            self.stats.record_flush(result.is_ok());
            match &result {
                Ok(true) => info!(origin = self.origin, mode = %self.mode(), "shard flushed"),
                Ok(false) => debug!(origin = self.origin, "nothing to flush"),
                Err(e) => error!(origin = self.origin, error = %e, "flush failed"),
            }
            result.map(|_| ())
        })
    }

    /// Records this shard as persistent with its current mode.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error if the document store fails.
    pub fn mark_persistent(&mut self) -> BoxFuture<'_, CoreResult<StorageMode>> {
        Box::pin(async move {
            self.persistence
                .mark_persistent(self.origin, self.mode())
                .await
        })
    }

    async fn save(&self) -> CoreResult<bool> {
        let entities = self.storage.entities().await?;
        self.persistence
            .save(self.origin, self.storage.mode(), &entities)
            .await
    }

    /// Periodic snapshot; skipped while the node is inactive.
    pub(crate) async fn scheduled_flush(&mut self) {
        if self.is_active() {
            let _ = self.flush().await;
        }
    }

    /// Final snapshot before the node stops.
    pub(crate) async fn shutdown(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.timers.clear();
        let _ = self.flush().await;
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Fires the timer callback once after `delay`. Returns false for an id
    /// of another shard.
    pub fn add_countdown(&mut self, id: Nuid, name: &str, delay: Duration) -> bool {
        if !self.owns_timer(id, name) {
            return false;
        }
        self.timers
            .add_countdown(id, name.to_string(), delay, Instant::now());
        true
    }

    /// Fires the timer callback every `period`, `count` times or forever.
    /// Returns false for an id of another shard.
    pub fn add_heartbeat(&mut self, id: Nuid, name: &str, period: Duration, count: Option<u32>) -> bool {
        if !self.owns_timer(id, name) {
            return false;
        }
        self.timers
            .add_heartbeat(id, name.to_string(), period, count, Instant::now());
        true
    }

    /// Returns true if the timer is scheduled.
    #[must_use]
    pub fn has_timer(&self, id: Nuid, name: &str) -> bool {
        self.timers.contains(id, name)
    }

    /// Cancels a timer. Returns true if it was scheduled.
    pub fn del_timer(&mut self, id: Nuid, name: &str) -> bool {
        self.timers.remove(id, name)
    }

    fn owns_timer(&self, id: Nuid, name: &str) -> bool {
        if id.origin == self.origin {
            return true;
        }
        warn!(origin = self.origin, %id, timer = name, "timers belong to the owning node");
        false
    }

    pub(crate) fn next_timer(&self) -> Option<Instant> {
        self.timers.next_due()
    }

    pub(crate) async fn fire_timers(&mut self, now: Instant) {
        let modules = Arc::clone(&self.modules);
        for fired in self.timers.pop_due(now) {
            modules
                .callback_timer(self, fired.id, &fired.name, fired.remaining)
                .await;
        }
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    async fn prefab(&self, id: Nuid) -> Option<Arc<EntityPrefab>> {
        match self.storage.entity_type(id).await {
            Ok(Some(entity_type)) => self.schema.get(&entity_type).cloned(),
            Ok(None) => None,
            Err(e) => {
                error!(%id, error = %e, "failed to read entity type");
                None
            }
        }
    }

    async fn on_entity(&mut self, prefab: &EntityPrefab, id: Nuid, event: EntityEvent, args: &NList) {
        let modules = Arc::clone(&self.modules);
        for entity_type in prefab.dispatch_chain() {
            modules
                .callback_entity(self, entity_type, id, event, args)
                .await;
        }
    }

    async fn on_field(&mut self, id: Nuid, name: &str, delta: FieldDelta) {
        let Some(prefab) = self.prefab(id).await else {
            return;
        };
        let modules = Arc::clone(&self.modules);
        for entity_type in prefab.dispatch_chain() {
            modules
                .callback_field(self, entity_type, id, name, FieldEvent::Change, &delta)
                .await;
        }
        if prefab.get_field(name).is_some_and(|f| f.sync) {
            let activated = self.storage.is_activated(id);
            self.sync(
                SyncMessage::Field {
                    id,
                    name: name.to_string(),
                    event: FieldEvent::Change,
                    delta,
                },
                activated,
            )
            .await;
        }
    }

    async fn on_table(&mut self, id: Nuid, name: &str, event: TableEvent, delta: TableDelta) {
        let Some(prefab) = self.prefab(id).await else {
            return;
        };
        let modules = Arc::clone(&self.modules);
        for entity_type in prefab.dispatch_chain() {
            modules
                .callback_table(self, entity_type, id, name, event, &delta)
                .await;
        }
        if prefab.get_table(name).is_some_and(|t| t.sync) {
            let activated = self.storage.is_activated(id);
            self.sync(
                SyncMessage::Table {
                    id,
                    name: name.to_string(),
                    event,
                    delta,
                },
                activated,
            )
            .await;
        }
    }

    /// Sends to the agent if the node is active, the entity activated and
    /// an agent bound; drops the message otherwise.
    async fn sync(&self, message: SyncMessage, activated: bool) {
        let agent = match &self.agent {
            Some(agent) if activated && self.is_active() => Arc::clone(agent),
            _ => {
                self.stats.record_sync(false);
                return;
            }
        };
        let id = message.id();
        let code = message.code();
        match agent.send_message(message).await {
            Ok(()) => self.stats.record_sync(true),
            Err(e) => {
                self.stats.record_sync(false);
                warn!(%id, code, error = %e, "sync delivery failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    async fn forward<R, F>(&self, origin: i64, op: &'static str, f: F) -> Option<R>
    where
        F: for<'a> FnOnce(&'a mut Node) -> BoxFuture<'a, R> + Send + 'static,
        R: Send + 'static,
    {
        self.stats.record_forward();
        debug!(from = self.origin, to = origin, op, "forwarding");
        match self.cluster.call(origin, f).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(from = self.origin, to = origin, op, error = %e, "forward failed");
                None
            }
        }
    }

    async fn forward_if_active<F>(&self, origin: i64, op: &'static str, f: F)
    where
        F: for<'a> FnOnce(&'a mut Node) -> BoxFuture<'a, ()> + Send + 'static,
    {
        if self.cluster.is_active(origin) {
            self.forward(origin, op, f).await;
        } else {
            debug!(from = self.origin, to = origin, op, "remote node inactive, dropped");
        }
    }

    fn rejected(&self, op: &'static str, id: Nuid, error: &CoreError) {
        self.stats.record_rejected();
        if error.is_infrastructure() {
            error!(origin = self.origin, %id, op, %error, "operation failed");
        } else {
            warn!(origin = self.origin, %id, op, %error, "operation rejected");
        }
    }
}

fn typed<T: VarValue>(value: Option<Var>) -> T {
    value.and_then(|v| T::from_var(&v)).unwrap_or_else(T::null)
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("origin", &self.origin)
            .field("mode", &self.mode())
            .field("active", &self.is_active())
            .field("agent", &self.agent.is_some())
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}
