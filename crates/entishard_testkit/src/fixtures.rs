//! Schema fixtures and cluster helpers.
//!
//! [`game_schema`] registers every fixture type. [`TestCluster`] builds a
//! cluster over in-memory stores it keeps handles to, with a
//! [`RecordingModule`] and an [`ItemModule`] registered.

use crate::recording::{RecordingAgent, RecordingModule};
use async_trait::async_trait;
use entishard_codec::{NList, Nuid, VarType};
use entishard_core::{
    Cluster, Config, CoreResult, EntityEvent, EntityPrefab, FieldPrefab, Module, Node, Schema,
    StorageMode, TablePrefab,
};
use entishard_storage::{FileDocumentStore, InMemoryCache, InMemoryDocumentStore};
use std::sync::Arc;
use tempfile::TempDir;

/// Database count of the fixture cache.
pub const CACHE_DATABASES: usize = 4;

/// A player: `level` is saved and synced, `nick_name` saved only, `exp`
/// neither. `quest_table` is saved and synced; `buff_table` is transient.
pub fn player_prefab() -> EntityPrefab {
    EntityPrefab::new("player")
        .priority(10)
        .field(FieldPrefab::new("level", VarType::Int).save().sync())
        .field(FieldPrefab::new("nick_name", VarType::String).save())
        .field(FieldPrefab::new("exp", VarType::Long))
        .table(
            TablePrefab::new("quest_table", VarType::Int)
                .column("status", VarType::Int)
                .column("accept_time", VarType::Long)
                .save()
                .sync(),
        )
        .table(TablePrefab::new("buff_table", VarType::String).column("expire", VarType::Long))
}

/// An item, descending from `goods`.
pub fn item_prefab() -> EntityPrefab {
    EntityPrefab::new("item")
        .ancestor("goods")
        .field(FieldPrefab::new("entry", VarType::Int).save().sync())
        .field(FieldPrefab::new("count", VarType::Int).save().sync())
        .table(
            TablePrefab::new("star_table", VarType::Int)
                .column("star", VarType::Int)
                .save()
                .sync(),
        )
}

/// `leaf` descends from `mid`, which descends from `base`.
pub fn chain_prefabs() -> Vec<EntityPrefab> {
    vec![
        EntityPrefab::new("base").field(FieldPrefab::new("hp", VarType::Int).save().sync()),
        EntityPrefab::new("mid").ancestor("base"),
        EntityPrefab::new("leaf")
            .ancestor("mid")
            .ancestor("base")
            .priority(-5)
            .field(FieldPrefab::new("hp", VarType::Int).save().sync()),
    ]
}

/// One saved and synced field per value type.
pub fn probe_prefab() -> EntityPrefab {
    EntityPrefab::new("probe")
        .field(FieldPrefab::new("flag", VarType::Bool).save().sync())
        .field(FieldPrefab::new("count", VarType::Int).save().sync())
        .field(FieldPrefab::new("total", VarType::Long).save().sync())
        .field(FieldPrefab::new("ratio", VarType::Float).save().sync())
        .field(FieldPrefab::new("label", VarType::String).save().sync())
        .field(FieldPrefab::new("owner", VarType::Id).save().sync())
        .field(FieldPrefab::new("tags", VarType::List).save().sync())
}

/// Every fixture type.
pub fn game_schema() -> Schema {
    let schema = Schema::new()
        .with(player_prefab())
        .with(EntityPrefab::new("goods"))
        .with(item_prefab())
        .with(probe_prefab());
    chain_prefabs().into_iter().fold(schema, Schema::with)
}

/// Sets `entry` and `count` from the create arguments of an item.
#[derive(Debug, Default)]
pub struct ItemModule;

#[async_trait]
impl Module for ItemModule {
    async fn on_entity(
        &self,
        node: &mut Node,
        entity_type: &str,
        id: Nuid,
        event: EntityEvent,
        args: &NList,
    ) -> CoreResult<()> {
        if entity_type != "item" || event != EntityEvent::Create {
            return Ok(());
        }
        if let Some(entry) = args.get_as::<i32>(0) {
            node.set_field(id, "entry", entry).await;
        }
        if let Some(count) = args.get_as::<i32>(1) {
            node.set_field(id, "count", count).await;
        }
        Ok(())
    }
}

/// A cluster over in-memory stores, with recording hooks.
pub struct TestCluster {
    /// The cluster.
    pub cluster: Cluster,
    /// The shared cache.
    pub cache: Arc<InMemoryCache>,
    /// The document store, when in memory.
    pub documents: Option<Arc<InMemoryDocumentStore>>,
    /// Every callback the cluster dispatched.
    pub recorder: Arc<RecordingModule>,
    _temp_dir: Option<TempDir>,
}

impl TestCluster {
    /// A hot-by-default cluster.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// A cluster whose new shards are cold.
    pub fn cold() -> Self {
        Self::with_config(Config::default().default_storage_mode(StorageMode::Cold))
    }

    /// A cluster with the given configuration.
    pub fn with_config(config: Config) -> Self {
        Self::with_stores(
            config,
            Arc::new(InMemoryCache::new(CACHE_DATABASES)),
            Arc::new(InMemoryDocumentStore::new()),
        )
    }

    /// A cluster over existing stores, e.g. to restart against the state a
    /// previous cluster left behind.
    pub fn with_stores(
        config: Config,
        cache: Arc<InMemoryCache>,
        documents: Arc<InMemoryDocumentStore>,
    ) -> Self {
        let recorder = Arc::new(RecordingModule::new());
        let cluster = Cluster::builder(config, game_schema())
            .cache(cache.clone())
            .documents(documents.clone())
            .module(recorder.clone())
            .module(Arc::new(ItemModule))
            .build()
            .expect("fixture schema is valid");
        Self {
            cluster,
            cache,
            documents: Some(documents),
            recorder,
            _temp_dir: None,
        }
    }

    /// A hot cluster persisting to files in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileDocumentStore::open(temp_dir.path()).expect("Failed to open store");
        let cache = Arc::new(InMemoryCache::new(CACHE_DATABASES));
        let recorder = Arc::new(RecordingModule::new());
        let cluster = Cluster::builder(Config::default(), game_schema())
            .cache(cache.clone())
            .documents(Arc::new(store))
            .module(recorder.clone())
            .module(Arc::new(ItemModule))
            .build()
            .expect("fixture schema is valid");
        Self {
            cluster,
            cache,
            documents: None,
            recorder,
            _temp_dir: Some(temp_dir),
        }
    }

    /// The directory of a file-backed cluster.
    pub fn path(&self) -> Option<&std::path::Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// The in-memory document store; panics for a file-backed cluster.
    pub fn documents(&self) -> Arc<InMemoryDocumentStore> {
        self.documents.clone().expect("cluster is file-backed")
    }

    /// Creates an entity and asserts it was created.
    pub async fn create(&self, id: Nuid, entity_type: &str, args: NList) -> Nuid {
        let entity_type = entity_type.to_string();
        let created = self
            .cluster
            .call(id.origin, move |node| node.create(id, &entity_type, args))
            .await
            .expect("node is reachable");
        assert_eq!(created, id, "create rejected");
        created
    }

    /// Creates a player `(unique, origin)`.
    pub async fn create_player(&self, unique: i64, origin: i64) -> Nuid {
        self.create(Nuid::new(unique, origin), "player", NList::new())
            .await
    }

    /// Binds a fresh recording agent to the node for `origin`.
    pub async fn bind_agent(&self, origin: i64) -> Arc<RecordingAgent> {
        let agent = Arc::new(RecordingAgent::new());
        let bound = agent.clone();
        self.cluster
            .call(origin, move |node| {
                Box::pin(async move { node.bind_agent(bound) })
            })
            .await
            .expect("node is reachable");
        agent
    }

    /// Activates the node for `origin`.
    pub async fn activate(&self, origin: i64) {
        self.cluster
            .call(origin, |node| node.active())
            .await
            .expect("node is reachable");
    }
}

impl Default for TestCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestCluster {
    type Target = Cluster;

    fn deref(&self) -> &Self::Target {
        &self.cluster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_schema_is_valid() {
        let schema = game_schema();
        schema.validate().unwrap();
        assert_eq!(schema.len(), 7);
    }

    #[test]
    fn chain_dispatches_base_first() {
        let schema = game_schema();
        let leaf = schema.get("leaf").unwrap();
        let chain: Vec<&str> = leaf.dispatch_chain().collect();
        assert_eq!(chain, vec!["base", "mid", "leaf"]);
    }

    #[tokio::test]
    async fn test_cluster_creates_player() {
        let t = TestCluster::new();
        let id = t.create_player(1, 3).await;
        assert!(t.call(3, move |node| node.exists(id)).await.unwrap());
        t.shutdown().await;
    }
}
