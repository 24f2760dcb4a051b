//! # entishard core
//!
//! Authoritative entity state for a sharded game server.
//!
//! This crate provides:
//! - A schema-driven entity model: [`Entity`], [`Field`], [`Table`]
//! - Two storage backends behind one [`EntityStorage`] trait:
//!   - [`EntityManager`] (hot): entities live in the node's memory
//!   - [`CacheAdapter`] (cold): entities live as hashes in a remote cache
//! - [`PersistenceAdapter`]: shard snapshots in a durable document store
//! - [`Node`]: the single-writer actor owning one shard, routing every
//!   operation on a foreign id to the node that owns it
//! - [`Cluster`]: the registry and router that activates nodes on demand
//!   and deactivates them on request or when idle
//! - The callback and sync pipeline: [`Module`]s receive every committed
//!   delta along the entity type's ancestor chain, and an [`Agent`] bound to
//!   an active node receives [`SyncMessage`]s for activated entities
//!
//! ## Example
//!
//! ```rust
//! use entishard_core::{Cluster, Config, EntityPrefab, FieldPrefab, Schema};
//! use entishard_codec::{NList, Nuid, VarType};
//! use entishard_storage::{InMemoryCache, InMemoryDocumentStore};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let schema = Schema::new().with(
//!     EntityPrefab::new("player").field(FieldPrefab::new("level", VarType::Int).save()),
//! );
//! let cluster = Cluster::builder(Config::default(), schema)
//!     .cache(Arc::new(InMemoryCache::new(4)))
//!     .documents(Arc::new(InMemoryDocumentStore::new()))
//!     .build()
//!     .unwrap();
//!
//! let id = Nuid::new(1, 7);
//! cluster.call(7, move |node| node.create(id, "player", NList::new())).await.unwrap();
//! cluster.call(7, move |node| node.set_field(id, "level", 3)).await.unwrap();
//! let level = cluster
//!     .call(7, move |node| node.get_field::<i32>(id, "level"))
//!     .await
//!     .unwrap();
//! assert_eq!(level, 3);
//! cluster.shutdown().await;
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod agent;
mod cluster;
mod config;
mod entity;
mod error;
mod event;
mod id;
mod module;
mod node;
mod persist;
mod schema;
mod stats;
mod storage;

pub use agent::Agent;
pub use cluster::{Cluster, ClusterBuilder};
pub use config::Config;
pub use entity::{Entity, Field, Table};
pub use error::{CoreError, CoreResult};
pub use event::{EntityEvent, FieldDelta, FieldEvent, SyncMessage, TableDelta, TableEvent};
pub use id::{IdGenerator, SequenceIdGenerator, SnowflakeIdGenerator};
pub use module::{Module, ModuleDispatcher};
pub use node::Node;
pub use persist::{EntityDocument, PersistenceAdapter, RowDocument, ShardDocument};
pub use schema::{ColumnPrefab, EntityPrefab, FieldPrefab, Schema, TablePrefab};
pub use stats::{ClusterStats, StatsSnapshot};
pub use storage::{CacheAdapter, EntityManager, EntityStorage, StorageMode};

pub use entishard_codec::{KeyType, NList, Nuid, RowKey, Var, VarType, VarValue};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
