//! # entishard storage
//!
//! The two shared external stores every shard talks to.
//!
//! Stores here are **opaque**: the cache holds string hashes, the document
//! store holds one byte blob per shard. Neither knows about entities,
//! schemas or encodings; `entishard_core` owns all interpretation.
//!
//! ## Available Stores
//!
//! - [`CacheClient`]: Redis-style hashes partitioned into a fixed number of
//!   logical databases, with multi-command transactions
//!   - [`InMemoryCache`]: for tests and single-process deployments
//! - [`DocumentStore`]: per-shard find-one and upsert
//!   - [`InMemoryDocumentStore`]: for tests
//!   - [`FileDocumentStore`]: one file per shard in a locked directory
//!
//! ## Example
//!
//! ```rust
//! use entishard_storage::{CacheClient, InMemoryCache};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let cache = InMemoryCache::new(4);
//! cache.hset(1, "entities:1", "7", "player").await.unwrap();
//! let ty = cache.hget(1, "entities:1", "7").await.unwrap();
//! assert_eq!(ty.as_deref(), Some("player"));
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod document;
mod error;
mod file;
mod memory;

pub use cache::{CacheClient, CacheCommand, CacheReply};
pub use document::DocumentStore;
pub use error::{StorageError, StorageResult};
pub use file::FileDocumentStore;
pub use memory::{InMemoryCache, InMemoryDocumentStore};
