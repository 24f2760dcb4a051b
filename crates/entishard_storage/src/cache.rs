//! Remote key-value cache interface.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;

/// One command inside a cache transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheCommand {
    /// Set one hash field.
    HSet {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
        /// Field value.
        value: String,
    },
    /// Set many fields of one hash.
    HMSet {
        /// Hash key.
        key: String,
        /// Field/value pairs.
        entries: Vec<(String, String)>,
    },
    /// Read all fields of a hash.
    HGetAll {
        /// Hash key.
        key: String,
    },
    /// Delete one hash field.
    HDel {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
    },
    /// Delete a whole key.
    Del {
        /// Key to delete.
        key: String,
    },
}

/// The reply to one [`CacheCommand`], in command order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheReply {
    /// Reply to `HMSet`.
    Ok,
    /// Reply to `HSet` (field was new), `HDel` and `Del` (something was removed).
    Bool(bool),
    /// Reply to `HGetAll`; empty if the key does not exist.
    Hash(Vec<(String, String)>),
}

impl CacheReply {
    /// Unwraps an `HGetAll` reply.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedReply` for any other variant.
    pub fn into_hash(self) -> StorageResult<Vec<(String, String)>> {
        match self {
            CacheReply::Hash(entries) => Ok(entries),
            other => Err(StorageError::UnexpectedReply(format!(
                "expected hash, got {other:?}"
            ))),
        }
    }
}

/// A Redis-style hash cache partitioned into logical databases.
///
/// Every call names its database explicitly. Callers pick the database as
/// `origin mod databases()` so that one shard always lands on the same
/// partition.
///
/// # Invariants
///
/// - A hash whose last field is deleted ceases to exist
/// - `exec` applies all of its commands or none of them
/// - Stores must be `Send + Sync`; one client is shared by every shard
///
/// # Implementors
///
/// - [`super::InMemoryCache`]
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Number of logical databases.
    fn databases(&self) -> usize;

    /// Reads one hash field.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or `db` is invalid.
    async fn hget(&self, db: usize, key: &str, field: &str) -> StorageResult<Option<String>>;

    /// Writes one hash field. Returns true if the field is new.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or `db` is invalid.
    async fn hset(&self, db: usize, key: &str, field: &str, value: &str) -> StorageResult<bool>;

    /// Writes one hash field only if it does not exist yet. Returns true if
    /// the field was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or `db` is invalid.
    async fn hsetnx(&self, db: usize, key: &str, field: &str, value: &str) -> StorageResult<bool>;

    /// Returns true if the hash field exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or `db` is invalid.
    async fn hexists(&self, db: usize, key: &str, field: &str) -> StorageResult<bool>;

    /// Reads every field of a hash. Missing keys read as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or `db` is invalid.
    async fn hgetall(&self, db: usize, key: &str) -> StorageResult<Vec<(String, String)>>;

    /// Lists the field names of a hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or `db` is invalid.
    async fn hkeys(&self, db: usize, key: &str) -> StorageResult<Vec<String>>;

    /// Number of fields in a hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or `db` is invalid.
    async fn hlen(&self, db: usize, key: &str) -> StorageResult<usize>;

    /// Deletes one hash field. Returns true if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or `db` is invalid.
    async fn hdel(&self, db: usize, key: &str, field: &str) -> StorageResult<bool>;

    /// Deletes a key. Returns true if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or `db` is invalid.
    async fn del(&self, db: usize, key: &str) -> StorageResult<bool>;

    /// Executes commands as one atomic transaction.
    ///
    /// Returns one reply per command, in order.
    ///
    /// # Errors
    ///
    /// Returns `TransactionAborted` if the transaction did not execute. In
    /// that case none of the commands took effect.
    async fn exec(&self, db: usize, commands: Vec<CacheCommand>) -> StorageResult<Vec<CacheReply>>;
}
