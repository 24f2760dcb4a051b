//! Durable document store interface.

use crate::error::StorageResult;
use async_trait::async_trait;

/// A durable store holding one opaque document per shard.
///
/// # Invariants
///
/// - `find_one` returns exactly the bytes of the last successful `upsert`
/// - A missing document is `Ok(None)`, never an error
/// - A failed `upsert` leaves the previous document in place
///
/// # Implementors
///
/// - [`super::InMemoryDocumentStore`]
/// - [`super::FileDocumentStore`]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads the document of a shard.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn find_one(&self, shard: i64) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the document of a shard, or inserts it if none exists.
    ///
    /// Returns true if an existing document was replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    async fn upsert(&self, shard: i64, document: Vec<u8>) -> StorageResult<bool>;

    /// Lists the shards that have a document, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn shards(&self) -> StorageResult<Vec<i64>>;
}
