//! In-memory stores for testing and single-process deployments.

use crate::cache::{CacheClient, CacheCommand, CacheReply};
use crate::document::DocumentStore;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

type Hash = BTreeMap<String, String>;
type Database = HashMap<String, Hash>;

/// An in-memory hash cache.
///
/// Each logical database is a map of hashes behind its own lock, so
/// transactions on different databases never contend.
///
/// Transactions can be made to fail with [`InMemoryCache::fail_transactions`]
/// to exercise abort paths.
///
/// # Example
///
/// ```rust
/// use entishard_storage::{CacheClient, CacheCommand, InMemoryCache};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let cache = InMemoryCache::new(2);
/// cache
///     .exec(0, vec![CacheCommand::HSet {
///         key: "fields:1".into(),
///         field: "level".into(),
///         value: "3".into(),
///     }])
///     .await
///     .unwrap();
/// assert_eq!(cache.hlen(0, "fields:1").await.unwrap(), 1);
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryCache {
    dbs: Vec<RwLock<Database>>,
    fail_next: AtomicUsize,
    transactions: AtomicUsize,
}

impl InMemoryCache {
    /// Creates a cache with `databases` logical databases (at least one).
    #[must_use]
    pub fn new(databases: usize) -> Self {
        Self {
            dbs: (0..databases.max(1)).map(|_| RwLock::default()).collect(),
            fail_next: AtomicUsize::new(0),
            transactions: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` transactions abort without applying anything.
    pub fn fail_transactions(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of transactions that executed successfully.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }

    /// Number of keys held in one database.
    #[must_use]
    pub fn key_count(&self, db: usize) -> usize {
        self.dbs.get(db).map_or(0, |d| d.read().len())
    }

    fn db(&self, db: usize) -> StorageResult<&RwLock<Database>> {
        self.dbs.get(db).ok_or(StorageError::InvalidDatabase {
            db,
            databases: self.dbs.len(),
        })
    }

    fn apply(data: &mut Database, command: CacheCommand) -> CacheReply {
        match command {
            CacheCommand::HSet { key, field, value } => {
                CacheReply::Bool(data.entry(key).or_default().insert(field, value).is_none())
            }
            CacheCommand::HMSet { key, entries } => {
                if !entries.is_empty() {
                    data.entry(key).or_default().extend(entries);
                }
                CacheReply::Ok
            }
            CacheCommand::HGetAll { key } => CacheReply::Hash(
                data.get(&key)
                    .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
                    .unwrap_or_default(),
            ),
            CacheCommand::HDel { key, field } => CacheReply::Bool(Self::remove_field(data, &key, &field)),
            CacheCommand::Del { key } => CacheReply::Bool(data.remove(&key).is_some()),
        }
    }

    fn remove_field(data: &mut Database, key: &str, field: &str) -> bool {
        let Some(hash) = data.get_mut(key) else {
            return false;
        };
        let removed = hash.remove(field).is_some();
        if hash.is_empty() {
            data.remove(key);
        }
        removed
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl CacheClient for InMemoryCache {
    fn databases(&self) -> usize {
        self.dbs.len()
    }

    async fn hget(&self, db: usize, key: &str, field: &str) -> StorageResult<Option<String>> {
        Ok(self.db(db)?.read().get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hset(&self, db: usize, key: &str, field: &str, value: &str) -> StorageResult<bool> {
        let mut data = self.db(db)?.write();
        Ok(data
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string())
            .is_none())
    }

    async fn hsetnx(&self, db: usize, key: &str, field: &str, value: &str) -> StorageResult<bool> {
        let mut data = self.db(db)?.write();
        let hash = data.entry(key.to_string()).or_default();
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value.to_string());
        Ok(true)
    }

    async fn hexists(&self, db: usize, key: &str, field: &str) -> StorageResult<bool> {
        Ok(self.db(db)?.read().get(key).is_some_and(|h| h.contains_key(field)))
    }

    async fn hgetall(&self, db: usize, key: &str) -> StorageResult<Vec<(String, String)>> {
        Ok(self
            .db(db)?
            .read()
            .get(key)
            .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn hkeys(&self, db: usize, key: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .db(db)?
            .read()
            .get(key)
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn hlen(&self, db: usize, key: &str) -> StorageResult<usize> {
        Ok(self.db(db)?.read().get(key).map_or(0, BTreeMap::len))
    }

    async fn hdel(&self, db: usize, key: &str, field: &str) -> StorageResult<bool> {
        Ok(Self::remove_field(&mut self.db(db)?.write(), key, field))
    }

    async fn del(&self, db: usize, key: &str) -> StorageResult<bool> {
        Ok(self.db(db)?.write().remove(key).is_some())
    }

    async fn exec(&self, db: usize, commands: Vec<CacheCommand>) -> StorageResult<Vec<CacheReply>> {
        let lock = self.db(db)?;
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::TransactionAborted(format!(
                "injected failure ({} commands discarded)",
                commands.len()
            )));
        }

        let mut data = lock.write();
        let replies = commands
            .into_iter()
            .map(|command| Self::apply(&mut data, command))
            .collect();
        self.transactions.fetch_add(1, Ordering::SeqCst);
        Ok(replies)
    }
}

/// An in-memory document store.
///
/// Writes can be made to fail with [`InMemoryDocumentStore::fail_writes`].
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<BTreeMap<i64, Vec<u8>>>,
    fail_next: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` upserts fail.
    pub fn fail_writes(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of successful upserts.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_one(&self, shard: i64) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.docs.read().get(&shard).cloned())
    }

    async fn upsert(&self, shard: i64, document: Vec<u8>) -> StorageResult<bool> {
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::Unavailable(format!(
                "injected write failure for shard {shard}"
            )));
        }
        let replaced = self.docs.write().insert(shard, document).is_some();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(replaced)
    }

    async fn shards(&self) -> StorageResult<Vec<i64>> {
        Ok(self.docs.read().keys().copied().collect())
    }
}
