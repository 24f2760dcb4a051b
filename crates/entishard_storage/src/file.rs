//! File-based document store.
//!
//! Layout:
//!
//! ```text
//! <dir>/
//! ├─ LOCK               # Advisory lock for single-writer
//! ├─ shard-<n>.doc      # Document of shard n
//! └─ shard-<n>.doc.tmp  # Transient, during a write
//! ```

use crate::document::DocumentStore;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const DOC_PREFIX: &str = "shard-";
const DOC_SUFFIX: &str = ".doc";

/// A document store keeping one file per shard.
///
/// Writes go to a temporary file which is synced and then renamed over the
/// previous document, so a crash mid-write leaves the old document intact.
///
/// A writable store holds an exclusive lock on its directory for its whole
/// lifetime. Read-only stores take no lock and reject writes.
///
/// File I/O runs on tokio's blocking pool.
#[derive(Debug)]
pub struct FileDocumentStore {
    dir: PathBuf,
    lock: Option<File>,
}

impl FileDocumentStore {
    /// Opens or creates a writable store in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another store holds the directory, or an I/O
    /// error if it cannot be created.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock.try_lock_exclusive().is_err() {
            warn!(dir = %dir.display(), "document store already locked");
            return Err(StorageError::Locked(dir.to_path_buf()));
        }
        debug!(dir = %dir.display(), "document store opened");
        Ok(Self {
            dir: dir.to_path_buf(),
            lock: Some(lock),
        })
    }

    /// Opens an existing store for inspection without locking it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `dir` is not a directory.
    pub fn open_read_only(dir: &Path) -> StorageResult<Self> {
        if !dir.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("not a directory: {}", dir.display()),
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            lock: None,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of a shard's document.
    #[must_use]
    pub fn document_path(&self, shard: i64) -> PathBuf {
        self.dir.join(format!("{DOC_PREFIX}{shard}{DOC_SUFFIX}"))
    }

    /// Reads a shard's document synchronously.
    ///
    /// # Errors
    ///
    /// Returns an I/O error other than "not found".
    pub fn read_blocking(&self, shard: i64) -> StorageResult<Option<Vec<u8>>> {
        read_document(&self.document_path(shard))
    }

    /// Lists shards with a document synchronously.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be listed.
    pub fn shards_blocking(&self) -> StorageResult<Vec<i64>> {
        list_shards(&self.dir)
    }
}

fn read_document(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_document(path: &Path, bytes: &[u8]) -> StorageResult<bool> {
    let existed = path.exists();
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let mut file = File::create(&temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temp, path)?;
    Ok(existed)
}

fn list_shards(dir: &Path) -> StorageResult<Vec<i64>> {
    let mut shards = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(shard) = name
            .strip_prefix(DOC_PREFIX)
            .and_then(|rest| rest.strip_suffix(DOC_SUFFIX))
            .and_then(|n| n.parse::<i64>().ok())
        {
            shards.push(shard);
        }
    }
    shards.sort_unstable();
    Ok(shards)
}

async fn blocking<T, F>(f: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Unavailable(e.to_string()))?
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn find_one(&self, shard: i64) -> StorageResult<Option<Vec<u8>>> {
        let path = self.document_path(shard);
        blocking(move || read_document(&path)).await
    }

    async fn upsert(&self, shard: i64, document: Vec<u8>) -> StorageResult<bool> {
        if self.lock.is_none() {
            warn!(shard, dir = %self.dir.display(), "write to read-only document store");
            return Err(StorageError::Unavailable(format!(
                "{} is opened read-only",
                self.dir.display()
            )));
        }
        let path = self.document_path(shard);
        let bytes = document.len();
        let existed = blocking(move || write_document(&path, &document)).await?;
        debug!(shard, bytes, existed, "document written");
        Ok(existed)
    }

    async fn shards(&self) -> StorageResult<Vec<i64>> {
        let dir = self.dir.clone();
        blocking(move || list_shards(&dir)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_missing_document_is_none() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();
        assert_eq!(store.find_one(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_upsert_replaces() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();
        assert!(!store.upsert(2, b"first".to_vec()).await.unwrap());
        assert!(store.upsert(2, b"second".to_vec()).await.unwrap());
        assert_eq!(store.find_one(2).await.unwrap(), Some(b"second".to_vec()));
        assert!(!dir.path().join("shard-2.doc.tmp").exists());
    }

    #[tokio::test]
    async fn file_lists_shards() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();
        store.upsert(10, vec![0]).await.unwrap();
        store.upsert(-1, vec![0]).await.unwrap();
        store.upsert(3, vec![0]).await.unwrap();
        assert_eq!(store.shards().await.unwrap(), vec![-1, 3, 10]);
    }

    #[tokio::test]
    async fn file_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileDocumentStore::open(dir.path()).unwrap();
            store.upsert(1, b"kept".to_vec()).await.unwrap();
        }
        let store = FileDocumentStore::open(dir.path()).unwrap();
        assert_eq!(store.find_one(1).await.unwrap(), Some(b"kept".to_vec()));
    }

    #[test]
    fn file_second_writer_is_locked_out() {
        let dir = tempdir().unwrap();
        let _first = FileDocumentStore::open(dir.path()).unwrap();
        let second = FileDocumentStore::open(dir.path());
        assert!(matches!(second, Err(StorageError::Locked(_))));
    }

    #[tokio::test]
    async fn file_read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let writer = FileDocumentStore::open(dir.path()).unwrap();
        writer.upsert(1, vec![7]).await.unwrap();

        let reader = FileDocumentStore::open_read_only(dir.path()).unwrap();
        assert_eq!(reader.read_blocking(1).unwrap(), Some(vec![7]));
        assert!(reader.upsert(1, vec![8]).await.is_err());
    }
}
