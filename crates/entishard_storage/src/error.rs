//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A cache database index outside the configured range.
    #[error("cache database {db} out of range (databases: {databases})")]
    InvalidDatabase {
        /// The requested database index.
        db: usize,
        /// Number of configured databases.
        databases: usize,
    },

    /// A multi-command transaction did not execute; nothing was applied.
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// A reply did not have the shape its command implies.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Stored data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The store directory is held by another process.
    #[error("store directory is locked: {0}")]
    Locked(PathBuf),

    /// The store is temporarily unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
