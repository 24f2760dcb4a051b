//! Node and cluster configuration.

use crate::storage::StorageMode;
use std::time::Duration;

/// Configuration shared by every node of a cluster.
#[derive(Debug, Clone)]
pub struct Config {
    /// Period of the persistence snapshot while a node is active.
    pub persist_interval: Duration,

    /// Deactivate a node after this long without mail (None = never).
    pub idle_timeout: Option<Duration>,

    /// Bounded mailbox size per node.
    pub mailbox_capacity: usize,

    /// Storage mode of shards that have no persisted record yet.
    pub default_storage_mode: StorageMode,

    /// How many times a call is re-sent to a node that was shutting down.
    pub forward_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            persist_interval: Duration::from_secs(60),
            idle_timeout: None,
            mailbox_capacity: 256,
            default_storage_mode: StorageMode::Hot,
            forward_retries: 1,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the persistence period.
    #[must_use]
    pub const fn persist_interval(mut self, interval: Duration) -> Self {
        self.persist_interval = interval;
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the mailbox capacity.
    #[must_use]
    pub const fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Sets the storage mode for new shards.
    #[must_use]
    pub const fn default_storage_mode(mut self, mode: StorageMode) -> Self {
        self.default_storage_mode = mode;
        self
    }

    /// Sets the number of re-sends to a node that was shutting down.
    #[must_use]
    pub const fn forward_retries(mut self, retries: u32) -> Self {
        self.forward_retries = retries;
        self
    }
}
