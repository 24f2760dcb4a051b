//! Cluster statistics.
//!
//! Counters are shared by every node of a cluster and can be read while
//! nodes are running.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cluster-wide counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct ClusterStats {
    /// Node activations.
    activations: AtomicU64,
    /// Node deactivations.
    deactivations: AtomicU64,
    /// Operations forwarded to another node.
    forwards: AtomicU64,
    /// Successful persistence flushes.
    flushes: AtomicU64,
    /// Failed persistence flushes.
    flush_failures: AtomicU64,
    /// Sync messages handed to an agent.
    syncs_sent: AtomicU64,
    /// Sync messages dropped by gating.
    syncs_dropped: AtomicU64,
    /// Operations rejected and turned into no-ops.
    rejected: AtomicU64,
}

impl ClusterStats {
    /// Creates a new stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deactivation(&self) {
        self.deactivations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forward(&self) {
        self.forwards.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, ok: bool) {
        if ok {
            self.flushes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.flush_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_sync(&self, sent: bool) {
        if sent {
            self.syncs_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.syncs_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of node activations.
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    /// Returns the number of node deactivations.
    pub fn deactivations(&self) -> u64 {
        self.deactivations.load(Ordering::Relaxed)
    }

    /// Returns the number of forwarded operations.
    pub fn forwards(&self) -> u64 {
        self.forwards.load(Ordering::Relaxed)
    }

    /// Returns the number of successful flushes.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Returns the number of failed flushes.
    pub fn flush_failures(&self) -> u64 {
        self.flush_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of sync messages sent.
    pub fn syncs_sent(&self) -> u64 {
        self.syncs_sent.load(Ordering::Relaxed)
    }

    /// Returns the number of sync messages dropped.
    pub fn syncs_dropped(&self) -> u64 {
        self.syncs_dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of rejected operations.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            activations: self.activations(),
            deactivations: self.deactivations(),
            forwards: self.forwards(),
            flushes: self.flushes(),
            flush_failures: self.flush_failures(),
            syncs_sent: self.syncs_sent(),
            syncs_dropped: self.syncs_dropped(),
            rejected: self.rejected(),
        }
    }
}

/// A point-in-time copy of [`ClusterStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Node activations.
    pub activations: u64,
    /// Node deactivations.
    pub deactivations: u64,
    /// Forwarded operations.
    pub forwards: u64,
    /// Successful flushes.
    pub flushes: u64,
    /// Failed flushes.
    pub flush_failures: u64,
    /// Sync messages sent.
    pub syncs_sent: u64,
    /// Sync messages dropped.
    pub syncs_dropped: u64,
    /// Rejected operations.
    pub rejected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = ClusterStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_split_counters() {
        let stats = ClusterStats::new();
        stats.record_flush(true);
        stats.record_flush(false);
        stats.record_flush(false);
        stats.record_sync(true);
        stats.record_sync(false);

        let snap = stats.snapshot();
        assert_eq!(snap.flushes, 1);
        assert_eq!(snap.flush_failures, 2);
        assert_eq!(snap.syncs_sent, 1);
        assert_eq!(snap.syncs_dropped, 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(ClusterStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_forward();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.forwards(), 800);
    }
}
