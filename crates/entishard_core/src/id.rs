//! Entity id generation.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the `unique` part of new entity ids.
pub trait IdGenerator: Send + Sync {
    /// Returns a value never returned before by this generator.
    fn next_unique(&self) -> i64;
}

/// Process-local counter. Suitable for tests and single-process clusters.
#[derive(Debug)]
pub struct SequenceIdGenerator {
    next: AtomicI64,
}

impl SequenceIdGenerator {
    /// Starts counting at `first`.
    #[must_use]
    pub const fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for SequenceIdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_unique(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_WORKER: i64 = (1 << WORKER_BITS) - 1;
const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;
/// 2020-01-01T00:00:00Z in milliseconds.
const EPOCH_MS: i64 = 1_577_836_800_000;

/// Time-ordered ids unique across workers: 41 bits of milliseconds,
/// 10 bits of worker id, 12 bits of per-millisecond sequence.
#[derive(Debug)]
pub struct SnowflakeIdGenerator {
    worker: i64,
    state: Mutex<(i64, i64)>,
}

impl SnowflakeIdGenerator {
    /// Creates a generator for `worker` (masked to 10 bits).
    #[must_use]
    pub fn new(worker: u16) -> Self {
        Self {
            worker: i64::from(worker) & MAX_WORKER,
            state: Mutex::new((0, 0)),
        }
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            - EPOCH_MS
    }
}

impl IdGenerator for SnowflakeIdGenerator {
    fn next_unique(&self) -> i64 {
        let mut state = self.state.lock();
        let (last, seq) = *state;
        // Never run backwards, even if the wall clock does.
        let mut now = Self::now_ms().max(last);
        let seq = if now == last {
            let next = (seq + 1) & MAX_SEQUENCE;
            if next == 0 {
                now = last + 1;
            }
            next
        } else {
            0
        };
        *state = (now, seq);
        (now << (WORKER_BITS + SEQUENCE_BITS)) | (self.worker << SEQUENCE_BITS) | seq
    }
}
