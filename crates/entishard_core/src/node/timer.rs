//! Per-entity timers owned by a node.

use entishard_codec::Nuid;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
struct Timer {
    due: Instant,
    period: Option<Duration>,
    remaining: Option<u32>,
}

/// A timer that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fired {
    pub id: Nuid,
    pub name: String,
    /// Beats left after this one, for counted heartbeats.
    pub remaining: Option<u32>,
}

/// Countdowns and heartbeats keyed by entity and name.
///
/// Adding a timer under an existing key replaces it.
#[derive(Debug, Default)]
pub(crate) struct TimerSet {
    timers: BTreeMap<(Nuid, String), Timer>,
}

impl TimerSet {
    pub fn add_countdown(&mut self, id: Nuid, name: String, delay: Duration, now: Instant) {
        self.timers.insert(
            (id, name),
            Timer {
                due: now + delay,
                period: None,
                remaining: None,
            },
        );
    }

    /// Beats every `period`; `count` beats in total, or forever if `None`.
    /// A count of zero schedules nothing.
    pub fn add_heartbeat(&mut self, id: Nuid, name: String, period: Duration, count: Option<u32>, now: Instant) {
        if count == Some(0) {
            self.timers.remove(&(id, name));
            return;
        }
        let period = period.max(MIN_PERIOD);
        self.timers.insert(
            (id, name),
            Timer {
                due: now + period,
                period: Some(period),
                remaining: count,
            },
        );
    }

    pub fn contains(&self, id: Nuid, name: &str) -> bool {
        self.timers.contains_key(&(id, name.to_string()))
    }

    pub fn remove(&mut self, id: Nuid, name: &str) -> bool {
        self.timers.remove(&(id, name.to_string())).is_some()
    }

    pub fn remove_entity(&mut self, id: Nuid) {
        self.timers.retain(|(owner, _), _| *owner != id);
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.due).min()
    }

    /// Removes or reschedules every timer due at `now`, in due order.
    pub fn pop_due(&mut self, now: Instant) -> Vec<Fired> {
        let mut due: Vec<((Nuid, String), Instant)> = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now)
            .map(|(k, t)| (k.clone(), t.due))
            .collect();
        due.sort_by_key(|(_, at)| *at);

        let mut fired = Vec::with_capacity(due.len());
        for (key, _) in due {
            let Some(timer) = self.timers.get_mut(&key) else {
                continue;
            };
            let remaining = timer.remaining.map(|n| n.saturating_sub(1));
            match timer.period {
                Some(period) if remaining != Some(0) => {
                    timer.due += period;
                    timer.remaining = remaining;
                }
                _ => {
                    self.timers.remove(&key);
                }
            }
            let (id, name) = key;
            fired.push(Fired { id, name, remaining });
        }
        fired
    }
}
