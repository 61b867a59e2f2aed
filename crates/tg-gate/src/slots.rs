// SPDX-License-Identifier: MIT OR Apache-2.0
//! Concurrency slots for side-effecting actions.
//!
//! A global semaphore caps total in-flight side effects; a per-actor
//! counter caps any single actor at a fraction of the global budget.
//! Slots release on drop, so success, failure, timeout, and cancellation
//! all return the budget.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps for the side-effect gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimits {
    /// Global cap on in-flight side effects.
    pub max_total: usize,
    /// Per-actor cap; zero means `max_total / 4`, floored at 1.
    pub max_per_actor: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            max_total: 16,
            max_per_actor: 0,
        }
    }
}

impl ConcurrencyLimits {
    /// Effective per-actor cap.
    #[must_use]
    pub fn per_actor(&self) -> usize {
        if self.max_per_actor > 0 {
            self.max_per_actor
        } else {
            (self.max_total / 4).max(1)
        }
    }
}

/// Tracks global and per-actor slot usage.
#[derive(Debug)]
pub struct SlotTable {
    limits: ConcurrencyLimits,
    global: Arc<Semaphore>,
    per_actor: Arc<Mutex<HashMap<String, usize>>>,
}

/// A held slot; dropping it releases both budgets.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
    actor: String,
    per_actor: Arc<Mutex<HashMap<String, usize>>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut counts = self.per_actor.lock().expect("slot table lock poisoned");
        if let Some(count) = counts.get_mut(&self.actor) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&self.actor);
            }
        }
    }
}

impl SlotTable {
    /// Create a table with the given limits.
    #[must_use]
    pub fn new(limits: ConcurrencyLimits) -> Self {
        Self {
            global: Arc::new(Semaphore::new(limits.max_total)),
            per_actor: Arc::new(Mutex::new(HashMap::new())),
            limits,
        }
    }

    /// Try to take a slot for `actor`. Exhaustion returns `None`
    /// immediately; the gate denies rather than queues.
    #[must_use]
    pub fn try_acquire(&self, actor: &str) -> Option<SlotGuard> {
        let permit = Arc::clone(&self.global).try_acquire_owned().ok()?;

        let mut counts = self.per_actor.lock().expect("slot table lock poisoned");
        let count = counts.entry(actor.to_string()).or_insert(0);
        if *count >= self.limits.per_actor() {
            // Dropping the permit returns the global slot.
            return None;
        }
        *count += 1;
        drop(counts);

        Some(SlotGuard {
            _permit: permit,
            actor: actor.to_string(),
            per_actor: Arc::clone(&self.per_actor),
        })
    }

    /// Global slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.global.available_permits()
    }

    /// Slots currently held by `actor`.
    #[must_use]
    pub fn held_by(&self, actor: &str) -> usize {
        self.per_actor
            .lock()
            .expect("slot table lock poisoned")
            .get(actor)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_actor_defaults_to_quarter_of_global() {
        let limits = ConcurrencyLimits {
            max_total: 16,
            max_per_actor: 0,
        };
        assert_eq!(limits.per_actor(), 4);

        let tiny = ConcurrencyLimits {
            max_total: 2,
            max_per_actor: 0,
        };
        assert_eq!(tiny.per_actor(), 1);
    }

    #[test]
    fn acquire_and_release() {
        let table = SlotTable::new(ConcurrencyLimits {
            max_total: 2,
            max_per_actor: 2,
        });
        let g1 = table.try_acquire("a").unwrap();
        let g2 = table.try_acquire("a").unwrap();
        assert!(table.try_acquire("a").is_none());
        assert_eq!(table.held_by("a"), 2);

        drop(g1);
        assert_eq!(table.held_by("a"), 1);
        let _g3 = table.try_acquire("a").unwrap();
        drop(g2);
    }

    #[test]
    fn per_actor_cap_leaves_global_budget_for_others() {
        let table = SlotTable::new(ConcurrencyLimits {
            max_total: 4,
            max_per_actor: 1,
        });
        let _a = table.try_acquire("a").unwrap();
        // Actor a is capped, but b still fits.
        assert!(table.try_acquire("a").is_none());
        assert!(table.try_acquire("b").is_some());
    }

    #[test]
    fn denied_per_actor_attempt_returns_global_permit() {
        let table = SlotTable::new(ConcurrencyLimits {
            max_total: 2,
            max_per_actor: 1,
        });
        let _a = table.try_acquire("a").unwrap();
        assert_eq!(table.available(), 1);
        assert!(table.try_acquire("a").is_none());
        // The failed attempt must not leak the global permit.
        assert_eq!(table.available(), 1);
    }
}
