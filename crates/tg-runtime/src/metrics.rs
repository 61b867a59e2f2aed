// SPDX-License-Identifier: MIT OR Apache-2.0
//! Verdict counters for operators and tests. Not a metrics transport.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::Mutex;
use tg_error::ReasonCode;

/// Point-in-time counter snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Requests that completed with a 200.
    pub allows: u64,
    /// Denials keyed by stable reason-code string.
    pub denials: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    /// Total denials across all reasons.
    #[must_use]
    pub fn total_denials(&self) -> u64 {
        self.denials.values().sum()
    }
}

/// Thread-safe per-reason verdict counters.
#[derive(Debug, Default)]
pub struct VerdictMetrics {
    allows: AtomicU64,
    denials: Mutex<BTreeMap<&'static str, u64>>,
}

impl VerdictMetrics {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one allowed request.
    pub fn record_allow(&self) {
        self.allows.fetch_add(1, Relaxed);
    }

    /// Count one denial under its reason code.
    pub fn record_denial(&self, reason: ReasonCode) {
        let mut denials = self.denials.lock().expect("metrics lock poisoned");
        *denials.entry(reason.as_str()).or_insert(0) += 1;
    }

    /// Snapshot the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let denials = self.denials.lock().expect("metrics lock poisoned");
        MetricsSnapshot {
            allows: self.allows.load(Relaxed),
            denials: denials
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect(),
        }
    }
}
