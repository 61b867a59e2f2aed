// SPDX-License-Identifier: MIT OR Apache-2.0
//! Idempotency ledger for side-effecting actions.
//!
//! Keyed by `sha256(endpoint ‖ client key)`; the stored payload digest
//! distinguishes a legitimate replay (identical payload, stored response
//! returned, no second mutation) from a conflict (same key, different
//! payload, refused without mutation).

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tg_core::sha256_hex;

/// Outcome of an idempotency lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyHit {
    /// No prior call with this key.
    Fresh,
    /// Prior call with identical payload; return the stored response.
    Replay(Value),
    /// Prior call with a different payload; refuse without mutation.
    Conflict,
}

#[derive(Debug, Clone)]
struct StoredOutcome {
    payload_digest: String,
    response: Value,
}

/// Thread-safe idempotency ledger.
#[derive(Debug, Default)]
pub struct IdempotencyLedger {
    entries: Mutex<HashMap<String, StoredOutcome>>,
}

impl IdempotencyLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the ledger key for a call.
    #[must_use]
    pub fn key(endpoint: &str, client_key: &str) -> String {
        let mut material = Vec::with_capacity(endpoint.len() + client_key.len() + 1);
        material.extend_from_slice(endpoint.as_bytes());
        material.push(0);
        material.extend_from_slice(client_key.as_bytes());
        sha256_hex(&material)
    }

    /// Look up a call before executing it.
    #[must_use]
    pub fn check(&self, key: &str, payload_digest: &str) -> IdempotencyHit {
        let entries = self.entries.lock().expect("idempotency lock poisoned");
        match entries.get(key) {
            None => IdempotencyHit::Fresh,
            Some(stored) if stored.payload_digest == payload_digest => {
                IdempotencyHit::Replay(stored.response.clone())
            }
            Some(_) => IdempotencyHit::Conflict,
        }
    }

    /// Record a completed call's response.
    pub fn record(&self, key: String, payload_digest: String, response: Value) {
        self.entries
            .lock()
            .expect("idempotency lock poisoned")
            .insert(
                key,
                StoredOutcome {
                    payload_digest,
                    response,
                },
            );
    }

    /// Number of recorded outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("idempotency lock poisoned").len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_then_replay_then_conflict() {
        let ledger = IdempotencyLedger::new();
        let key = IdempotencyLedger::key("/jobs", "client-key-1");

        assert_eq!(ledger.check(&key, "digest-a"), IdempotencyHit::Fresh);
        ledger.record(key.clone(), "digest-a".into(), json!({"id": 7}));

        assert_eq!(
            ledger.check(&key, "digest-a"),
            IdempotencyHit::Replay(json!({"id": 7}))
        );
        assert_eq!(ledger.check(&key, "digest-b"), IdempotencyHit::Conflict);
    }

    #[test]
    fn keys_separate_endpoints() {
        let a = IdempotencyLedger::key("/jobs", "k");
        let b = IdempotencyLedger::key("/memory", "k");
        assert_ne!(a, b);
    }

    #[test]
    fn key_material_is_unambiguous() {
        // The separator prevents "/a" + "bc" colliding with "/ab" + "c".
        assert_ne!(
            IdempotencyLedger::key("/a", "bc"),
            IdempotencyLedger::key("/ab", "c")
        );
    }
}
