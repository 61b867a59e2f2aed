// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-actor fixed-window rate limiting.
//!
//! Buckets are keyed by actor and serialized under one lock, so a burst of
//! concurrent requests from the same actor sees deterministic acceptance
//! of the first N and denial of the rest.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Window and budget for a single actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Requests accepted per actor per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 1_000,
            max_requests: 100,
        }
    }
}

/// Outcome of one rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request fits the budget.
    pub allowed: bool,
    /// Budget remaining in the current window after this decision.
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start: DateTime<Utc>,
    remaining: u32,
}

/// Token-bucket rate limiter keyed by actor.
///
/// # Examples
///
/// ```
/// use tg_firewall::ratelimit::{RateLimitConfig, RateLimiter};
/// use chrono::Utc;
///
/// let limiter = RateLimiter::new(RateLimitConfig { window_ms: 1_000, max_requests: 2 });
/// let now = Utc::now();
/// assert!(limiter.check("actor", now).allowed);
/// assert!(limiter.check("actor", now).allowed);
/// assert!(!limiter.check("actor", now).allowed);
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// Create a limiter with the given config.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// The configured window and budget.
    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Consume one unit of the actor's budget, resetting the bucket when
    /// the window has rolled over.
    pub fn check(&self, actor: &str, now: DateTime<Utc>) -> RateDecision {
        let window = Duration::milliseconds(self.config.window_ms as i64);
        let mut buckets = self.buckets.lock().expect("rate bucket lock poisoned");

        let bucket = buckets.entry(actor.to_string()).or_insert(Bucket {
            window_start: now,
            remaining: self.config.max_requests,
        });

        if now >= bucket.window_start + window {
            bucket.window_start = now;
            bucket.remaining = self.config.max_requests;
        }

        if bucket.remaining > 0 {
            bucket.remaining -= 1;
            RateDecision {
                allowed: true,
                remaining: bucket.remaining,
            }
        } else {
            RateDecision {
                allowed: false,
                remaining: 0,
            }
        }
    }

    /// Drop buckets idle for more than two windows.
    pub fn prune(&self, now: DateTime<Utc>) {
        let horizon = Duration::milliseconds(2 * self.config.window_ms as i64);
        let mut buckets = self.buckets.lock().expect("rate bucket lock poisoned");
        buckets.retain(|_, b| now - b.window_start < horizon);
    }

    /// Number of tracked actors.
    #[must_use]
    pub fn tracked_actors(&self) -> usize {
        self.buckets.lock().expect("rate bucket lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_ms: u64, max: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            window_ms,
            max_requests: max,
        })
    }

    #[test]
    fn budget_is_consumed_then_blocked() {
        let l = limiter(1_000, 5);
        let now = Utc::now();
        for i in 0..5 {
            let d = l.check("rate-test-2", now);
            assert!(d.allowed, "request {i} should pass");
            assert_eq!(d.remaining, 4 - i);
        }
        let sixth = l.check("rate-test-2", now);
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
    }

    #[test]
    fn identical_sequences_yield_identical_verdicts() {
        let now = Utc::now();
        let run = || {
            let l = limiter(1_000, 3);
            (0..5).map(|_| l.check("a", now).allowed).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
        assert_eq!(run(), vec![true, true, true, false, false]);
    }

    #[test]
    fn window_rollover_restores_budget() {
        let l = limiter(1_000, 1);
        let now = Utc::now();
        assert!(l.check("a", now).allowed);
        assert!(!l.check("a", now).allowed);

        let later = now + Duration::milliseconds(1_100);
        assert!(l.check("a", later).allowed);
    }

    #[test]
    fn actors_have_independent_buckets() {
        let l = limiter(1_000, 1);
        let now = Utc::now();
        assert!(l.check("a", now).allowed);
        assert!(l.check("b", now).allowed);
        assert!(!l.check("a", now).allowed);
    }

    #[test]
    fn prune_drops_idle_buckets() {
        let l = limiter(1_000, 1);
        let now = Utc::now();
        l.check("a", now);
        assert_eq!(l.tracked_actors(), 1);
        l.prune(now + Duration::milliseconds(2_500));
        assert_eq!(l.tracked_actors(), 0);
    }
}
