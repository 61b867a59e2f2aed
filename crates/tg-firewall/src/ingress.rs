// SPDX-License-Identifier: MIT OR Apache-2.0
//! Input firewall: size bound, rate limit, quarantine, sanitization.
//!
//! Checks run in a fixed order and the first failure short-circuits. A
//! quarantined request is never sanitized; its payload does not travel
//! further down the pipeline.

use crate::patterns::first_quarantine_hit;
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::sanitize::sanitize_tree;
use crate::{V_RATE_LIMITED, V_REQUEST_TOO_LARGE, V_SUSPICIOUS_PATTERN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tg_core::canonical_size;
use tg_error::ReasonCode;
use tracing::{debug, warn};

/// Ingress firewall settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Canonical payload byte cap.
    pub max_request_size: usize,
    /// Per-actor rate budget.
    pub rate: RateLimitConfig,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024,
            rate: RateLimitConfig::default(),
        }
    }
}

/// Verdict of one ingress inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressReport {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Whether the payload hit the quarantine pattern set.
    pub quarantined: bool,
    /// Sanitized payload; equal to `Value::Null` when not allowed.
    pub sanitized_payload: Value,
    /// Stable violation messages, in detection order.
    pub violations: Vec<String>,
    /// Denial reason when `allowed` is false.
    pub reason: Option<ReasonCode>,
    /// Rate budget left in the actor's current window, when known.
    pub rate_remaining: Option<u32>,
}

impl IngressReport {
    fn denied(reason: ReasonCode, violation: &str, quarantined: bool) -> Self {
        Self {
            allowed: false,
            quarantined,
            sanitized_payload: Value::Null,
            violations: vec![violation.to_string()],
            reason: Some(reason),
            rate_remaining: None,
        }
    }
}

/// The input firewall.
#[derive(Debug)]
pub struct IngressFirewall {
    config: IngressConfig,
    limiter: RateLimiter,
}

impl IngressFirewall {
    /// Create a firewall with the given settings.
    #[must_use]
    pub fn new(config: IngressConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate),
            config,
        }
    }

    /// Run the ordered ingress checks for one request.
    pub fn inspect(
        &self,
        actor: &str,
        endpoint: &str,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> IngressReport {
        // 1. Size bound over the canonical form.
        let size = match canonical_size(payload) {
            Ok(n) => n,
            Err(_) => {
                return IngressReport::denied(
                    ReasonCode::MalformedRequest,
                    V_REQUEST_TOO_LARGE,
                    false,
                );
            }
        };
        if size > self.config.max_request_size {
            debug!(target: "tg.ingress", actor, endpoint, size, "request over size cap");
            return IngressReport::denied(ReasonCode::CifIngressBlocked, V_REQUEST_TOO_LARGE, false);
        }

        // 2. Per-actor rate budget.
        let rate = self.limiter.check(actor, now);
        if !rate.allowed {
            debug!(target: "tg.ingress", actor, endpoint, "rate budget exhausted");
            let mut report =
                IngressReport::denied(ReasonCode::CifRateLimited, V_RATE_LIMITED, false);
            report.rate_remaining = Some(0);
            return report;
        }

        // 3. Structural quarantine over every string leaf.
        if let Some(pattern) = scan_tree(payload) {
            warn!(target: "tg.ingress", actor, endpoint, pattern, "payload quarantined");
            let mut report =
                IngressReport::denied(ReasonCode::CifQuarantined, V_SUSPICIOUS_PATTERN, true);
            report.rate_remaining = Some(rate.remaining);
            return report;
        }

        // 4. Sanitization pass.
        let (sanitized, _kinds) = sanitize_tree(payload);
        IngressReport {
            allowed: true,
            quarantined: false,
            sanitized_payload: sanitized,
            violations: vec![],
            reason: None,
            rate_remaining: Some(rate.remaining),
        }
    }

    /// Quarantine scan without rate or size effects, for canary probes.
    #[must_use]
    pub fn probe_quarantine(&self, payload: &Value) -> bool {
        scan_tree(payload).is_some()
    }

    /// Drop idle rate buckets.
    pub fn prune(&self, now: DateTime<Utc>) {
        self.limiter.prune(now);
    }
}

/// First quarantine hit across all string leaves, depth-first.
fn scan_tree(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(s) => first_quarantine_hit(s),
        Value::Array(items) => items.iter().find_map(scan_tree),
        Value::Object(map) => map.values().find_map(scan_tree),
        _ => None,
    }
}
