// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output firewall: size bound, secret/PII scan, redaction.
//!
//! Secrets and PII are substring-redacted in a fresh tree with identical
//! structure. In strict posture a secret detection denies the response
//! outright; the sanitized tree is still returned so receipts can record
//! what would have left the process.

use crate::patterns::{pii_patterns, redact_all, secret_patterns};
use crate::{L_PII, L_SECRETS, REDACTED, V_RESPONSE_TOO_LARGE, V_SECRET_LEAK};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tg_core::canonical_size;
use tg_error::ReasonCode;
use tracing::{debug, warn};

/// Egress firewall settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressConfig {
    /// Canonical response byte cap.
    pub max_response_size: usize,
    /// Deny on secret detection instead of redacting and allowing.
    pub strict: bool,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            max_response_size: 4 * 1024 * 1024,
            strict: false,
        }
    }
}

/// Verdict of one egress inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressReport {
    /// Whether the response may leave the process.
    pub allowed: bool,
    /// Response tree with secret and PII spans replaced by `[REDACTED]`.
    pub sanitized_payload: Value,
    /// Stable violation messages.
    pub violations: Vec<String>,
    /// Leak indicators (`Secrets detected`, `PII detected`).
    pub leaks: Vec<String>,
    /// Denial reason when `allowed` is false.
    pub reason: Option<ReasonCode>,
}

/// The output firewall.
#[derive(Debug, Clone)]
pub struct EgressFirewall {
    config: EgressConfig,
}

impl EgressFirewall {
    /// Create a firewall with the given settings.
    #[must_use]
    pub fn new(config: EgressConfig) -> Self {
        Self { config }
    }

    /// Run the ordered egress checks for one response.
    pub fn inspect(&self, actor: &str, endpoint: &str, payload: &Value) -> EgressReport {
        // 1. Size bound over the canonical form.
        let size = canonical_size(payload).unwrap_or(usize::MAX);
        if size > self.config.max_response_size {
            debug!(target: "tg.egress", actor, endpoint, size, "response over size cap");
            return EgressReport {
                allowed: false,
                sanitized_payload: Value::Null,
                violations: vec![V_RESPONSE_TOO_LARGE.to_string()],
                leaks: vec![],
                reason: Some(ReasonCode::CifEgressBlocked),
            };
        }

        // 2–3. Scan and redact string leaves.
        let mut secrets_found = false;
        let mut pii_found = false;
        let sanitized = walk(payload, &mut secrets_found, &mut pii_found);

        let mut violations = Vec::new();
        let mut leaks = Vec::new();
        if secrets_found {
            warn!(target: "tg.egress", actor, endpoint, "secret material in response");
            violations.push(V_SECRET_LEAK.to_string());
            leaks.push(L_SECRETS.to_string());
        }
        if pii_found {
            debug!(target: "tg.egress", actor, endpoint, "pii in response");
            leaks.push(L_PII.to_string());
        }

        let deny = self.config.strict && secrets_found;
        EgressReport {
            allowed: !deny,
            sanitized_payload: sanitized,
            violations,
            leaks,
            reason: deny.then_some(ReasonCode::CifLeakDetected),
        }
    }
}

fn walk(value: &Value, secrets: &mut bool, pii: &mut bool) -> Value {
    match value {
        Value::String(s) => {
            let (after_secrets, secret_kinds) = redact_all(secret_patterns(), s, REDACTED);
            let (out, pii_kinds) = redact_all(pii_patterns(), &after_secrets, REDACTED);
            *secrets |= !secret_kinds.is_empty();
            *pii |= !pii_kinds.is_empty();
            Value::String(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| walk(v, secrets, pii)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), walk(v, secrets, pii)))
                .collect(),
        ),
        other => other.clone(),
    }
}
