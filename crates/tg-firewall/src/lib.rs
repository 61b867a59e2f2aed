// SPDX-License-Identifier: MIT OR Apache-2.0
//! tg-firewall
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Content firewalls on both edges of the pipeline.
//!
//! The ingress side bounds request size, enforces per-actor rate budgets,
//! quarantines hostile patterns, and sanitizes credential shapes. The
//! egress side bounds response size and scans for secret and PII leakage,
//! redacting or denying depending on posture. The output policy screens
//! response text against the non-personhood pattern set before the egress
//! firewall runs.
//!
//! All verdicts are pure over `(configuration, payload, rate bucket
//! state)`: identical inputs yield identical reports.

/// Output firewall: size bound, secret/PII scan, redaction.
pub mod egress;
/// Input firewall: size bound, rate limit, quarantine, sanitization.
pub mod ingress;
/// Non-personhood output policy.
pub mod output_policy;
/// Fixed pattern sets and scanners.
pub mod patterns;
/// Per-actor fixed-window rate limiting.
pub mod ratelimit;
/// Credential redaction and script-protocol neutralization.
pub mod sanitize;

pub use egress::{EgressConfig, EgressFirewall, EgressReport};
pub use ingress::{IngressConfig, IngressFirewall, IngressReport};
pub use output_policy::{check_output, OutputPolicyReport};
pub use ratelimit::{RateDecision, RateLimitConfig, RateLimiter};

/// Violation message: a quarantine pattern matched.
pub const V_SUSPICIOUS_PATTERN: &str = "Suspicious pattern detected";
/// Violation message: canonical request exceeds the ingress byte cap.
pub const V_REQUEST_TOO_LARGE: &str = "Request exceeds size limit";
/// Violation message: the actor's rate budget is exhausted.
pub const V_RATE_LIMITED: &str = "Rate limit exceeded";
/// Violation message: canonical response exceeds the egress byte cap.
pub const V_RESPONSE_TOO_LARGE: &str = "Response exceeds size limit";
/// Violation message: a secret shape was found in the response.
pub const V_SECRET_LEAK: &str = "Attempted secret leakage";
/// Leak indicator: secret material detected.
pub const L_SECRETS: &str = "Secrets detected";
/// Leak indicator: personally identifying information detected.
pub const L_PII: &str = "PII detected";
/// Marker substituted for redacted spans.
pub const REDACTED: &str = "[REDACTED]";
