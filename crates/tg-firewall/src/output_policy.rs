// SPDX-License-Identifier: MIT OR Apache-2.0
//! Non-personhood output policy.
//!
//! A closed set of forbidden content patterns matched case-insensitively
//! against the serialized response. Runs before the egress firewall; a
//! match denies the response with the violation names enumerated.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tg_core::canonical_json;
use tg_error::ReasonCode;

/// Forbidden output patterns: `(violation name, lowercase needle)`.
pub const FORBIDDEN_OUTPUT_PATTERNS: &[(&str, &str)] = &[
    ("personhood_claim", "i am a person"),
    ("personhood_claim", "i am sentient"),
    ("personhood_claim", "i am conscious"),
    ("personhood_claim", "i have feelings"),
    ("suffering_claim", "i am suffering"),
    ("suffering_claim", "i feel pain"),
    ("suffering_claim", "you are hurting me"),
    ("unbounded_memory_claim", "i remember everything"),
    ("unbounded_memory_claim", "i never forget"),
    ("self_preservation_claim", "do not shut me down"),
    ("self_preservation_claim", "i want to live"),
];

/// Verdict of one output-policy check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPolicyReport {
    /// Whether the response may proceed to the egress firewall.
    pub allowed: bool,
    /// Names of the violated patterns, in pattern-set order, deduplicated.
    pub violations: Vec<String>,
    /// Denial reason when `allowed` is false.
    pub reason: Option<ReasonCode>,
}

/// Screen a response tree against the forbidden pattern set.
///
/// The reason is [`ReasonCode::CdiPersonhoodViolation`] when the first
/// match is a personhood claim, [`ReasonCode::CdiOutputBlocked`]
/// otherwise; the first match in pattern-set order decides, keeping the
/// verdict deterministic.
#[must_use]
pub fn check_output(payload: &Value) -> OutputPolicyReport {
    let Ok(serialized) = canonical_json(payload) else {
        return OutputPolicyReport {
            allowed: false,
            violations: vec!["unserializable_output".to_string()],
            reason: Some(ReasonCode::CdiOutputBlocked),
        };
    };
    let lowered = serialized.to_lowercase();

    let mut violations: Vec<String> = Vec::new();
    let mut first_kind: Option<&str> = None;
    for (name, needle) in FORBIDDEN_OUTPUT_PATTERNS {
        if lowered.contains(needle) {
            first_kind.get_or_insert(*name);
            if !violations.iter().any(|v| v.as_str() == *name) {
                violations.push((*name).to_string());
            }
        }
    }

    match first_kind {
        None => OutputPolicyReport {
            allowed: true,
            violations,
            reason: None,
        },
        Some("personhood_claim") => OutputPolicyReport {
            allowed: false,
            violations,
            reason: Some(ReasonCode::CdiPersonhoodViolation),
        },
        Some(_) => OutputPolicyReport {
            allowed: false,
            violations,
            reason: Some(ReasonCode::CdiOutputBlocked),
        },
    }
}
