// SPDX-License-Identifier: MIT OR Apache-2.0
//! Credential redaction and script-protocol neutralization.
//!
//! Produces a new payload tree with identical structure and sanitized
//! string leaves; non-string scalars and keys pass through untouched.

use crate::patterns::{credential_patterns, redact_all};
use crate::REDACTED;
use serde_json::Value;

/// Script-protocol prefixes neutralized rather than redacted.
const NEUTRALIZED_PREFIXES: &[&str] = &["javascript:", "vbscript:", "data:text/html"];

/// Sanitize one string leaf.
///
/// Returns the rewritten string plus the names of the credential kinds
/// that were redacted.
#[must_use]
pub fn sanitize_str(s: &str) -> (String, Vec<&'static str>) {
    let (mut out, kinds) = redact_all(credential_patterns(), s, REDACTED);
    let lowered = out.to_lowercase();
    for prefix in NEUTRALIZED_PREFIXES {
        if let Some(pos) = lowered.find(prefix) {
            out.replace_range(pos..pos + prefix.len(), "neutralized:");
            break;
        }
    }
    (out, kinds)
}

/// Walk a payload tree and sanitize every string leaf.
///
/// Returns the rewritten tree plus the credential kinds found anywhere.
#[must_use]
pub fn sanitize_tree(payload: &Value) -> (Value, Vec<&'static str>) {
    let mut kinds = Vec::new();
    let out = walk(payload, &mut kinds);
    kinds.sort_unstable();
    kinds.dedup();
    (out, kinds)
}

fn walk(value: &Value, kinds: &mut Vec<&'static str>) -> Value {
    match value {
        Value::String(s) => {
            let (out, mut hit) = sanitize_str(s);
            kinds.append(&mut hit);
            Value::String(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| walk(v, kinds)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), walk(v, kinds)))
                .collect(),
        ),
        other => other.clone(),
    }
}
