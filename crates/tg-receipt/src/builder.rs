// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fluent construction of governance receipts.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tg_core::{Decision, Receipt, Stage, GENESIS_HASH};
use tg_error::ReasonCode;
use uuid::Uuid;

/// Builder for constructing [`Receipt`]s ergonomically.
///
/// Sequence and hashes are assigned by the chain on append; the builder
/// fills the verdict fields.
///
/// # Examples
///
/// ```
/// use tg_receipt::{ReceiptBuilder, Decision, Stage};
///
/// let receipt = ReceiptBuilder::new(Stage::Decision, "action:job:run", Decision::Allow)
///     .policy_id("cap:job-runner")
///     .artifact("genome-abc", "1.0.0")
///     .build();
///
/// assert_eq!(receipt.action_id, "action:job:run");
/// assert!(receipt.self_hash.is_none());
/// ```
#[derive(Debug)]
pub struct ReceiptBuilder {
    stage: Stage,
    action_id: String,
    decision: Decision,
    reason_code: Option<ReasonCode>,
    job_id: Option<Uuid>,
    request_id: Option<Uuid>,
    policy_id: String,
    artifact_id: String,
    artifact_version: String,
    payload_digest: String,
    timestamp: DateTime<Utc>,
    notes: BTreeMap<String, serde_json::Value>,
}

impl ReceiptBuilder {
    /// Start a receipt for the given stage, action, and decision.
    #[must_use]
    pub fn new(stage: Stage, action_id: impl Into<String>, decision: Decision) -> Self {
        Self {
            stage,
            action_id: action_id.into(),
            decision,
            reason_code: None,
            job_id: None,
            request_id: None,
            policy_id: "treaty".into(),
            artifact_id: String::new(),
            artifact_version: String::new(),
            payload_digest: String::new(),
            timestamp: Utc::now(),
            notes: BTreeMap::new(),
        }
    }

    /// Set the reason code (denials and transforms).
    #[must_use]
    pub fn reason(mut self, reason: ReasonCode) -> Self {
        self.reason_code = Some(reason);
        self
    }

    /// Attribute the receipt to a job.
    #[must_use]
    pub fn job(mut self, job_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Attribute the receipt to a request.
    #[must_use]
    pub fn request(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Name the policy rule or capability that decided.
    #[must_use]
    pub fn policy_id(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = policy_id.into();
        self
    }

    /// Attribute the receipt to a policy artifact.
    #[must_use]
    pub fn artifact(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.artifact_id = id.into();
        self.artifact_version = version.into();
        self
    }

    /// Record the digest of the payload the verdict covered.
    #[must_use]
    pub fn payload_digest(mut self, digest: impl Into<String>) -> Self {
        self.payload_digest = digest.into();
        self
    }

    /// Override the receipt timestamp (defaults to now).
    #[must_use]
    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = at;
        self
    }

    /// Attach a structured note.
    #[must_use]
    pub fn note(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.notes.insert(key.into(), value);
        self
    }

    /// Consume the builder and produce an unchained [`Receipt`].
    #[must_use]
    pub fn build(self) -> Receipt {
        Receipt {
            sequence: 0,
            timestamp: self.timestamp,
            job_id: self.job_id,
            request_id: self.request_id,
            stage: self.stage,
            action_id: self.action_id,
            decision: self.decision,
            reason_code: self.reason_code,
            policy_id: self.policy_id,
            artifact_id: self.artifact_id,
            artifact_version: self.artifact_version,
            previous_hash: GENESIS_HASH.to_string(),
            self_hash: None,
            payload_digest: self.payload_digest,
            notes: self.notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_fills_verdict_fields() {
        let job = Uuid::new_v4();
        let r = ReceiptBuilder::new(Stage::Gate, "action:memory:create", Decision::Deny)
            .reason(ReasonCode::JobConcurrencyLimit)
            .job(job)
            .policy_id("gate:concurrency")
            .artifact("genome-x", "2.0.0")
            .note("slots", json!({"actor": 4}))
            .build();

        assert_eq!(r.stage, Stage::Gate);
        assert_eq!(r.decision, Decision::Deny);
        assert_eq!(r.reason_code, Some(ReasonCode::JobConcurrencyLimit));
        assert_eq!(r.job_id, Some(job));
        assert_eq!(r.artifact_version, "2.0.0");
        assert_eq!(r.notes["slots"]["actor"], 4);
        assert_eq!(r.previous_hash, GENESIS_HASH);
    }

    #[test]
    fn default_policy_id_is_treaty() {
        let r = ReceiptBuilder::new(Stage::Ingress, "action:job:run", Decision::Allow).build();
        assert_eq!(r.policy_id, "treaty");
        assert!(r.reason_code.is_none());
    }
}
