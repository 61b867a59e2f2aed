// SPDX-License-Identifier: MIT OR Apache-2.0
//! tg-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable contract for Treaty Gate.
//!
//! Defines the normalized request envelope transports hand to the pipeline,
//! the governance receipt record, per-request proofs, and the canonical
//! JSON / SHA-256 digest discipline every other crate builds on.

/// Per-request governance proof assembly.
pub mod proof;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tg_error::ReasonCode;
use uuid::Uuid;

/// Current contract version string embedded in receipts.
///
/// # Examples
///
/// ```
/// assert_eq!(tg_core::CONTRACT_VERSION, "tg/v0.1");
/// ```
pub const CONTRACT_VERSION: &str = "tg/v0.1";

/// `previous_hash` of the first receipt in a chain: 64 zero nibbles.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Deployment posture. Production enables full manifest verification and
/// strict egress denial on secret detection.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    /// Relaxed checks; egress redacts instead of denying.
    #[default]
    Development,
    /// Manifest verification on load; strict egress.
    Production,
}

/// Risk classification shared by capability descriptors and action specs.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    /// Read-only or advisory operations.
    Low,
    /// Reversible state changes.
    Medium,
    /// Hard-to-reverse state changes.
    High,
    /// Irreversible or externally visible effects.
    Critical,
}

// ---------------------------------------------------------------------------
// Request envelope
// ---------------------------------------------------------------------------

/// A normalized call handed to the pipeline by a transport.
///
/// Transports map their native requests onto this shape and are otherwise
/// opaque to the governance core. The payload is an arbitrary JSON tree;
/// handlers that need stronger typing validate their own schema.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestEnvelope {
    /// Unique identifier for this request.
    pub request_id: Uuid,

    /// Identified caller: peer address, principal id, or stable client id.
    /// Rate, concurrency, and consent are attributed to this value.
    pub actor: String,

    /// Canonical action identifier (e.g. `action:job:run`).
    pub action_id: String,

    /// Logical endpoint the transport routed to.
    pub endpoint: String,

    /// Request payload tree.
    pub payload: serde_json::Value,

    /// Transport headers, normalized to lowercase keys.
    pub headers: BTreeMap<String, String>,

    /// When the transport accepted the request.
    pub arrival_time: DateTime<Utc>,

    /// Client-supplied idempotency key for side-effecting actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl RequestEnvelope {
    /// Structural validation: a malformed envelope is denied before any
    /// other stage runs.
    ///
    /// # Errors
    ///
    /// Returns the first defect as a human-readable string.
    pub fn validate(&self) -> Result<(), String> {
        if self.actor.trim().is_empty() {
            return Err("actor must not be empty".into());
        }
        if self.action_id.trim().is_empty() {
            return Err("action_id must not be empty".into());
        }
        if self.endpoint.trim().is_empty() {
            return Err("endpoint must not be empty".into());
        }
        Ok(())
    }

    /// Digest of the whole envelope in canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Json`] if the envelope cannot be serialized.
    pub fn digest(&self) -> Result<String, ContractError> {
        Ok(sha256_hex(canonical_json(self)?.as_bytes()))
    }
}

/// Builder for constructing [`RequestEnvelope`]s ergonomically.
///
/// # Examples
///
/// ```
/// use tg_core::EnvelopeBuilder;
///
/// let env = EnvelopeBuilder::new("client-7", "action:job:run")
///     .endpoint("/jobs")
///     .payload(serde_json::json!({"job": "index"}))
///     .build();
///
/// assert_eq!(env.actor, "client-7");
/// assert!(env.validate().is_ok());
/// ```
#[derive(Debug)]
pub struct EnvelopeBuilder {
    actor: String,
    action_id: String,
    endpoint: String,
    payload: serde_json::Value,
    headers: BTreeMap<String, String>,
    arrival_time: DateTime<Utc>,
    idempotency_key: Option<String>,
}

impl EnvelopeBuilder {
    /// Create a builder for the given actor and action.
    #[must_use]
    pub fn new(actor: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            action_id: action_id.into(),
            endpoint: "/".into(),
            payload: serde_json::Value::Null,
            headers: BTreeMap::new(),
            arrival_time: Utc::now(),
            idempotency_key: None,
        }
    }

    /// Set the logical endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the payload tree.
    #[must_use]
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Add a header (key is lowercased).
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// Set the arrival timestamp (defaults to now).
    #[must_use]
    pub fn arrival_time(mut self, at: DateTime<Utc>) -> Self {
        self.arrival_time = at;
        self
    }

    /// Set the client idempotency key.
    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Consume the builder and produce a [`RequestEnvelope`].
    #[must_use]
    pub fn build(self) -> RequestEnvelope {
        RequestEnvelope {
            request_id: Uuid::new_v4(),
            actor: self.actor,
            action_id: self.action_id,
            endpoint: self.endpoint,
            payload: self.payload,
            headers: self.headers,
            arrival_time: self.arrival_time,
            idempotency_key: self.idempotency_key,
        }
    }
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// Terminal decision recorded in a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The operation was permitted.
    Allow,
    /// The operation was refused.
    Deny,
    /// The operation was permitted with a rewritten payload.
    Transform,
}

/// Pipeline stage a receipt or proof entry is attributed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Input firewall.
    Ingress,
    /// Decision kernel.
    Decision,
    /// Side-effect gate.
    Gate,
    /// Application handler.
    Handler,
    /// Non-personhood output policy.
    OutputPolicy,
    /// Output firewall.
    Egress,
}

impl Stage {
    /// Stable string form used in receipts and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingress => "ingress",
            Self::Decision => "decision",
            Self::Gate => "gate",
            Self::Handler => "handler",
            Self::OutputPolicy => "output_policy",
            Self::Egress => "egress",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chained governance receipt: one audit record per verdict.
///
/// Receipts are appended in strict sequence; `self_hash` commits to the
/// predecessor via `previous_hash`, making the journal tamper-evident.
/// Use [`receipt_hash`] (or the chain, which calls it) to fill `self_hash`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Receipt {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// When the receipt was written.
    pub timestamp: DateTime<Utc>,

    /// Job this receipt belongs to; `None` marks a system receipt.
    pub job_id: Option<Uuid>,

    /// Request this receipt belongs to, when attributable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,

    /// Pipeline stage that produced the verdict.
    pub stage: Stage,

    /// Canonical action id the verdict concerns.
    pub action_id: String,

    /// Terminal decision.
    pub decision: Decision,

    /// Reason code for deny/transform receipts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,

    /// Identifier of the policy rule or capability that decided.
    pub policy_id: String,

    /// Identity of the policy artifact in force.
    pub artifact_id: String,

    /// Version of the policy artifact in force.
    pub artifact_version: String,

    /// `self_hash` of the predecessor, or [`GENESIS_HASH`].
    pub previous_hash: String,

    /// Hash over `previous_hash` and the canonical receipt body.
    pub self_hash: Option<String>,

    /// Digest of the payload the verdict was computed over.
    pub payload_digest: String,

    /// Free-form structured notes (proof transcript, replay markers, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, serde_json::Value>,
}

/// Errors from contract-level operations (serialization, hashing).
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// JSON serialization or deserialization failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produce a deterministic JSON string for hashing.
///
/// Not a full JCS implementation, but stable for our types: keys are sorted
/// (serde_json maps are BTreeMaps) and numbers serialize consistently.
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the value cannot be serialized.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, ContractError> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

/// Compute the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Digest of a payload tree in canonical form.
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the payload cannot be serialized.
pub fn payload_digest(payload: &serde_json::Value) -> Result<String, ContractError> {
    Ok(sha256_hex(canonical_json(payload)?.as_bytes()))
}

/// Byte length of a payload tree in canonical form; the size firewalls bound.
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the payload cannot be serialized.
pub fn canonical_size(payload: &serde_json::Value) -> Result<usize, ContractError> {
    Ok(canonical_json(payload)?.len())
}

/// Compute the chained hash of a receipt.
///
/// The stored `self_hash` is forced to `null` before serialization so the
/// output never depends on a previously stored hash, then the predecessor
/// hash is prepended: `sha256(previous_hash ‖ canonical(receipt))`.
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the receipt cannot be serialized.
pub fn receipt_hash(receipt: &Receipt) -> Result<String, ContractError> {
    let mut v = serde_json::to_value(receipt)?;
    if let serde_json::Value::Object(map) = &mut v {
        map.insert("self_hash".to_string(), serde_json::Value::Null);
    }
    let canonical = serde_json::to_string(&v)?;
    let mut hasher = Sha256::new();
    hasher.update(receipt.previous_hash.as_bytes());
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

impl Receipt {
    /// Compute and attach the chained hash, returning the updated receipt.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Json`] if the receipt cannot be serialized.
    pub fn with_hash(mut self) -> Result<Self, ContractError> {
        let h = receipt_hash(&self)?;
        self.self_hash = Some(h);
        Ok(self)
    }

    /// Verify the stored `self_hash` against a recomputation.
    ///
    /// Receipts without a stored hash verify trivially.
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        match (&self.self_hash, receipt_hash(self)) {
            (Some(stored), Ok(computed)) => *stored == computed,
            (Some(_), Err(_)) => false,
            (None, _) => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
