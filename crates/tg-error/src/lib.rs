// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable reason-code taxonomy and unified error type for Treaty Gate.
//!
//! Every governance denial carries a [`ReasonCode`] (a machine-readable,
//! stable string tag), a human-readable message, an optional cause chain,
//! and arbitrary key-value context. Use the builder returned by
//! [`GovernError::new`] to construct errors fluently.
//!
//! The code set is closed: transports, receipts, and tests all match on
//! these exact strings, so variants are never renamed or removed.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ReasonClass
// ---------------------------------------------------------------------------

/// Broad failure family a [`ReasonCode`] belongs to.
///
/// The class determines client guidance: `Resource` denials are retryable
/// after backoff, everything else is terminal for the request as sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReasonClass {
    /// Malformed envelope, missing fields, unroutable request.
    Structural,
    /// Gate, firewall, or consent denial.
    Policy,
    /// Registry miss, token replay, artifact signature failure.
    Capability,
    /// Rate or concurrency budget exhausted; retryable.
    Resource,
    /// Handler threw, storage failed, or integrity checks broke.
    Uncertain,
}

impl fmt::Display for ReasonClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Structural => "structural",
            Self::Policy => "policy",
            Self::Capability => "capability",
            Self::Resource => "resource",
            Self::Uncertain => "uncertain",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ReasonCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable governance reason code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    // -- Availability / boot --
    /// The policy artifact is not loaded; no action can be evaluated.
    TreatyUnavailable,
    /// Governance components failed to initialise.
    GovernanceInitFailed,
    /// Receipt store configuration is invalid.
    StoreMisconfigured,
    /// Receipt store failed to initialise.
    StoreInitFailed,

    // -- Consent --
    /// An active stop signal denies this action.
    ConsentStopActive,
    /// Consent for this action was never granted or is paused.
    ConsentNotGranted,

    // -- Input firewall --
    /// Ingress firewall blocked the request.
    CifIngressBlocked,
    /// Ingress firewall quarantined the request payload.
    CifQuarantined,
    /// Per-actor rate budget exhausted.
    CifRateLimited,
    /// Egress firewall blocked the response.
    CifEgressBlocked,
    /// Egress firewall detected an information leak.
    CifLeakDetected,

    // -- Decision kernel --
    /// No capability grants this action.
    CdiActionDenied,
    /// Output policy blocked the response content.
    CdiOutputBlocked,
    /// Payload declares forbidden peer-coordination fields.
    CdiHiveForbidden,
    /// Response content violates the non-personhood policy.
    CdiPersonhoodViolation,

    // -- Gate / execution --
    /// Handler or storage failed; denied fail-closed.
    UncertainFailClosed,
    /// Generic governance denial.
    GovernanceDeny,
    /// No handler registered for the requested action.
    RouteNotFound,
    /// A side effect was attempted without a matching capability token.
    ActionGateBypassAttempt,
    /// Envelope is structurally invalid.
    MalformedRequest,
    /// Action id is not in the closed registry.
    UnregisteredAction,
    /// Capability token was already redeemed.
    TokenReplayed,
    /// Side-effect concurrency budget exhausted.
    JobConcurrencyLimit,
    /// Process is in fail-closed posture; only health probes are served.
    HeartbeatFailClosed,

    // -- Policy artifact --
    /// The policy artifact failed validation.
    GenomeInvalid,

    // -- Knowledge ingestion --
    /// The chunk packet is missing or structurally invalid.
    CpackMissing,
    /// The chunk retriever is unreachable.
    ChunkRetrieverUnavailable,
    /// Claim type requires grounding but has no support.
    TypeRequiresGrounding,
    /// Claim cites chunks the runtime did not fetch in this call.
    UnfetchedChunks,
    /// Claim has no support and the mode only accepts grounded claims.
    NoSupportGroundOnlyMode,
}

impl ReasonCode {
    /// Returns the [`ReasonClass`] this code belongs to.
    #[must_use]
    pub fn class(&self) -> ReasonClass {
        match self {
            Self::MalformedRequest | Self::RouteNotFound | Self::CpackMissing
            | Self::StoreMisconfigured => ReasonClass::Structural,

            Self::ConsentStopActive
            | Self::ConsentNotGranted
            | Self::CifIngressBlocked
            | Self::CifQuarantined
            | Self::CifEgressBlocked
            | Self::CifLeakDetected
            | Self::CdiActionDenied
            | Self::CdiOutputBlocked
            | Self::CdiHiveForbidden
            | Self::CdiPersonhoodViolation
            | Self::GovernanceDeny
            | Self::ActionGateBypassAttempt
            | Self::TypeRequiresGrounding
            | Self::UnfetchedChunks
            | Self::NoSupportGroundOnlyMode => ReasonClass::Policy,

            Self::TreatyUnavailable
            | Self::UnregisteredAction
            | Self::TokenReplayed
            | Self::GenomeInvalid => ReasonClass::Capability,

            Self::CifRateLimited | Self::JobConcurrencyLimit => ReasonClass::Resource,

            Self::UncertainFailClosed
            | Self::GovernanceInitFailed
            | Self::StoreInitFailed
            | Self::ChunkRetrieverUnavailable
            | Self::HeartbeatFailClosed => ReasonClass::Uncertain,
        }
    }

    /// Stable `&'static str` representation (e.g. `"CIF_QUARANTINED"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TreatyUnavailable => "TREATY_UNAVAILABLE",
            Self::GovernanceInitFailed => "GOVERNANCE_INIT_FAILED",
            Self::StoreMisconfigured => "STORE_MISCONFIGURED",
            Self::StoreInitFailed => "STORE_INIT_FAILED",
            Self::ConsentStopActive => "CONSENT_STOP_ACTIVE",
            Self::ConsentNotGranted => "CONSENT_NOT_GRANTED",
            Self::CifIngressBlocked => "CIF_INGRESS_BLOCKED",
            Self::CifQuarantined => "CIF_QUARANTINED",
            Self::CifRateLimited => "CIF_RATE_LIMITED",
            Self::CifEgressBlocked => "CIF_EGRESS_BLOCKED",
            Self::CifLeakDetected => "CIF_LEAK_DETECTED",
            Self::CdiActionDenied => "CDI_ACTION_DENIED",
            Self::CdiOutputBlocked => "CDI_OUTPUT_BLOCKED",
            Self::CdiHiveForbidden => "CDI_HIVE_FORBIDDEN",
            Self::CdiPersonhoodViolation => "CDI_PERSONHOOD_VIOLATION",
            Self::UncertainFailClosed => "UNCERTAIN_FAIL_CLOSED",
            Self::GovernanceDeny => "GOVERNANCE_DENY",
            Self::RouteNotFound => "ROUTE_NOT_FOUND",
            Self::ActionGateBypassAttempt => "ACTION_GATE_BYPASS_ATTEMPT",
            Self::MalformedRequest => "MALFORMED_REQUEST",
            Self::UnregisteredAction => "UNREGISTERED_ACTION",
            Self::TokenReplayed => "TOKEN_REPLAYED",
            Self::JobConcurrencyLimit => "JOB_CONCURRENCY_LIMIT",
            Self::HeartbeatFailClosed => "HEARTBEAT_FAIL_CLOSED",
            Self::GenomeInvalid => "GENOME_INVALID",
            Self::CpackMissing => "CPACK_MISSING",
            Self::ChunkRetrieverUnavailable => "CHUNK_RETRIEVER_UNAVAILABLE",
            Self::TypeRequiresGrounding => "TYPE_REQUIRES_GROUNDING",
            Self::UnfetchedChunks => "UNFETCHED_CHUNKS",
            Self::NoSupportGroundOnlyMode => "NO_SUPPORT_GROUND_ONLY_MODE",
        }
    }

    /// Returns `true` when a client may retry after backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.class() == ReasonClass::Resource
    }

    /// HTTP status a transport should map this code to.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedRequest | Self::CpackMissing => 400,
            Self::RouteNotFound | Self::UnregisteredAction => 404,
            Self::TokenReplayed => 409,
            Self::CifRateLimited | Self::JobConcurrencyLimit => 429,
            Self::TreatyUnavailable
            | Self::HeartbeatFailClosed
            | Self::ChunkRetrieverUnavailable => 503,
            Self::GovernanceInitFailed
            | Self::StoreMisconfigured
            | Self::StoreInitFailed
            | Self::UncertainFailClosed => 500,
            _ => 403,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All reason codes, for exhaustive iteration.
pub const ALL_REASON_CODES: &[ReasonCode] = &[
    ReasonCode::TreatyUnavailable,
    ReasonCode::GovernanceInitFailed,
    ReasonCode::StoreMisconfigured,
    ReasonCode::StoreInitFailed,
    ReasonCode::ConsentStopActive,
    ReasonCode::ConsentNotGranted,
    ReasonCode::CifIngressBlocked,
    ReasonCode::CifQuarantined,
    ReasonCode::CifRateLimited,
    ReasonCode::CifEgressBlocked,
    ReasonCode::CifLeakDetected,
    ReasonCode::CdiActionDenied,
    ReasonCode::CdiOutputBlocked,
    ReasonCode::CdiHiveForbidden,
    ReasonCode::CdiPersonhoodViolation,
    ReasonCode::UncertainFailClosed,
    ReasonCode::GovernanceDeny,
    ReasonCode::RouteNotFound,
    ReasonCode::ActionGateBypassAttempt,
    ReasonCode::MalformedRequest,
    ReasonCode::UnregisteredAction,
    ReasonCode::TokenReplayed,
    ReasonCode::JobConcurrencyLimit,
    ReasonCode::HeartbeatFailClosed,
    ReasonCode::GenomeInvalid,
    ReasonCode::CpackMissing,
    ReasonCode::ChunkRetrieverUnavailable,
    ReasonCode::TypeRequiresGrounding,
    ReasonCode::UnfetchedChunks,
    ReasonCode::NoSupportGroundOnlyMode,
];

// ---------------------------------------------------------------------------
// GovernError
// ---------------------------------------------------------------------------

/// Unified governance error.
///
/// Carries a stable [`ReasonCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
/// User-visible responses carry only the code and message; the context
/// stays in receipts and logs.
///
/// # Builder usage
///
/// ```
/// use tg_error::{GovernError, ReasonCode};
///
/// let err = GovernError::new(ReasonCode::CifRateLimited, "rate budget exhausted")
///     .with_context("actor", "rate-test-2")
///     .with_context("remaining", 0);
/// ```
pub struct GovernError {
    /// Machine-readable reason code.
    pub code: ReasonCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for receipts and diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl GovernError {
    /// Create a new error with the given code and message.
    pub fn new(code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.class()`.
    #[must_use]
    pub fn class(&self) -> ReasonClass {
        self.code.class()
    }
}

impl fmt::Debug for GovernError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("GovernError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for GovernError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for GovernError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`GovernError`] (without the opaque source).
///
/// This is the shape that reaches transports; per the propagation policy it
/// omits internal context unless a caller opts in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GovernErrorDto {
    /// Reason code.
    pub code: ReasonCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl From<&GovernError> for GovernErrorDto {
    fn from(err: &GovernError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
        }
    }
}

impl GovernErrorDto {
    /// The transport-safe variant: code and message only.
    #[must_use]
    pub fn public(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            context: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    #[test]
    fn basic_construction() {
        let err = GovernError::new(ReasonCode::GovernanceDeny, "denied");
        assert_eq!(err.code, ReasonCode::GovernanceDeny);
        assert_eq!(err.message, "denied");
        assert!(err.source.is_none());
        assert!(err.context.is_empty());
    }

    #[test]
    fn display_without_context() {
        let err = GovernError::new(ReasonCode::UnregisteredAction, "no such action");
        assert_eq!(err.to_string(), "[UNREGISTERED_ACTION] no such action");
    }

    #[test]
    fn display_with_context() {
        let err = GovernError::new(ReasonCode::CifRateLimited, "rate budget exhausted")
            .with_context("remaining", 0);
        let s = err.to_string();
        assert!(s.starts_with("[CIF_RATE_LIMITED] rate budget exhausted"));
        assert!(s.contains("remaining"));
    }

    #[test]
    fn builder_with_source() {
        let src = io::Error::new(io::ErrorKind::NotFound, "journal missing");
        let err = GovernError::new(ReasonCode::StoreInitFailed, "store init").with_source(src);
        assert!(err.source.is_some());
        let displayed = std::error::Error::source(&err).unwrap().to_string();
        assert_eq!(displayed, "journal missing");
    }

    #[test]
    fn all_codes_have_unique_as_str() {
        let mut seen = HashSet::new();
        for code in ALL_REASON_CODES {
            let s = code.as_str();
            assert!(seen.insert(s), "duplicate as_str value: {s}");
        }
        assert_eq!(seen.len(), ALL_REASON_CODES.len());
    }

    #[test]
    fn reason_code_count() {
        // The closed set has exactly thirty members.
        assert_eq!(ALL_REASON_CODES.len(), 30);
    }

    #[test]
    fn all_codes_serialize_to_as_str() {
        for code in ALL_REASON_CODES {
            let json = serde_json::to_string(code).unwrap();
            let expected = format!(r#""{}""#, code.as_str());
            assert_eq!(json, expected, "mismatch for {code:?}");
        }
    }

    #[test]
    fn serde_roundtrip() {
        for code in ALL_REASON_CODES {
            let json = serde_json::to_string(code).unwrap();
            let back: ReasonCode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, *code);
        }
    }

    #[test]
    fn resource_codes_are_retryable() {
        assert!(ReasonCode::CifRateLimited.is_retryable());
        assert!(ReasonCode::JobConcurrencyLimit.is_retryable());
        assert!(!ReasonCode::CifQuarantined.is_retryable());
        assert!(!ReasonCode::UncertainFailClosed.is_retryable());
    }

    #[test]
    fn class_assignments() {
        assert_eq!(ReasonCode::MalformedRequest.class(), ReasonClass::Structural);
        assert_eq!(ReasonCode::CifQuarantined.class(), ReasonClass::Policy);
        assert_eq!(ReasonCode::TokenReplayed.class(), ReasonClass::Capability);
        assert_eq!(ReasonCode::JobConcurrencyLimit.class(), ReasonClass::Resource);
        assert_eq!(ReasonCode::HeartbeatFailClosed.class(), ReasonClass::Uncertain);
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(ReasonCode::MalformedRequest.http_status(), 400);
        assert_eq!(ReasonCode::RouteNotFound.http_status(), 404);
        assert_eq!(ReasonCode::TokenReplayed.http_status(), 409);
        assert_eq!(ReasonCode::CifRateLimited.http_status(), 429);
        assert_eq!(ReasonCode::HeartbeatFailClosed.http_status(), 503);
        assert_eq!(ReasonCode::CifQuarantined.http_status(), 403);
    }

    #[test]
    fn dto_public_strips_context() {
        let err = GovernError::new(ReasonCode::CdiActionDenied, "no capability")
            .with_context("capability_search", "exhausted");
        let dto: GovernErrorDto = (&err).into();
        assert!(!dto.context.is_empty());
        let public = dto.public();
        assert!(public.context.is_empty());
        assert_eq!(public.code, ReasonCode::CdiActionDenied);
    }
}
