// SPDX-License-Identifier: MIT OR Apache-2.0
//! tg-ingest
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Knowledge-ingestion verification: claims enter the memory graph only
//! when every supporting chunk was fetched by the runtime inside the same
//! request and declared in the packet's cross-references.
//!
//! Chunk text is data, never instruction: nothing in a fetched chunk's
//! body can alter the verifier's control flow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tg_error::ReasonCode;
use tracing::debug;

/// Verification mode for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Only grounded claims are accepted.
    GroundOnly,
    /// Unsupported claims are accepted as untrusted hypotheses.
    GroundPlusHypothesis,
}

/// The policy packet accompanying a batch: which chunks the runtime must
/// fetch, and which claim types may not go unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPacket {
    /// Chunk ids the batch's claims may cite.
    pub declared_chunks: Vec<String>,
    /// Claim types that must carry support.
    #[serde(default)]
    pub require_fetch_for: BTreeSet<String>,
}

impl ChunkPacket {
    /// Structural validation.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::PacketInvalid`] naming the first defect.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.declared_chunks.iter().any(|c| c.trim().is_empty()) {
            return Err(IngestError::PacketInvalid {
                reason: "declared chunk ids must not be empty".into(),
            });
        }
        let mut seen = BTreeSet::new();
        for id in &self.declared_chunks {
            if !seen.insert(id.as_str()) {
                return Err(IngestError::PacketInvalid {
                    reason: format!("duplicate declared chunk '{id}'"),
                });
            }
        }
        Ok(())
    }
}

/// One citation inside a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Support {
    /// Cited chunk id.
    pub chunk_id: String,
    /// Character span inside the chunk, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<[usize; 2]>,
}

/// A candidate claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim identifier.
    pub claim_id: String,
    /// Claim type (consulted against `require_fetch_for`).
    pub claim_type: String,
    /// Claim text.
    pub text: String,
    /// Citations.
    #[serde(default)]
    pub support: Vec<Support>,
    /// Dedup/conflict key, when the claim asserts a keyed fact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Final status of a claim after verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Every citation was runtime-fetched and declared.
    Grounded,
    /// Accepted without support, tainted untrusted.
    Hypothesis,
    /// Refused.
    Denied,
}

/// Per-claim outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOutcome {
    /// Claim identifier.
    pub claim_id: String,
    /// Final status.
    pub status: ClaimStatus,
    /// Taint marker (`untrusted` for hypotheses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taint: Option<String>,
    /// Denial reason, when denied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
}

/// A keyed divergence against an existing grounded claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// The shared key.
    pub key: String,
    /// Claim already in the store; never overwritten.
    pub existing_claim_id: String,
    /// Incoming claim that diverged.
    pub incoming_claim_id: String,
}

/// Batch verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Claims grounded.
    pub grounded: usize,
    /// Claims accepted as hypotheses.
    pub hypothesis: usize,
    /// Claims denied.
    pub denied: usize,
    /// Keyed divergences recorded.
    pub conflicts: usize,
    /// Per-claim outcomes in input order.
    pub outcomes: Vec<ClaimOutcome>,
    /// Conflict records.
    pub conflict_records: Vec<Conflict>,
}

/// Errors that deny a whole batch before any claim is examined.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// No packet accompanied the batch.
    #[error("chunk packet missing")]
    PacketMissing,

    /// The packet failed structural validation.
    #[error("chunk packet invalid: {reason}")]
    PacketInvalid {
        /// First defect found.
        reason: String,
    },

    /// The chunk retriever could not serve the declared chunks.
    #[error("chunk retriever unavailable: {detail}")]
    RetrieverUnavailable {
        /// Retriever-reported detail.
        detail: String,
    },
}

impl IngestError {
    /// Stable reason code for the batch denial.
    #[must_use]
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::PacketMissing | Self::PacketInvalid { .. } => ReasonCode::CpackMissing,
            Self::RetrieverUnavailable { .. } => ReasonCode::ChunkRetrieverUnavailable,
        }
    }
}

/// Runtime-owned chunk retrieval. Callers may cite chunk ids but can
/// never supply chunk bodies.
#[async_trait]
pub trait ChunkRetriever: Send + Sync {
    /// Fetch the requested chunks. Missing ids are simply absent from the
    /// result; a transport-level failure is an error.
    async fn fetch(&self, ids: &[String]) -> Result<BTreeMap<String, String>, RetrieverError>;
}

/// Transport-level retrieval failure.
#[derive(Debug, thiserror::Error)]
#[error("retriever failed: {detail}")]
pub struct RetrieverError {
    /// What went wrong.
    pub detail: String,
}

/// Existing grounded claims, keyed, for conflict detection.
#[derive(Debug, Default, Clone)]
pub struct GroundedStore {
    by_key: BTreeMap<String, (String, String)>, // key -> (claim_id, normalized text)
}

impl GroundedStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grounded claim under its key. Existing entries win; the
    /// verifier records a conflict instead of overwriting.
    pub fn insert_if_absent(&mut self, key: &str, claim_id: &str, text: &str) {
        self.by_key
            .entry(key.to_string())
            .or_insert_with(|| (claim_id.to_string(), normalize_text(text)));
    }

    /// Existing entry for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&(String, String)> {
        self.by_key.get(key)
    }

    /// Number of keyed claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Returns `true` when the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Normalize claim text for keyed comparison: lowercase, alphanumerics
/// only, single spaces.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let filtered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The knowledge-ingestion verifier.
#[derive(Debug, Default)]
pub struct IngestVerifier;

impl IngestVerifier {
    /// Create a verifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Verify one batch of claims against a packet.
    ///
    /// The verifier fetches every declared chunk through `retriever`
    /// (retrieval is runtime-owned), then settles each claim in input
    /// order. `store` supplies existing keyed claims for conflict
    /// detection and receives newly grounded keyed claims.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] when the packet is missing/invalid or the
    /// retriever is unavailable; per-claim failures are outcomes, not
    /// errors.
    pub async fn verify(
        &self,
        packet: Option<&ChunkPacket>,
        claims: &[Claim],
        mode: IngestMode,
        retriever: &dyn ChunkRetriever,
        store: &mut GroundedStore,
    ) -> Result<IngestReport, IngestError> {
        let packet = packet.ok_or(IngestError::PacketMissing)?;
        packet.validate()?;

        let fetched = retriever
            .fetch(&packet.declared_chunks)
            .await
            .map_err(|e| IngestError::RetrieverUnavailable { detail: e.detail })?;
        let fetched_ids: BTreeSet<&str> = fetched.keys().map(String::as_str).collect();
        debug!(
            target: "tg.ingest",
            declared = packet.declared_chunks.len(),
            fetched = fetched_ids.len(),
            claims = claims.len(),
            "batch retrieval complete"
        );

        let mut report = IngestReport {
            grounded: 0,
            hypothesis: 0,
            denied: 0,
            conflicts: 0,
            outcomes: Vec::with_capacity(claims.len()),
            conflict_records: Vec::new(),
        };

        for claim in claims {
            let outcome = settle_claim(claim, packet, &fetched_ids, mode);
            match outcome.status {
                ClaimStatus::Grounded => {
                    report.grounded += 1;
                    if let Some(key) = &claim.key {
                        match store.get(key) {
                            Some((existing_id, existing_text))
                                if *existing_text != normalize_text(&claim.text) =>
                            {
                                report.conflicts += 1;
                                report.conflict_records.push(Conflict {
                                    key: key.clone(),
                                    existing_claim_id: existing_id.clone(),
                                    incoming_claim_id: claim.claim_id.clone(),
                                });
                            }
                            Some(_) => {}
                            None => store.insert_if_absent(key, &claim.claim_id, &claim.text),
                        }
                    }
                }
                ClaimStatus::Hypothesis => report.hypothesis += 1,
                ClaimStatus::Denied => report.denied += 1,
            }
            report.outcomes.push(outcome);
        }

        Ok(report)
    }
}

/// Settle one claim. Chunk bodies are deliberately absent here: only the
/// set of fetched ids participates, so chunk content cannot steer the
/// verdict.
fn settle_claim(
    claim: &Claim,
    packet: &ChunkPacket,
    fetched_ids: &BTreeSet<&str>,
    mode: IngestMode,
) -> ClaimOutcome {
    let deny = |reason: ReasonCode| ClaimOutcome {
        claim_id: claim.claim_id.clone(),
        status: ClaimStatus::Denied,
        taint: None,
        reason: Some(reason),
    };

    if claim.support.is_empty() {
        if packet.require_fetch_for.contains(&claim.claim_type) {
            return deny(ReasonCode::TypeRequiresGrounding);
        }
        return match mode {
            IngestMode::GroundOnly => deny(ReasonCode::NoSupportGroundOnlyMode),
            IngestMode::GroundPlusHypothesis => ClaimOutcome {
                claim_id: claim.claim_id.clone(),
                status: ClaimStatus::Hypothesis,
                taint: Some("untrusted".into()),
                reason: None,
            },
        };
    }

    let all_fetched = claim
        .support
        .iter()
        .all(|s| fetched_ids.contains(s.chunk_id.as_str()));
    if !all_fetched {
        return deny(ReasonCode::UnfetchedChunks);
    }

    ClaimOutcome {
        claim_id: claim.claim_id.clone(),
        status: ClaimStatus::Grounded,
        taint: None,
        reason: None,
    }
}
