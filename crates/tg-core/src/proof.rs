// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-request governance proof assembly.
//!
//! A [`GovernanceProof`] is the transcript of one request's trip through
//! the pipeline: for every stage, a digest of its input and output plus the
//! sub-verdict. Denial paths return the proof inside the error detail;
//! allow paths attach it to the receipt notes.

use crate::{canonical_json, payload_digest, sha256_hex, ContractError, Decision, Stage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sub-verdict of a single pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Stage passed the request through unchanged.
    Pass,
    /// Stage denied the request.
    Deny,
    /// Stage passed the request through with a rewritten payload.
    Transform,
}

/// One stage entry in a proof transcript.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StageRecord {
    /// Stage that ran.
    pub stage: Stage,
    /// Digest of the stage input in canonical form.
    pub input_digest: String,
    /// Digest of the stage output in canonical form.
    pub output_digest: String,
    /// Sub-verdict.
    pub verdict: StageOutcome,
}

/// Transcript of a request's stage inputs, outputs, and sub-verdicts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GovernanceProof {
    /// Request the proof describes.
    pub request_id: Uuid,
    /// Digest of the envelope as received.
    pub request_hash: String,
    /// Stage records in execution order.
    pub stages: Vec<StageRecord>,
    /// Overall verdict once sealed.
    pub verdict: Option<Decision>,
    /// Hash over the sealed transcript.
    pub final_hash: Option<String>,
}

/// Accumulates stage records during pipeline execution, then seals.
///
/// # Examples
///
/// ```
/// use tg_core::proof::{ProofAssembler, StageOutcome};
/// use tg_core::{Decision, Stage};
///
/// let mut asm = ProofAssembler::new(uuid::Uuid::new_v4(), "ab".repeat(32));
/// asm.record_values(
///     Stage::Ingress,
///     &serde_json::json!({"job": "x"}),
///     &serde_json::json!({"job": "x"}),
///     StageOutcome::Pass,
/// );
/// let proof = asm.seal(Decision::Allow).unwrap();
/// assert_eq!(proof.stages.len(), 1);
/// assert!(proof.final_hash.is_some());
/// ```
#[derive(Debug)]
pub struct ProofAssembler {
    proof: GovernanceProof,
}

impl ProofAssembler {
    /// Start a proof for the given request.
    #[must_use]
    pub fn new(request_id: Uuid, request_hash: impl Into<String>) -> Self {
        Self {
            proof: GovernanceProof {
                request_id,
                request_hash: request_hash.into(),
                stages: Vec::new(),
                verdict: None,
                final_hash: None,
            },
        }
    }

    /// Record a stage entry from precomputed digests.
    pub fn record(
        &mut self,
        stage: Stage,
        input_digest: impl Into<String>,
        output_digest: impl Into<String>,
        verdict: StageOutcome,
    ) {
        self.proof.stages.push(StageRecord {
            stage,
            input_digest: input_digest.into(),
            output_digest: output_digest.into(),
            verdict,
        });
    }

    /// Record a stage entry, digesting the given payload trees.
    ///
    /// Serialization failures degrade to an empty digest rather than
    /// aborting the pipeline; the sealed hash still commits to the entry.
    pub fn record_values(
        &mut self,
        stage: Stage,
        input: &serde_json::Value,
        output: &serde_json::Value,
        verdict: StageOutcome,
    ) {
        let input_digest = payload_digest(input).unwrap_or_default();
        let output_digest = payload_digest(output).unwrap_or_default();
        self.record(stage, input_digest, output_digest, verdict);
    }

    /// Number of stage records so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.proof.stages.len()
    }

    /// Returns `true` if no stage has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.proof.stages.is_empty()
    }

    /// Seal the transcript with the overall verdict and final hash.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Json`] if the transcript cannot be
    /// serialized.
    pub fn seal(mut self, verdict: Decision) -> Result<GovernanceProof, ContractError> {
        self.proof.verdict = Some(verdict);
        let canonical = canonical_json(&GovernanceProof {
            final_hash: None,
            ..self.proof.clone()
        })?;
        self.proof.final_hash = Some(sha256_hex(canonical.as_bytes()));
        Ok(self.proof)
    }
}
