// SPDX-License-Identifier: MIT OR Apache-2.0
//! tg-genome
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The signed policy artifact (the genome) is the root of trust for the
//! whole pipeline. This crate defines its document model, the canonical
//! form used for signing, Ed25519 quorum verification, and the loader that
//! refuses to boot on any defect.

/// Startup loading and manifest verification.
pub mod loader;
/// Signing helpers for producing artifacts in development and tests.
pub mod sign;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tg_core::{sha256_hex, RiskClass};

/// Schema versions this build understands.
pub const KNOWN_SCHEMA_VERSIONS: &[u32] = &[1];

/// An authorized signer: a stable key id and an Ed25519 public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSpec {
    /// Stable identifier referenced by signature entries.
    pub key_id: String,
    /// Lowercase hex of the 32-byte Ed25519 public key.
    pub public_key: String,
}

/// Severity attached to a treaty invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Advisory.
    Info,
    /// Violation degrades trust but does not halt.
    Warning,
    /// Violation must halt the affected operation.
    Critical,
}

/// A named treaty invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantSpec {
    /// Invariant identifier.
    pub id: String,
    /// Severity of a violation.
    pub severity: Severity,
    /// Human-readable claim the invariant asserts.
    pub claim: String,
}

/// A capability descriptor: which actions a capability grants and refuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Capability identifier (e.g. `cap:job-runner`).
    pub id: String,
    /// Risk class of the grant.
    pub risk: RiskClass,
    /// Action ids this capability allows.
    pub allow: Vec<String>,
    /// Action ids this capability explicitly refuses, overriding `allow`.
    #[serde(default)]
    pub deny: Vec<String>,
}

impl CapabilityDescriptor {
    /// Returns `true` when this capability grants `action_id`.
    #[must_use]
    pub fn grants(&self, action_id: &str) -> bool {
        self.allow.iter().any(|a| a == action_id) && !self.deny.iter().any(|d| d == action_id)
    }
}

/// A detached signature over the canonical document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Which signer produced this signature.
    pub key_id: String,
    /// Lowercase hex of the 64-byte Ed25519 signature.
    pub signature: String,
}

/// The signed, versioned policy artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genome {
    /// Document schema version.
    pub schema_version: u32,
    /// Artifact name.
    pub name: String,
    /// Semantic version string.
    pub version: String,
    /// Authorized signers.
    pub signers: Vec<SignerSpec>,
    /// Number of distinct signers required for validity.
    pub signature_threshold: u32,
    /// Treaty invariants.
    #[serde(default)]
    pub invariants: Vec<InvariantSpec>,
    /// Capability descriptors.
    #[serde(default)]
    pub capabilities: Vec<CapabilityDescriptor>,
    /// Map of file path to expected SHA-256 content hash.
    #[serde(default)]
    pub build_manifest: BTreeMap<String, String>,
    /// Detached signature block; excluded from the canonical form.
    #[serde(default)]
    pub signatures: Vec<SignatureEntry>,
}

/// Published identity of a loaded artifact, for receipt attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeId {
    /// SHA-256 of the canonical signing bytes.
    pub artifact_id: String,
    /// Artifact name.
    pub name: String,
    /// Artifact version.
    pub version: String,
}

impl GenomeId {
    /// Twelve-character prefix of the artifact id, for logs.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.artifact_id[..self.artifact_id.len().min(12)]
    }
}

/// Errors from genome parsing, verification, or loading.
///
/// Every variant surfaces to callers as a `GENOME_INVALID` denial; the
/// variants exist so logs and tests can tell defects apart.
#[derive(Debug, thiserror::Error)]
pub enum GenomeError {
    /// File could not be read.
    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    /// Document is not valid JSON or misses required fields.
    #[error("failed to parse artifact: {0}")]
    Parse(#[from] serde_json::Error),

    /// Schema version is not understood by this build.
    #[error("unknown schema version {found}")]
    UnknownSchemaVersion {
        /// Version found in the document.
        found: u32,
    },

    /// A structural rule was violated.
    #[error("invalid artifact structure: {reason}")]
    Structural {
        /// Which rule failed.
        reason: String,
    },

    /// A signer's public key or a signature is not valid hex/Ed25519 material.
    #[error("bad key material for signer '{key_id}'")]
    BadKeyMaterial {
        /// Offending signer id.
        key_id: String,
    },

    /// A signature entry references a signer not in the authorized set.
    #[error("signature from unknown signer '{key_id}'")]
    UnknownSigner {
        /// Offending signer id.
        key_id: String,
    },

    /// Fewer valid signatures than the declared threshold.
    #[error("signature quorum not met: {valid} of {required}")]
    QuorumNotMet {
        /// Valid, distinct signatures found.
        valid: u32,
        /// Declared threshold.
        required: u32,
    },

    /// A manifest entry's on-disk hash does not match.
    #[error("manifest mismatch for '{path}'")]
    ManifestMismatch {
        /// Offending path.
        path: String,
    },

    /// A manifest entry points at a missing file.
    #[error("manifest file missing: '{path}'")]
    ManifestFileMissing {
        /// Offending path.
        path: String,
    },
}

/// Canonical bytes the signature quorum covers: the document with the
/// signature block removed, keys sorted, no whitespace.
///
/// # Errors
///
/// Returns [`GenomeError::Parse`] if the document cannot be serialized.
pub fn canonical_signing_bytes(genome: &Genome) -> Result<Vec<u8>, GenomeError> {
    let mut v = serde_json::to_value(genome)?;
    if let serde_json::Value::Object(map) = &mut v {
        map.remove("signatures");
    }
    Ok(serde_json::to_string(&v)?.into_bytes())
}

/// Structural validation independent of signatures.
///
/// # Errors
///
/// Returns the first defect found.
pub fn validate_structure(genome: &Genome) -> Result<(), GenomeError> {
    if !KNOWN_SCHEMA_VERSIONS.contains(&genome.schema_version) {
        return Err(GenomeError::UnknownSchemaVersion {
            found: genome.schema_version,
        });
    }
    if genome.name.trim().is_empty() {
        return Err(GenomeError::Structural {
            reason: "artifact name must not be empty".into(),
        });
    }
    if genome.version.trim().is_empty() {
        return Err(GenomeError::Structural {
            reason: "artifact version must not be empty".into(),
        });
    }
    if genome.signers.is_empty() {
        return Err(GenomeError::Structural {
            reason: "signer set must not be empty".into(),
        });
    }
    if genome.signature_threshold == 0 {
        return Err(GenomeError::Structural {
            reason: "signature threshold must be at least 1".into(),
        });
    }
    if genome.signature_threshold as usize > genome.signers.len() {
        return Err(GenomeError::Structural {
            reason: "signature threshold exceeds signer count".into(),
        });
    }
    let mut signer_ids = BTreeSet::new();
    for s in &genome.signers {
        if !signer_ids.insert(s.key_id.as_str()) {
            return Err(GenomeError::Structural {
                reason: format!("duplicate signer id '{}'", s.key_id),
            });
        }
    }
    let mut cap_ids = BTreeSet::new();
    for c in &genome.capabilities {
        if !cap_ids.insert(c.id.as_str()) {
            return Err(GenomeError::Structural {
                reason: format!("duplicate capability id '{}'", c.id),
            });
        }
    }
    Ok(())
}

/// Verify that a quorum of authorized signers covers the canonical bytes.
///
/// Counts each signer at most once; a signature from an unknown signer is
/// an error rather than a skip, so an artifact carrying extraneous
/// signatures is rejected outright.
///
/// # Errors
///
/// Returns the specific verification defect.
pub fn verify_quorum(genome: &Genome) -> Result<(), GenomeError> {
    let message = canonical_signing_bytes(genome)?;
    let signers: BTreeMap<&str, &SignerSpec> = genome
        .signers
        .iter()
        .map(|s| (s.key_id.as_str(), s))
        .collect();

    let mut valid: BTreeSet<&str> = BTreeSet::new();
    for entry in &genome.signatures {
        let signer = signers
            .get(entry.key_id.as_str())
            .ok_or_else(|| GenomeError::UnknownSigner {
                key_id: entry.key_id.clone(),
            })?;
        let key = decode_verifying_key(signer)?;
        let sig = decode_signature(entry)?;
        if key.verify(&message, &sig).is_ok() {
            valid.insert(signer.key_id.as_str());
        }
    }

    let required = genome.signature_threshold;
    if (valid.len() as u32) < required {
        return Err(GenomeError::QuorumNotMet {
            valid: valid.len() as u32,
            required,
        });
    }
    Ok(())
}

/// Compute the published identity of a genome.
///
/// # Errors
///
/// Returns [`GenomeError::Parse`] if the document cannot be serialized.
pub fn genome_id(genome: &Genome) -> Result<GenomeId, GenomeError> {
    let bytes = canonical_signing_bytes(genome)?;
    Ok(GenomeId {
        artifact_id: sha256_hex(&bytes),
        name: genome.name.clone(),
        version: genome.version.clone(),
    })
}

fn decode_verifying_key(signer: &SignerSpec) -> Result<VerifyingKey, GenomeError> {
    let bad = || GenomeError::BadKeyMaterial {
        key_id: signer.key_id.clone(),
    };
    let raw = hex::decode(&signer.public_key).map_err(|_| bad())?;
    let arr: [u8; 32] = raw.try_into().map_err(|_| bad())?;
    VerifyingKey::from_bytes(&arr).map_err(|_| bad())
}

fn decode_signature(entry: &SignatureEntry) -> Result<Signature, GenomeError> {
    let bad = || GenomeError::BadKeyMaterial {
        key_id: entry.key_id.clone(),
    };
    let raw = hex::decode(&entry.signature).map_err(|_| bad())?;
    let arr: [u8; 64] = raw.try_into().map_err(|_| bad())?;
    Ok(Signature::from_bytes(&arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::{generate_signer, sign_genome};

    fn unsigned_genome(signers: Vec<SignerSpec>, threshold: u32) -> Genome {
        Genome {
            schema_version: 1,
            name: "covenant".into(),
            version: "1.0.0".into(),
            signers,
            signature_threshold: threshold,
            invariants: vec![InvariantSpec {
                id: "inv:receipts-chained".into(),
                severity: Severity::Critical,
                claim: "every side effect appends a chained receipt".into(),
            }],
            capabilities: vec![CapabilityDescriptor {
                id: "cap:job-runner".into(),
                risk: RiskClass::High,
                allow: vec!["action:job:run".into()],
                deny: vec![],
            }],
            build_manifest: BTreeMap::new(),
            signatures: vec![],
        }
    }

    #[test]
    fn capability_deny_overrides_allow() {
        let cap = CapabilityDescriptor {
            id: "cap:mixed".into(),
            risk: RiskClass::Low,
            allow: vec!["action:job:run".into(), "action:memory:create".into()],
            deny: vec!["action:memory:create".into()],
        };
        assert!(cap.grants("action:job:run"));
        assert!(!cap.grants("action:memory:create"));
        assert!(!cap.grants("action:unknown:xyz"));
    }

    #[test]
    fn canonical_bytes_exclude_signature_block() {
        let (spec, key) = generate_signer("root");
        let mut g = unsigned_genome(vec![spec], 1);
        let before = canonical_signing_bytes(&g).unwrap();
        sign_genome(&mut g, &[("root".into(), key)]).unwrap();
        let after = canonical_signing_bytes(&g).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn quorum_verifies_with_enough_signers() {
        let (s1, k1) = generate_signer("alpha");
        let (s2, k2) = generate_signer("beta");
        let mut g = unsigned_genome(vec![s1, s2], 2);
        sign_genome(&mut g, &[("alpha".into(), k1), ("beta".into(), k2)]).unwrap();
        assert!(verify_quorum(&g).is_ok());
    }

    #[test]
    fn quorum_fails_below_threshold() {
        let (s1, k1) = generate_signer("alpha");
        let (s2, _k2) = generate_signer("beta");
        let mut g = unsigned_genome(vec![s1, s2], 2);
        sign_genome(&mut g, &[("alpha".into(), k1)]).unwrap();
        match verify_quorum(&g) {
            Err(GenomeError::QuorumNotMet { valid: 1, required: 2 }) => {}
            other => panic!("expected quorum failure, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_signatures_count_once() {
        let (s1, k1) = generate_signer("alpha");
        let (s2, _) = generate_signer("beta");
        let mut g = unsigned_genome(vec![s1, s2], 2);
        let k1b = k1.clone();
        sign_genome(&mut g, &[("alpha".into(), k1), ("alpha".into(), k1b)]).unwrap();
        assert!(matches!(
            verify_quorum(&g),
            Err(GenomeError::QuorumNotMet { valid: 1, required: 2 })
        ));
    }

    #[test]
    fn extraneous_signer_is_rejected() {
        let (s1, k1) = generate_signer("alpha");
        let (_, rogue) = generate_signer("rogue");
        let mut g = unsigned_genome(vec![s1], 1);
        sign_genome(&mut g, &[("alpha".into(), k1), ("rogue".into(), rogue)]).unwrap();
        assert!(matches!(
            verify_quorum(&g),
            Err(GenomeError::UnknownSigner { .. })
        ));
    }

    #[test]
    fn tampered_document_fails_quorum() {
        let (s1, k1) = generate_signer("alpha");
        let mut g = unsigned_genome(vec![s1], 1);
        sign_genome(&mut g, &[("alpha".into(), k1)]).unwrap();
        g.version = "1.0.1".into();
        assert!(matches!(
            verify_quorum(&g),
            Err(GenomeError::QuorumNotMet { .. })
        ));
    }

    #[test]
    fn structure_rejects_empty_signers() {
        let g = unsigned_genome(vec![], 1);
        assert!(matches!(
            validate_structure(&g),
            Err(GenomeError::Structural { .. })
        ));
    }

    #[test]
    fn structure_rejects_threshold_above_signer_count() {
        let (s1, _) = generate_signer("alpha");
        let g = unsigned_genome(vec![s1], 3);
        assert!(matches!(
            validate_structure(&g),
            Err(GenomeError::Structural { .. })
        ));
    }

    #[test]
    fn structure_rejects_unknown_schema() {
        let (s1, _) = generate_signer("alpha");
        let mut g = unsigned_genome(vec![s1], 1);
        g.schema_version = 99;
        assert!(matches!(
            validate_structure(&g),
            Err(GenomeError::UnknownSchemaVersion { found: 99 })
        ));
    }

    #[test]
    fn genome_id_is_stable_and_ignores_signatures() {
        let (s1, k1) = generate_signer("alpha");
        let mut g = unsigned_genome(vec![s1], 1);
        let before = genome_id(&g).unwrap();
        sign_genome(&mut g, &[("alpha".into(), k1)]).unwrap();
        let after = genome_id(&g).unwrap();
        assert_eq!(before.artifact_id, after.artifact_id);
        assert_eq!(after.short().len(), 12);
    }
}
