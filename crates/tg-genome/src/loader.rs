// SPDX-License-Identifier: MIT OR Apache-2.0
//! Startup loading and manifest verification.
//!
//! A load failure is fatal: the orchestrator refuses to construct, so no
//! request is ever evaluated against a defective artifact. There are no
//! retries here.

use crate::{
    canonical_signing_bytes, genome_id, validate_structure, verify_quorum, Genome, GenomeError,
    GenomeId,
};
use std::path::{Path, PathBuf};
use tg_core::{sha256_hex, Posture};
use tracing::{debug, info};

/// A fully validated artifact plus its published identity.
#[derive(Debug, Clone)]
pub struct LoadedGenome {
    /// The artifact document.
    pub genome: Genome,
    /// Identity for receipt attribution.
    pub id: GenomeId,
}

/// Loads and validates the policy artifact.
#[derive(Debug, Clone)]
pub struct GenomeLoader {
    posture: Posture,
    repo_root: PathBuf,
}

impl GenomeLoader {
    /// Create a loader. `repo_root` is the base for manifest paths.
    #[must_use]
    pub fn new(posture: Posture, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            posture,
            repo_root: repo_root.into(),
        }
    }

    /// Load the artifact at `path`, refusing on any defect.
    ///
    /// Validation order: parse, structural rules, signature quorum, and,
    /// in production posture, the build manifest against on-disk hashes.
    ///
    /// # Errors
    ///
    /// Returns the first [`GenomeError`] encountered; callers treat every
    /// variant as fatal.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadedGenome, GenomeError> {
        let path = path.as_ref();
        debug!(target: "tg.genome", path = %path.display(), "loading policy artifact");

        let raw = std::fs::read_to_string(path)?;
        let genome: Genome = serde_json::from_str(&raw)?;

        validate_structure(&genome)?;
        verify_quorum(&genome)?;

        if self.posture == Posture::Production {
            self.verify_manifest(&genome)?;
        }

        let id = genome_id(&genome)?;
        info!(
            target: "tg.genome",
            artifact = %id.short(),
            name = %id.name,
            version = %id.version,
            "policy artifact loaded"
        );
        Ok(LoadedGenome { genome, id })
    }

    /// Validate an already-parsed document without touching the filesystem
    /// manifest. Used by the heartbeat to re-check the in-memory artifact.
    ///
    /// # Errors
    ///
    /// Returns the first [`GenomeError`] encountered.
    pub fn revalidate(&self, genome: &Genome) -> Result<(), GenomeError> {
        validate_structure(genome)?;
        verify_quorum(genome)?;
        // Canonical bytes must still serialize; a poisoned document would
        // otherwise surface first during receipt attribution.
        canonical_signing_bytes(genome)?;
        Ok(())
    }

    fn verify_manifest(&self, genome: &Genome) -> Result<(), GenomeError> {
        for (rel, expected) in &genome.build_manifest {
            let full = self.repo_root.join(rel);
            let bytes = std::fs::read(&full).map_err(|_| GenomeError::ManifestFileMissing {
                path: rel.clone(),
            })?;
            let actual = sha256_hex(&bytes);
            if &actual != expected {
                return Err(GenomeError::ManifestMismatch { path: rel.clone() });
            }
        }
        Ok(())
    }
}
