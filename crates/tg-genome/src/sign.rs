// SPDX-License-Identifier: MIT OR Apache-2.0
//! Signing helpers for producing artifacts in development and tests.
//!
//! Production artifacts are signed out-of-band; these helpers exist so
//! fixtures and local setups can mint a valid quorum without external
//! tooling.

use crate::{canonical_signing_bytes, Genome, GenomeError, SignatureEntry, SignerSpec};
use ed25519_dalek::{Signer, SigningKey};

/// Generate a fresh signer spec plus its private key.
///
/// # Examples
///
/// ```
/// let (spec, _key) = tg_genome::sign::generate_signer("root");
/// assert_eq!(spec.key_id, "root");
/// assert_eq!(spec.public_key.len(), 64);
/// ```
#[must_use]
pub fn generate_signer(key_id: &str) -> (SignerSpec, SigningKey) {
    let key = SigningKey::generate(&mut rand::rngs::OsRng);
    let spec = SignerSpec {
        key_id: key_id.to_string(),
        public_key: hex::encode(key.verifying_key().to_bytes()),
    };
    (spec, key)
}

/// Append signatures over the canonical document bytes.
///
/// Existing signatures are preserved; the canonical form excludes the
/// signature block, so signing is order-independent.
///
/// # Errors
///
/// Returns [`GenomeError::Parse`] if the document cannot be serialized.
pub fn sign_genome(
    genome: &mut Genome,
    keys: &[(String, SigningKey)],
) -> Result<(), GenomeError> {
    let message = canonical_signing_bytes(genome)?;
    for (key_id, key) in keys {
        let sig = key.sign(&message);
        genome.signatures.push(SignatureEntry {
            key_id: key_id.clone(),
            signature: hex::encode(sig.to_bytes()),
        });
    }
    Ok(())
}
