// SPDX-License-Identifier: MIT OR Apache-2.0
//! tg-kernel
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The action-decision kernel: a small state machine over treaty
//! availability, consent, capability, and content policy. Verdicts are
//! deterministic for identical `(consent state, artifact, actor, action,
//! payload)`; timestamps and token ids are the only non-deterministic
//! outputs.

/// Consent signals and the per-actor consent ledger.
pub mod consent;
/// The decision kernel itself.
pub mod decision;

pub use consent::{ConsentKind, ConsentLedger, ConsentSignal, ConsentStatus};
pub use decision::{ActionVerdict, DecisionKernel};
