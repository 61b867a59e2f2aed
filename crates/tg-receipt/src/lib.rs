// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Governance receipt construction and the hash-linked, append-only chain.
//!
//! Every verdict the pipeline reaches, allow or deny, appends exactly
//! one receipt. Appends are serialized; each receipt's `self_hash` commits
//! to its predecessor, so any tampering or reordering is detectable by
//! re-derivation.

mod builder;
mod chain;

pub use builder::ReceiptBuilder;
pub use chain::{validate_receipts, BreakKind, ChainBreak, ChainReport, ReceiptChain};

// Re-export core receipt types so consumers can depend on tg-receipt alone.
pub use tg_core::{Decision, Receipt, Stage};
