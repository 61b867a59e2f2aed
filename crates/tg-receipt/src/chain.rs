// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered, hash-linked receipt chain with integrity verification.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tg_core::{receipt_hash, ContractError, Receipt, GENESIS_HASH};
use uuid::Uuid;

/// What broke at a given chain index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    /// The stored `self_hash` does not match the recomputed hash.
    HashMismatch,
    /// `previous_hash` does not equal the predecessor's `self_hash`.
    BrokenLink,
    /// Sequence numbers are not strictly consecutive from zero.
    SequenceGap,
}

/// First defect found during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    /// Index of the defective receipt.
    pub index: usize,
    /// What broke.
    pub kind: BreakKind,
}

/// Result of re-deriving every link in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    /// Number of receipts examined.
    pub checked: usize,
    /// First defect, if any.
    pub first_break: Option<ChainBreak>,
}

impl ChainReport {
    /// Returns `true` when no defect was found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.first_break.is_none()
    }
}

/// An append-only, hash-linked chain of governance receipts.
///
/// Appends are serialized under a lock: given two appends, the later one
/// sees the earlier one's `self_hash` as its `previous_hash` and a
/// strictly greater sequence number.
///
/// # Examples
///
/// ```
/// use tg_receipt::{ReceiptBuilder, ReceiptChain, Decision, Stage};
///
/// let chain = ReceiptChain::new();
/// let r = ReceiptBuilder::new(Stage::Decision, "action:job:run", Decision::Allow).build();
/// let appended = chain.append(r).unwrap();
/// assert_eq!(appended.sequence, 0);
/// assert!(chain.validate().is_valid());
/// ```
#[derive(Debug, Default)]
pub struct ReceiptChain {
    receipts: Mutex<Vec<Receipt>>,
}

impl ReceiptChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign sequence and hashes, then append.
    ///
    /// The caller's `sequence`, `previous_hash`, and `self_hash` are
    /// overwritten; the chain is the only author of link state.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Json`] if the receipt cannot be
    /// canonicalized for hashing; nothing is appended in that case.
    pub fn append(&self, mut receipt: Receipt) -> Result<Receipt, ContractError> {
        let mut receipts = self.receipts.lock().expect("receipt chain lock poisoned");

        receipt.sequence = receipts.len() as u64;
        receipt.previous_hash = receipts
            .last()
            .and_then(|r| r.self_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        receipt.self_hash = Some(receipt_hash(&receipt)?);

        receipts.push(receipt.clone());
        Ok(receipt)
    }

    /// Re-derive every hash and link; report the first break.
    #[must_use]
    pub fn validate(&self) -> ChainReport {
        let receipts = self.receipts.lock().expect("receipt chain lock poisoned");
        validate_receipts(&receipts)
    }

    /// Receipts attributed to a job, oldest first, capped at `limit`.
    #[must_use]
    pub fn read_by_job(&self, job_id: Uuid, limit: usize) -> Vec<Receipt> {
        let receipts = self.receipts.lock().expect("receipt chain lock poisoned");
        receipts
            .iter()
            .filter(|r| r.job_id == Some(job_id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Receipts attributed to a request, oldest first.
    #[must_use]
    pub fn read_by_request(&self, request_id: Uuid) -> Vec<Receipt> {
        let receipts = self.receipts.lock().expect("receipt chain lock poisoned");
        receipts
            .iter()
            .filter(|r| r.request_id == Some(request_id))
            .cloned()
            .collect()
    }

    /// Receipts with `sequence >= from`, capped at `limit`.
    #[must_use]
    pub fn read_range(&self, from: u64, limit: usize) -> Vec<Receipt> {
        let receipts = self.receipts.lock().expect("receipt chain lock poisoned");
        receipts
            .iter()
            .filter(|r| r.sequence >= from)
            .take(limit)
            .cloned()
            .collect()
    }

    /// The most recent receipt, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Receipt> {
        self.receipts
            .lock()
            .expect("receipt chain lock poisoned")
            .last()
            .cloned()
    }

    /// Number of receipts in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receipts.lock().expect("receipt chain lock poisoned").len()
    }

    /// Returns `true` if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validate a slice of receipts as a chain. Also used by stores that read
/// a persisted journal back.
#[must_use]
pub fn validate_receipts(receipts: &[Receipt]) -> ChainReport {
    for (i, receipt) in receipts.iter().enumerate() {
        if receipt.sequence != i as u64 {
            return ChainReport {
                checked: i + 1,
                first_break: Some(ChainBreak {
                    index: i,
                    kind: BreakKind::SequenceGap,
                }),
            };
        }

        let expected_prev = if i == 0 {
            GENESIS_HASH.to_string()
        } else {
            receipts[i - 1].self_hash.clone().unwrap_or_default()
        };
        if receipt.previous_hash != expected_prev {
            return ChainReport {
                checked: i + 1,
                first_break: Some(ChainBreak {
                    index: i,
                    kind: BreakKind::BrokenLink,
                }),
            };
        }

        let valid_hash = match (&receipt.self_hash, receipt_hash(receipt)) {
            (Some(stored), Ok(computed)) => *stored == computed,
            _ => false,
        };
        if !valid_hash {
            return ChainReport {
                checked: i + 1,
                first_break: Some(ChainBreak {
                    index: i,
                    kind: BreakKind::HashMismatch,
                }),
            };
        }
    }
    ChainReport {
        checked: receipts.len(),
        first_break: None,
    }
}
