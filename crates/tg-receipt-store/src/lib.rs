// SPDX-License-Identifier: MIT OR Apache-2.0
//! tg-receipt-store
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Receipt persistence: an append-only JSONL journal keyed by sequence
//! number, plus an in-memory sink for tests. Persistence precedes
//! acknowledgement: the pipeline does not answer a request until its
//! receipt has reached the sink.

use async_trait::async_trait;
use std::path::PathBuf;
use tg_core::Receipt;
use tg_receipt::{validate_receipts, ChainReport};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Errors from receipt persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The journal file could not be created, opened, or written.
    #[error("journal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A journal record could not be serialized or parsed.
    #[error("journal record invalid: {0}")]
    Json(#[from] serde_json::Error),

    /// The store was configured with an unusable location.
    #[error("store misconfigured: {reason}")]
    Misconfigured {
        /// What was wrong.
        reason: String,
    },
}

/// Where receipts go once the chain has sealed them.
#[async_trait]
pub trait ReceiptSink: Send + Sync {
    /// Persist one sealed receipt. Must complete before the pipeline
    /// acknowledges the request the receipt belongs to.
    async fn persist(&self, receipt: &Receipt) -> Result<(), StoreError>;

    /// Read receipts attributed to a job, oldest first, capped at `limit`.
    async fn read_by_job(&self, job_id: Uuid, limit: usize) -> Result<Vec<Receipt>, StoreError>;

    /// Read receipts with `sequence >= from`, capped at `limit`.
    async fn read_range(&self, from: u64, limit: usize) -> Result<Vec<Receipt>, StoreError>;

    /// Re-derive every link of the persisted journal.
    async fn validate(&self) -> Result<ChainReport, StoreError>;
}

// ---------------------------------------------------------------------------
// Memory sink
// ---------------------------------------------------------------------------

/// In-memory sink for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    receipts: Mutex<Vec<Receipt>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted receipts.
    pub async fn len(&self) -> usize {
        self.receipts.lock().await.len()
    }

    /// Returns `true` when nothing has been persisted.
    pub async fn is_empty(&self) -> bool {
        self.receipts.lock().await.is_empty()
    }
}

#[async_trait]
impl ReceiptSink for MemorySink {
    async fn persist(&self, receipt: &Receipt) -> Result<(), StoreError> {
        self.receipts.lock().await.push(receipt.clone());
        Ok(())
    }

    async fn read_by_job(&self, job_id: Uuid, limit: usize) -> Result<Vec<Receipt>, StoreError> {
        Ok(self
            .receipts
            .lock()
            .await
            .iter()
            .filter(|r| r.job_id == Some(job_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn read_range(&self, from: u64, limit: usize) -> Result<Vec<Receipt>, StoreError> {
        Ok(self
            .receipts
            .lock()
            .await
            .iter()
            .filter(|r| r.sequence >= from)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn validate(&self) -> Result<ChainReport, StoreError> {
        Ok(validate_receipts(&self.receipts.lock().await))
    }
}

// ---------------------------------------------------------------------------
// Journal sink
// ---------------------------------------------------------------------------

/// Append-only JSONL journal: one canonical receipt per line.
#[derive(Debug)]
pub struct JournalSink {
    path: PathBuf,
    // Serializes writers so records land in sequence order.
    write_lock: Mutex<()>,
}

impl JournalSink {
    /// Open (or create) a journal at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Misconfigured`] when the parent directory
    /// does not exist and cannot be created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Misconfigured {
                    reason: format!("cannot create journal dir {}: {e}", parent.display()),
                })?;
        }
        // Touch the file so validation of a fresh journal succeeds.
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        debug!(target: "tg.store", path = %path.display(), "journal opened");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Journal location.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Receipt>, StoreError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let mut receipts = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            receipts.push(serde_json::from_str::<Receipt>(line)?);
        }
        Ok(receipts)
    }
}

#[async_trait]
impl ReceiptSink for JournalSink {
    async fn persist(&self, receipt: &Receipt) -> Result<(), StoreError> {
        let record = serde_json::to_string(receipt)?;
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_by_job(&self, job_id: Uuid, limit: usize) -> Result<Vec<Receipt>, StoreError> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|r| r.job_id == Some(job_id))
            .take(limit)
            .collect())
    }

    async fn read_range(&self, from: u64, limit: usize) -> Result<Vec<Receipt>, StoreError> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|r| r.sequence >= from)
            .take(limit)
            .collect())
    }

    async fn validate(&self) -> Result<ChainReport, StoreError> {
        Ok(validate_receipts(&self.read_all().await?))
    }
}
