// SPDX-License-Identifier: MIT OR Apache-2.0
//! tg-ledger
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Server-side append-only ledger of capability tokens.
//!
//! A token authorizes exactly one call matching its `(action_id,
//! payload_hash)` pair and may be redeemed at most once before expiry.
//! The ledger is the enforcement point: minting records the token,
//! redeeming flips it to spent atomically, and a replay is a distinct,
//! stable failure.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tg_error::ReasonCode;
use tracing::debug;
use uuid::Uuid;

/// A single-use authorization tying an action to a payload digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityToken {
    /// Unique token id.
    pub token_id: Uuid,
    /// Action the token authorizes.
    pub action_id: String,
    /// Actor the token was minted for.
    pub actor: String,
    /// Digest of the sanitized payload the token is bound to.
    pub payload_hash: String,
    /// Capability ids that granted the action.
    pub capabilities: Vec<String>,
    /// Mint time.
    pub issued_at: DateTime<Utc>,
    /// Expiry; redeeming later fails.
    pub expires_at: DateTime<Utc>,
}

/// Why a redeem was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RedeemError {
    /// No ledger entry for this token id.
    #[error("token is not in the ledger")]
    TokenMissing,
    /// The call's action does not match the token's action.
    #[error("token action does not match the call")]
    ActionMismatch,
    /// The call's payload digest does not match the token's digest.
    #[error("token payload digest does not match the call")]
    PayloadMismatch,
    /// The token expired before redemption.
    #[error("token expired")]
    Expired,
    /// The token was already redeemed once.
    #[error("token was already spent")]
    AlreadySpent,
}

impl RedeemError {
    /// Stable reason code a denial receipt carries for this failure.
    #[must_use]
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::AlreadySpent => ReasonCode::TokenReplayed,
            Self::Expired => ReasonCode::GovernanceDeny,
            Self::TokenMissing | Self::ActionMismatch | Self::PayloadMismatch => {
                ReasonCode::ActionGateBypassAttempt
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    token: CapabilityToken,
    spent: bool,
}

/// Thread-safe token ledger.
///
/// # Examples
///
/// ```
/// use tg_ledger::TokenLedger;
/// use chrono::Utc;
///
/// let ledger = TokenLedger::new(30_000, 60_000);
/// let now = Utc::now();
/// let token = ledger.mint("client-7", "action:job:run", "ab".repeat(32), vec![], now);
/// assert!(ledger
///     .redeem(token.token_id, "action:job:run", &token.payload_hash, now)
///     .is_ok());
/// ```
#[derive(Debug)]
pub struct TokenLedger {
    entries: Mutex<HashMap<Uuid, Entry>>,
    ttl: Duration,
    grace: Duration,
}

impl TokenLedger {
    /// Create a ledger with the given token TTL and garbage-collection
    /// grace period, both in milliseconds.
    #[must_use]
    pub fn new(ttl_ms: u64, grace_ms: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::milliseconds(ttl_ms as i64),
            grace: Duration::milliseconds(grace_ms as i64),
        }
    }

    /// Mint a fresh token and record it unspent.
    pub fn mint(
        &self,
        actor: impl Into<String>,
        action_id: impl Into<String>,
        payload_hash: impl Into<String>,
        capabilities: Vec<String>,
        now: DateTime<Utc>,
    ) -> CapabilityToken {
        let token = CapabilityToken {
            token_id: Uuid::new_v4(),
            action_id: action_id.into(),
            actor: actor.into(),
            payload_hash: payload_hash.into(),
            capabilities,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let mut entries = self.entries.lock().expect("token ledger poisoned");
        entries.insert(
            token.token_id,
            Entry {
                token: token.clone(),
                spent: false,
            },
        );
        debug!(
            target: "tg.ledger",
            token = %token.token_id,
            action = %token.action_id,
            "token minted"
        );
        token
    }

    /// Redeem a token for the given call, flipping it to spent atomically.
    ///
    /// # Errors
    ///
    /// Returns a [`RedeemError`] naming the exact failure; at most one
    /// redeem of a given token can ever succeed.
    pub fn redeem(
        &self,
        token_id: Uuid,
        actual_action: &str,
        actual_payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<CapabilityToken, RedeemError> {
        let mut entries = self.entries.lock().expect("token ledger poisoned");
        let entry = entries.get_mut(&token_id).ok_or(RedeemError::TokenMissing)?;

        if entry.token.action_id != actual_action {
            return Err(RedeemError::ActionMismatch);
        }
        if entry.token.payload_hash != actual_payload_hash {
            return Err(RedeemError::PayloadMismatch);
        }
        if entry.spent {
            return Err(RedeemError::AlreadySpent);
        }
        if now > entry.token.expires_at {
            return Err(RedeemError::Expired);
        }

        entry.spent = true;
        debug!(target: "tg.ledger", token = %token_id, "token redeemed");
        Ok(entry.token.clone())
    }

    /// Drop entries past `expires_at + grace`. Returns how many were
    /// collected.
    pub fn gc(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().expect("token ledger poisoned");
        let before = entries.len();
        entries.retain(|_, e| e.token.expires_at + self.grace >= now);
        before - entries.len()
    }

    /// Number of ledger entries (spent and unspent).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("token ledger poisoned").len()
    }

    /// Returns `true` if the ledger holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of unspent, unexpired tokens.
    #[must_use]
    pub fn outstanding(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .lock()
            .expect("token ledger poisoned")
            .values()
            .filter(|e| !e.spent && e.token.expires_at >= now)
            .count()
    }
}
