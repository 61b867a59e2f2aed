// SPDX-License-Identifier: MIT OR Apache-2.0
//! tg-gate
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The side-effect gate: the single entry point for every state-changing
//! operation. A component below the gate can only write by receiving a
//! closure from the gate, and the gate only invokes that closure after
//! redeeming the capability token and re-running the decision kernel.
//! Every outcome (allow, deny, error, timeout) appends a chained
//! receipt, and persistence precedes acknowledgement.

/// Idempotency ledger for side-effecting actions.
pub mod idempotency;
/// Concurrency slots for side-effecting actions.
pub mod slots;

pub use idempotency::{IdempotencyHit, IdempotencyLedger};
pub use slots::{ConcurrencyLimits, SlotGuard, SlotTable};

use chrono::Utc;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tg_core::{payload_digest, ContractError, Decision, Receipt, Stage};
use tg_error::ReasonCode;
use tg_kernel::DecisionKernel;
use tg_ledger::CapabilityToken;
use tg_receipt::{ReceiptBuilder, ReceiptChain};
use tg_receipt_store::{ReceiptSink, StoreError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Errors the gate itself can fail with. Handler failures are not errors
/// here; they become fail-closed denials with receipts.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A receipt could not be canonicalized for hashing.
    #[error("receipt hashing failed: {0}")]
    Receipt(#[from] ContractError),

    /// A receipt could not be persisted; the operation is not
    /// acknowledged.
    #[error("receipt persistence failed: {0}")]
    Store(#[from] StoreError),
}

/// Everything the gate needs to know about one side-effecting call.
#[derive(Debug, Clone)]
pub struct GateContext {
    /// Acting principal.
    pub actor: String,
    /// Canonical action id.
    pub action_id: String,
    /// Logical endpoint, part of the idempotency key.
    pub endpoint: String,
    /// Sanitized payload the token was minted against.
    pub payload: Value,
    /// Single-use token from the decision kernel.
    pub token: CapabilityToken,
    /// Job the operation belongs to.
    pub job_id: Uuid,
    /// Request the operation belongs to, when attributable.
    pub request_id: Option<Uuid>,
    /// Client idempotency key, if supplied.
    pub idempotency_key: Option<String>,
}

/// Outcome of one gated execution.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// Whether the side effect ran (or was replayed) successfully.
    pub success: bool,
    /// Terminal decision recorded in the receipt.
    pub decision: Decision,
    /// Denial reason, when denied.
    pub reason: Option<ReasonCode>,
    /// Handler response (or stored response on replay).
    pub response: Option<Value>,
    /// The sealed, persisted receipt.
    pub receipt: Receipt,
    /// `true` when the response came from the idempotency ledger.
    pub replayed: bool,
}

/// The side-effect gate.
pub struct SideEffectGate {
    kernel: Arc<DecisionKernel>,
    chain: Arc<ReceiptChain>,
    sink: Arc<dyn ReceiptSink>,
    slots: SlotTable,
    idempotency: IdempotencyLedger,
    job_timeout: Duration,
}

impl SideEffectGate {
    /// Create a gate over the given kernel, chain, and sink.
    #[must_use]
    pub fn new(
        kernel: Arc<DecisionKernel>,
        chain: Arc<ReceiptChain>,
        sink: Arc<dyn ReceiptSink>,
        limits: ConcurrencyLimits,
        job_timeout_ms: u64,
    ) -> Self {
        Self {
            kernel,
            chain,
            sink,
            slots: SlotTable::new(limits),
            idempotency: IdempotencyLedger::new(),
            job_timeout: Duration::from_millis(job_timeout_ms),
        }
    }

    /// The receipt chain the gate appends to.
    #[must_use]
    pub fn chain(&self) -> &ReceiptChain {
        &self.chain
    }

    /// Concurrency slot state, for operators and tests.
    #[must_use]
    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// Execute a side-effecting closure under full governance.
    ///
    /// Order: redeem the token, re-run the kernel, take a concurrency
    /// slot for mutating actions, consult the idempotency ledger, then
    /// run the closure under the job timeout. A thrown error or timeout
    /// becomes an `UNCERTAIN_FAIL_CLOSED` denial. The slot releases as
    /// soon as the closure resolves; the receipt append follows.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] only when the receipt itself cannot be
    /// hashed or persisted; every policy outcome is a normal
    /// [`GateOutcome`].
    pub async fn execute<F, Fut>(
        &self,
        ctx: GateContext,
        closure: F,
    ) -> Result<GateOutcome, GateError>
    where
        F: FnOnce(Value, CapabilityToken) -> Fut,
        Fut: Future<Output = anyhow::Result<Value>> + Send,
    {
        let now = Utc::now();
        let payload_hash = match payload_digest(&ctx.payload) {
            Ok(h) => h,
            Err(_) => {
                return self
                    .deny(
                        &ctx,
                        String::new(),
                        ReasonCode::MalformedRequest,
                        "payload cannot be canonicalized",
                    )
                    .await;
            }
        };

        // Token first: a bypass attempt should not observe kernel state.
        let token = match self.kernel.ledger().redeem(
            ctx.token.token_id,
            &ctx.action_id,
            &payload_hash,
            now,
        ) {
            Ok(token) => token,
            Err(err) => {
                warn!(
                    target: "tg.gate",
                    actor = %ctx.actor,
                    action = %ctx.action_id,
                    %err,
                    "token redemption refused"
                );
                return self
                    .deny(&ctx, payload_hash, err.reason_code(), &err.to_string())
                    .await;
            }
        };

        // Re-run the kernel with current consent and artifact state.
        if let Err((reason, detail)) =
            self.kernel.evaluate(&ctx.actor, &ctx.action_id, &ctx.payload)
        {
            return self.deny(&ctx, payload_hash, reason, &detail).await;
        }

        // Concurrency slot for mutating actions.
        let mutates = self
            .kernel
            .registry()
            .get(&ctx.action_id)
            .is_some_and(|spec| spec.mutates);
        let slot = if mutates {
            match self.slots.try_acquire(&ctx.actor) {
                Some(guard) => Some(guard),
                None => {
                    return self
                        .deny(
                            &ctx,
                            payload_hash,
                            ReasonCode::JobConcurrencyLimit,
                            "side-effect concurrency budget exhausted",
                        )
                        .await;
                }
            }
        } else {
            None
        };

        // Idempotency: a replay returns the stored response, a conflict
        // refuses without mutation.
        let idem_key = ctx
            .idempotency_key
            .as_ref()
            .map(|k| IdempotencyLedger::key(&ctx.endpoint, k));
        if let Some(key) = &idem_key {
            match self.idempotency.check(key, &payload_hash) {
                IdempotencyHit::Fresh => {}
                IdempotencyHit::Replay(stored) => {
                    drop(slot);
                    debug!(target: "tg.gate", actor = %ctx.actor, action = %ctx.action_id, "idempotent replay");
                    let receipt = self
                        .append(
                            ReceiptBuilder::new(Stage::Gate, &ctx.action_id, Decision::Allow)
                                .job(ctx.job_id)
                                .policy_id("gate:idempotency")
                                .payload_digest(payload_hash.as_str())
                                .note("replay", json!(true)),
                            ctx.request_id,
                        )
                        .await?;
                    return Ok(GateOutcome {
                        success: true,
                        decision: Decision::Allow,
                        reason: None,
                        response: Some(stored),
                        receipt,
                        replayed: true,
                    });
                }
                IdempotencyHit::Conflict => {
                    drop(slot);
                    return self
                        .deny(
                            &ctx,
                            payload_hash,
                            ReasonCode::GovernanceDeny,
                            "idempotency key reused with a different payload",
                        )
                        .await;
                }
            }
        }

        // Run the handler closure under the job timeout.
        let run = tokio::time::timeout(
            self.job_timeout,
            closure(ctx.payload.clone(), token.clone()),
        )
        .await;
        // Slot releases here, before any receipt is appended.
        drop(slot);

        match run {
            Err(_elapsed) => {
                warn!(
                    target: "tg.gate",
                    actor = %ctx.actor,
                    action = %ctx.action_id,
                    timeout_ms = self.job_timeout.as_millis() as u64,
                    "handler timed out"
                );
                let receipt = self
                    .append(
                        ReceiptBuilder::new(Stage::Gate, &ctx.action_id, Decision::Deny)
                            .reason(ReasonCode::UncertainFailClosed)
                            .job(ctx.job_id)
                            .policy_id("gate:timeout")
                            .payload_digest(payload_hash.as_str())
                            .note("timeout", json!(true))
                            .note("timeout_ms", json!(self.job_timeout.as_millis() as u64)),
                        ctx.request_id,
                    )
                    .await?;
                Ok(GateOutcome {
                    success: false,
                    decision: Decision::Deny,
                    reason: Some(ReasonCode::UncertainFailClosed),
                    response: None,
                    receipt,
                    replayed: false,
                })
            }
            Ok(Err(err)) => {
                warn!(
                    target: "tg.gate",
                    actor = %ctx.actor,
                    action = %ctx.action_id,
                    error = %err,
                    "handler failed; denying fail-closed"
                );
                let receipt = self
                    .append(
                        ReceiptBuilder::new(Stage::Gate, &ctx.action_id, Decision::Deny)
                            .reason(ReasonCode::UncertainFailClosed)
                            .job(ctx.job_id)
                            .policy_id("gate:handler-error")
                            .payload_digest(payload_hash.as_str())
                            .note("error", json!(err.to_string())),
                        ctx.request_id,
                    )
                    .await?;
                Ok(GateOutcome {
                    success: false,
                    decision: Decision::Deny,
                    reason: Some(ReasonCode::UncertainFailClosed),
                    response: None,
                    receipt,
                    replayed: false,
                })
            }
            Ok(Ok(response)) => {
                if let Some(key) = idem_key {
                    self.idempotency
                        .record(key, payload_hash.clone(), response.clone());
                }
                let receipt = self
                    .append(
                        ReceiptBuilder::new(Stage::Handler, &ctx.action_id, Decision::Allow)
                            .job(ctx.job_id)
                            .policy_id(
                                token
                                    .capabilities
                                    .first()
                                    .cloned()
                                    .unwrap_or_else(|| "treaty".into()),
                            )
                            .payload_digest(payload_hash.as_str()),
                        ctx.request_id,
                    )
                    .await?;
                Ok(GateOutcome {
                    success: true,
                    decision: Decision::Allow,
                    reason: None,
                    response: Some(response),
                    receipt,
                    replayed: false,
                })
            }
        }
    }

    async fn deny(
        &self,
        ctx: &GateContext,
        payload_hash: String,
        reason: ReasonCode,
        detail: &str,
    ) -> Result<GateOutcome, GateError> {
        let receipt = self
            .append(
                ReceiptBuilder::new(Stage::Gate, &ctx.action_id, Decision::Deny)
                    .reason(reason)
                    .job(ctx.job_id)
                    .policy_id("gate")
                    .payload_digest(payload_hash)
                    .note("detail", json!(detail)),
                ctx.request_id,
            )
            .await?;
        Ok(GateOutcome {
            success: false,
            decision: Decision::Deny,
            reason: Some(reason),
            response: None,
            receipt,
            replayed: false,
        })
    }

    async fn append(
        &self,
        builder: ReceiptBuilder,
        request_id: Option<Uuid>,
    ) -> Result<Receipt, GateError> {
        let mut builder = builder;
        if let Some(id) = self.kernel.genome_id() {
            builder = builder.artifact(id.artifact_id.clone(), id.version.clone());
        }
        if let Some(request_id) = request_id {
            builder = builder.request(request_id);
        }
        let receipt = self.chain.append(builder.build())?;
        self.sink.persist(&receipt).await?;
        Ok(receipt)
    }
}
