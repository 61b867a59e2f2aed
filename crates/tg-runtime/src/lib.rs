// SPDX-License-Identifier: MIT OR Apache-2.0
//! tg-runtime
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The pipeline orchestrator.
//!
//! [`Governor`] owns every governance component and composes them into one
//! atomic request path: ingress firewall, decision kernel, side-effect
//! gate, output policy, egress firewall, chained receipt. Every branch
//! that returns emits a receipt; there is no path from request to
//! response that bypasses the append.
//!
//! The [`GovernorBuilder`] is the composition root: components are
//! constructed once at startup and handed down, never reached through
//! process-wide state.

/// Periodic self-audit and fail-closed posture.
pub mod heartbeat;
/// Verdict counters.
pub mod metrics;
/// Handler registry.
pub mod registry;

pub use heartbeat::{Heartbeat, ProbeReport};
pub use metrics::{MetricsSnapshot, VerdictMetrics};
pub use registry::{FnHandler, Handler, HandlerRegistry};

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tg_config::{ConfigError, GovernorConfig};
use tg_core::proof::{GovernanceProof, ProofAssembler, StageOutcome};
use tg_core::{payload_digest, Decision, Posture, RequestEnvelope, Stage};
use tg_error::ReasonCode;
use tg_firewall::{EgressConfig, EgressFirewall, IngressConfig, IngressFirewall};
use tg_firewall::output_policy::check_output;
use tg_firewall::ratelimit::RateLimitConfig;
use tg_gate::{ConcurrencyLimits, GateContext, GateOutcome, SideEffectGate};
use tg_genome::loader::{GenomeLoader, LoadedGenome};
use tg_genome::GenomeError;
use tg_ingest::{ChunkPacket, ChunkRetriever, Claim, ClaimStatus, GroundedStore, IngestMode, IngestVerifier};
use tg_kernel::{ActionVerdict, ConsentKind, ConsentLedger, ConsentSignal, DecisionKernel};
use tg_ledger::TokenLedger;
use tg_receipt::{ReceiptBuilder, ReceiptChain};
use tg_receipt_store::{MemorySink, ReceiptSink};
use tg_registry::{ActionRegistry, ACTION_CONSENT_SIGNAL, ACTION_HEALTH_CHECK, ACTION_INGEST_VERIFY};
use tracing::{info, warn};

/// Capability token lifetime.
const TOKEN_TTL_MS: u64 = 60_000;
/// Grace period before spent/expired tokens are collected.
const TOKEN_GC_GRACE_MS: u64 = 60_000;

/// Errors from assembling a [`Governor`]. All are fatal: a process that
/// cannot compose its governance core accepts no requests.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Configuration failed validation.
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    /// The policy artifact failed to load or verify.
    #[error("policy artifact rejected: {0}")]
    Genome(#[from] GenomeError),

    /// No policy artifact was supplied or loaded.
    #[error("no policy artifact; refusing to serve")]
    MissingGenome,
}

/// What the pipeline hands back to the transport.
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    /// HTTP-ish status for the transport to map.
    pub status: u16,
    /// Response payload, or `{"error": {code, message}}` on denial.
    pub body: Value,
    /// Per-request governance proof.
    pub proof: GovernanceProof,
    /// `self_hash` of the receipt covering the terminal verdict.
    pub receipt_hash: Option<String>,
}

impl PipelineResponse {
    /// Returns `true` for a 200 response.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Reason-code string from an error body, if present.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.body.get("error")?.get("code")?.as_str()
    }
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    packet: Option<ChunkPacket>,
    #[serde(default)]
    claims: Vec<Claim>,
    #[serde(default = "default_ingest_mode")]
    mode: IngestMode,
}

fn default_ingest_mode() -> IngestMode {
    IngestMode::GroundOnly
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Composition root for the governance core.
pub struct GovernorBuilder {
    config: GovernorConfig,
    genome: Option<Arc<LoadedGenome>>,
    registry: ActionRegistry,
    sink: Option<Arc<dyn ReceiptSink>>,
    handlers: HandlerRegistry,
    retriever: Option<Arc<dyn ChunkRetriever>>,
}

impl GovernorBuilder {
    /// Start a builder from validated-later configuration.
    #[must_use]
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            genome: None,
            registry: ActionRegistry::builtin(),
            sink: None,
            handlers: HandlerRegistry::new(),
            retriever: None,
        }
    }

    /// Use an already-loaded policy artifact.
    #[must_use]
    pub fn genome(mut self, genome: LoadedGenome) -> Self {
        self.genome = Some(Arc::new(genome));
        self
    }

    /// Load the policy artifact from the configured path. Any defect is
    /// fatal; there are no retries.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Genome`] on any artifact defect.
    pub fn load_genome(mut self) -> Result<Self, BuildError> {
        let loader = GenomeLoader::new(self.config.posture, self.config.repo_root.clone());
        let loaded = loader.load(&self.config.artifact_path)?;
        self.genome = Some(Arc::new(loaded));
        Ok(self)
    }

    /// Replace the builtin action registry.
    #[must_use]
    pub fn registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use a persistent receipt sink (defaults to in-memory).
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ReceiptSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Register an application handler.
    #[must_use]
    pub fn handler(mut self, action_id: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.handlers = self.handlers.register(action_id, handler);
        self
    }

    /// Install the runtime-owned chunk retriever for knowledge ingestion.
    #[must_use]
    pub fn chunk_retriever(mut self, retriever: Arc<dyn ChunkRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Assemble the governor.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when configuration or the policy artifact is
    /// unusable; the process must refuse to serve in that case.
    pub fn build(self) -> Result<Governor, BuildError> {
        let warnings = self.config.validate()?;
        for warning in &warnings {
            warn!(target: "tg.governor", %warning, "configuration warning");
        }

        let genome = self.genome.ok_or(BuildError::MissingGenome)?;

        let consent = Arc::new(ConsentLedger::new(self.config.anchor_actors.clone()));
        let ledger = Arc::new(TokenLedger::new(TOKEN_TTL_MS, TOKEN_GC_GRACE_MS));
        let registry = Arc::new(self.registry);
        let kernel = Arc::new(DecisionKernel::new(
            Arc::clone(&genome),
            Arc::clone(&registry),
            Arc::clone(&consent),
            Arc::clone(&ledger),
        ));

        let ingress = Arc::new(IngressFirewall::new(IngressConfig {
            max_request_size: self.config.max_request_size,
            rate: RateLimitConfig {
                window_ms: self.config.rate_limit.window_ms,
                max_requests: self.config.rate_limit.max_requests,
            },
        }));
        let egress = EgressFirewall::new(EgressConfig {
            max_response_size: self.config.max_response_size,
            strict: self.config.posture == Posture::Production,
        });

        let chain = Arc::new(ReceiptChain::new());
        let sink: Arc<dyn ReceiptSink> = self.sink.unwrap_or_else(|| Arc::new(MemorySink::new()));
        let gate = SideEffectGate::new(
            Arc::clone(&kernel),
            Arc::clone(&chain),
            Arc::clone(&sink),
            ConcurrencyLimits {
                max_total: self.config.concurrency.max_total,
                max_per_actor: self.config.concurrency.max_per_actor,
            },
            self.config.job_timeout_ms,
        );

        let heartbeat = Arc::new(Heartbeat::new(
            Arc::clone(&kernel),
            Arc::clone(&ingress),
            Arc::clone(&chain),
            Arc::clone(&sink),
            self.config.heartbeat.interval_ms,
        ));

        info!(
            target: "tg.governor",
            artifact = %genome.id.short(),
            version = %genome.id.version,
            posture = ?self.config.posture,
            handlers = self.handlers.len(),
            "governance core assembled"
        );

        Ok(Governor {
            kernel,
            consent,
            ingress,
            egress,
            gate,
            chain,
            sink,
            handlers: self.handlers,
            heartbeat,
            metrics: VerdictMetrics::new(),
            verifier: IngestVerifier::new(),
            retriever: self.retriever,
            grounded: Arc::new(std::sync::Mutex::new(GroundedStore::new())),
        })
    }
}

// ---------------------------------------------------------------------------
// Governor
// ---------------------------------------------------------------------------

/// The pipeline orchestrator. Owns all components; fails closed on any
/// error.
pub struct Governor {
    kernel: Arc<DecisionKernel>,
    consent: Arc<ConsentLedger>,
    ingress: Arc<IngressFirewall>,
    egress: EgressFirewall,
    gate: SideEffectGate,
    chain: Arc<ReceiptChain>,
    sink: Arc<dyn ReceiptSink>,
    handlers: HandlerRegistry,
    heartbeat: Arc<Heartbeat>,
    metrics: VerdictMetrics,
    verifier: IngestVerifier,
    retriever: Option<Arc<dyn ChunkRetriever>>,
    grounded: Arc<std::sync::Mutex<GroundedStore>>,
}

impl std::fmt::Debug for Governor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Governor").finish_non_exhaustive()
    }
}

impl Governor {
    /// The receipt chain (audit log tail).
    #[must_use]
    pub fn chain(&self) -> &ReceiptChain {
        &self.chain
    }

    /// The persistent receipt sink.
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn ReceiptSink> {
        &self.sink
    }

    /// The heartbeat and its posture flag.
    #[must_use]
    pub fn heartbeat(&self) -> &Arc<Heartbeat> {
        &self.heartbeat
    }

    /// Verdict counters.
    #[must_use]
    pub fn metrics(&self) -> &VerdictMetrics {
        &self.metrics
    }

    /// The decision kernel.
    #[must_use]
    pub fn kernel(&self) -> &DecisionKernel {
        &self.kernel
    }

    /// Spawn the periodic heartbeat loop.
    pub fn spawn_heartbeat(&self) -> tokio::task::JoinHandle<()> {
        Arc::clone(&self.heartbeat).spawn()
    }

    /// Run one request through the full governed pipeline.
    pub async fn handle(&self, envelope: RequestEnvelope) -> PipelineResponse {
        let request_hash = envelope.digest().unwrap_or_default();
        let mut proof = ProofAssembler::new(envelope.request_id, request_hash);

        if let Err(defect) = envelope.validate() {
            return self
                .deny(&envelope, Stage::Ingress, ReasonCode::MalformedRequest, &defect, proof, "pipeline:validate", None)
                .await;
        }

        if self.heartbeat.fail_closed() && envelope.action_id != ACTION_HEALTH_CHECK {
            return self
                .deny(
                    &envelope,
                    Stage::Ingress,
                    ReasonCode::HeartbeatFailClosed,
                    "process is fail-closed; only health probes are served",
                    proof,
                    "heartbeat",
                    None,
                )
                .await;
        }

        // Stage: ingress firewall.
        let ingress_res = self.ingress.inspect(
            &envelope.actor,
            &envelope.endpoint,
            &envelope.payload,
            envelope.arrival_time,
        );
        proof.record_values(
            Stage::Ingress,
            &envelope.payload,
            &ingress_res.sanitized_payload,
            if ingress_res.allowed { StageOutcome::Transform } else { StageOutcome::Deny },
        );
        if !ingress_res.allowed {
            let reason = ingress_res.reason.unwrap_or(ReasonCode::CifIngressBlocked);
            let message = ingress_res
                .violations
                .first()
                .cloned()
                .unwrap_or_else(|| "ingress blocked".into());
            let notes = json!({
                "violations": ingress_res.violations,
                "quarantined": ingress_res.quarantined,
            });
            return self
                .deny(&envelope, Stage::Ingress, reason, &message, proof, "firewall:ingress", Some(notes))
                .await;
        }
        let sanitized = ingress_res.sanitized_payload;

        // Stage: decision kernel.
        let token = match self.kernel.authorize(
            &envelope.actor,
            &envelope.action_id,
            &sanitized,
            envelope.arrival_time,
        ) {
            ActionVerdict::Deny { reason, detail } => {
                proof.record_values(Stage::Decision, &sanitized, &Value::Null, StageOutcome::Deny);
                return self
                    .deny(&envelope, Stage::Decision, reason, &detail, proof, "kernel", None)
                    .await;
            }
            ActionVerdict::Allow { token, .. } => {
                proof.record_values(Stage::Decision, &sanitized, &sanitized, StageOutcome::Pass);
                token
            }
        };

        let ctx = GateContext {
            actor: envelope.actor.clone(),
            action_id: envelope.action_id.clone(),
            endpoint: envelope.endpoint.clone(),
            payload: sanitized.clone(),
            token,
            job_id: envelope.request_id,
            request_id: Some(envelope.request_id),
            idempotency_key: envelope.idempotency_key.clone(),
        };

        // Stage: side-effect gate + handler.
        let executed = self.dispatch(&envelope, &sanitized, ctx, &mut proof).await;
        let outcome = match executed {
            Ok(outcome) => outcome,
            Err(response) => return *response,
        };

        proof.record_values(
            Stage::Handler,
            &sanitized,
            outcome.response.as_ref().unwrap_or(&Value::Null),
            if outcome.success { StageOutcome::Pass } else { StageOutcome::Deny },
        );
        if !outcome.success {
            // The gate already appended the denial receipt.
            let reason = outcome.reason.unwrap_or(ReasonCode::UncertainFailClosed);
            self.metrics.record_denial(reason);
            return PipelineResponse {
                status: reason.http_status(),
                body: error_body(reason, "side effect denied"),
                proof: seal(proof, Decision::Deny, envelope.request_id),
                receipt_hash: outcome.receipt.self_hash.clone(),
            };
        }
        let result = outcome.response.clone().unwrap_or(Value::Null);

        // Stage: output policy (before the egress firewall).
        let policy_res = check_output(&result);
        proof.record_values(
            Stage::OutputPolicy,
            &result,
            &result,
            if policy_res.allowed { StageOutcome::Pass } else { StageOutcome::Deny },
        );
        if !policy_res.allowed {
            let reason = policy_res.reason.unwrap_or(ReasonCode::CdiOutputBlocked);
            let notes = json!({"violations": policy_res.violations});
            return self
                .deny(&envelope, Stage::OutputPolicy, reason, "response content blocked", proof, "output-policy", Some(notes))
                .await;
        }

        // Stage: egress firewall.
        let egress_res = self
            .egress
            .inspect(&envelope.actor, &envelope.endpoint, &result);
        proof.record_values(
            Stage::Egress,
            &result,
            &egress_res.sanitized_payload,
            if egress_res.allowed { StageOutcome::Transform } else { StageOutcome::Deny },
        );
        if !egress_res.allowed {
            let reason = egress_res.reason.unwrap_or(ReasonCode::CifEgressBlocked);
            let message = egress_res
                .violations
                .first()
                .cloned()
                .unwrap_or_else(|| "egress blocked".into());
            let notes = json!({
                "violations": egress_res.violations,
                "leaks": egress_res.leaks,
            });
            return self
                .deny(&envelope, Stage::Egress, reason, &message, proof, "firewall:egress", Some(notes))
                .await;
        }

        self.metrics.record_allow();
        PipelineResponse {
            status: 200,
            body: egress_res.sanitized_payload,
            proof: seal(proof, Decision::Allow, envelope.request_id),
            receipt_hash: outcome.receipt.self_hash.clone(),
        }
    }

    /// Select and run the closure for this action under the gate.
    async fn dispatch(
        &self,
        envelope: &RequestEnvelope,
        sanitized: &Value,
        ctx: GateContext,
        proof: &mut ProofAssembler,
    ) -> Result<GateOutcome, Box<PipelineResponse>> {
        let run = if envelope.action_id == ACTION_HEALTH_CHECK {
            let healthy = !self.heartbeat.fail_closed();
            let receipts = self.chain.len();
            self.gate
                .execute(ctx, move |_payload, _token| async move {
                    Ok(json!({"healthy": healthy, "receipts": receipts}))
                })
                .await
        } else if envelope.action_id == ACTION_CONSENT_SIGNAL {
            let kind: ConsentKind = match sanitized
                .get("kind")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
            {
                Ok(Some(kind)) => kind,
                _ => {
                    let proof_taken = std::mem::replace(
                        proof,
                        ProofAssembler::new(envelope.request_id, String::new()),
                    );
                    return Err(Box::new(
                        self.deny(
                            envelope,
                            Stage::Decision,
                            ReasonCode::MalformedRequest,
                            "consent signal requires a 'kind' of stop, pause, or resume",
                            proof_taken,
                            "consent",
                            None,
                        )
                        .await,
                    ));
                }
            };
            let consent = Arc::clone(&self.consent);
            let actor = envelope.actor.clone();
            let at = envelope.arrival_time;
            self.gate
                .execute(ctx, move |_payload, _token| async move {
                    consent.record(ConsentSignal { actor, kind, at });
                    Ok(json!({"recorded": kind}))
                })
                .await
        } else if envelope.action_id == ACTION_INGEST_VERIFY
            && let Some(retriever) = self.retriever.clone()
        {
            return self
                .dispatch_ingest(envelope, sanitized, ctx, proof, retriever)
                .await;
        } else {
            let Some(handler) = self.handlers.get(&envelope.action_id) else {
                proof.record_values(Stage::Handler, sanitized, &Value::Null, StageOutcome::Deny);
                let proof_taken = std::mem::replace(
                    proof,
                    ProofAssembler::new(envelope.request_id, String::new()),
                );
                return Err(Box::new(
                    self.deny(
                        envelope,
                        Stage::Handler,
                        ReasonCode::RouteNotFound,
                        &format!("no handler for action '{}'", envelope.action_id),
                        proof_taken,
                        "pipeline:route",
                        None,
                    )
                    .await,
                ));
            };
            self.gate
                .execute(ctx, move |payload, token| async move {
                    handler.handle(payload, &token).await
                })
                .await
        };

        match run {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(target: "tg.governor", error = %err, "gate could not seal a receipt");
                self.metrics.record_denial(ReasonCode::UncertainFailClosed);
                let proof_taken = std::mem::replace(
                    proof,
                    ProofAssembler::new(envelope.request_id, String::new()),
                );
                Err(Box::new(PipelineResponse {
                    status: 500,
                    body: error_body(ReasonCode::UncertainFailClosed, "audit trail unavailable"),
                    proof: seal(proof_taken, Decision::Deny, envelope.request_id),
                    receipt_hash: None,
                }))
            }
        }
    }

    /// Knowledge ingestion: verify outside the gate (retrieval is
    /// runtime-owned and read-only), then commit keyed grounded claims as
    /// the gated side effect.
    async fn dispatch_ingest(
        &self,
        envelope: &RequestEnvelope,
        sanitized: &Value,
        ctx: GateContext,
        proof: &mut ProofAssembler,
        retriever: Arc<dyn ChunkRetriever>,
    ) -> Result<GateOutcome, Box<PipelineResponse>> {
        let request: IngestRequest = match serde_json::from_value(sanitized.clone()) {
            Ok(request) => request,
            Err(e) => {
                let proof_taken = std::mem::replace(
                    proof,
                    ProofAssembler::new(envelope.request_id, String::new()),
                );
                return Err(Box::new(
                    self.deny(
                        envelope,
                        Stage::Decision,
                        ReasonCode::MalformedRequest,
                        &format!("ingest batch malformed: {e}"),
                        proof_taken,
                        "ingest",
                        None,
                    )
                    .await,
                ));
            }
        };

        let mut working = self
            .grounded
            .lock()
            .expect("grounded store lock poisoned")
            .clone();
        let report = match self
            .verifier
            .verify(
                request.packet.as_ref(),
                &request.claims,
                request.mode,
                retriever.as_ref(),
                &mut working,
            )
            .await
        {
            Ok(report) => report,
            Err(err) => {
                let proof_taken = std::mem::replace(
                    proof,
                    ProofAssembler::new(envelope.request_id, String::new()),
                );
                return Err(Box::new(
                    self.deny(
                        envelope,
                        Stage::Handler,
                        err.reason_code(),
                        &err.to_string(),
                        proof_taken,
                        "ingest",
                        None,
                    )
                    .await,
                ));
            }
        };

        // Keyed grounded claims to commit under the gate.
        let commits: Vec<(String, String, String)> = request
            .claims
            .iter()
            .zip(report.outcomes.iter())
            .filter(|(claim, outcome)| {
                outcome.status == ClaimStatus::Grounded && claim.key.is_some()
            })
            .filter_map(|(claim, _)| {
                claim
                    .key
                    .clone()
                    .map(|key| (key, claim.claim_id.clone(), claim.text.clone()))
            })
            .collect();

        let report_json = serde_json::to_value(&report).unwrap_or_else(|_| json!({}));
        let store = Arc::clone(&self.grounded);
        let run = self
            .gate
            .execute(ctx, move |_payload, _token| async move {
                let mut store = store.lock().expect("grounded store lock poisoned");
                for (key, claim_id, text) in &commits {
                    store.insert_if_absent(key, claim_id, text);
                }
                Ok(report_json)
            })
            .await;

        match run {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(target: "tg.governor", error = %err, "gate could not seal a receipt");
                self.metrics.record_denial(ReasonCode::UncertainFailClosed);
                let proof_taken = std::mem::replace(
                    proof,
                    ProofAssembler::new(envelope.request_id, String::new()),
                );
                Err(Box::new(PipelineResponse {
                    status: 500,
                    body: error_body(ReasonCode::UncertainFailClosed, "audit trail unavailable"),
                    proof: seal(proof_taken, Decision::Deny, envelope.request_id),
                    receipt_hash: None,
                }))
            }
        }
    }

    /// Append a denial receipt, seal the proof, and build the response.
    #[allow(clippy::too_many_arguments)]
    async fn deny(
        &self,
        envelope: &RequestEnvelope,
        stage: Stage,
        reason: ReasonCode,
        message: &str,
        proof: ProofAssembler,
        policy_id: &str,
        notes: Option<Value>,
    ) -> PipelineResponse {
        self.metrics.record_denial(reason);

        let mut builder = ReceiptBuilder::new(stage, &envelope.action_id, Decision::Deny)
            .reason(reason)
            .job(envelope.request_id)
            .request(envelope.request_id)
            .policy_id(policy_id)
            .payload_digest(payload_digest(&envelope.payload).unwrap_or_default())
            .note("detail", json!(message));
        if let Some(notes) = notes {
            builder = builder.note("stage_detail", notes);
        }
        if let Some(id) = self.kernel.genome_id() {
            builder = builder.artifact(id.artifact_id.clone(), id.version.clone());
        }

        let receipt_hash = match self.chain.append(builder.build()) {
            Ok(receipt) => {
                if let Err(e) = self.sink.persist(&receipt).await {
                    warn!(target: "tg.governor", error = %e, "denial receipt not persisted");
                }
                receipt.self_hash
            }
            Err(e) => {
                warn!(target: "tg.governor", error = %e, "denial receipt not appended");
                None
            }
        };

        PipelineResponse {
            status: reason.http_status(),
            body: error_body(reason, message),
            proof: seal(proof, Decision::Deny, envelope.request_id),
            receipt_hash,
        }
    }
}

/// User-visible error body: reason code and short message only.
fn error_body(reason: ReasonCode, message: &str) -> Value {
    json!({
        "error": {
            "code": reason.as_str(),
            "message": message,
        }
    })
}

/// Seal a proof, falling back to a bare verdict transcript when the
/// transcript itself cannot serialize.
fn seal(proof: ProofAssembler, decision: Decision, request_id: uuid::Uuid) -> GovernanceProof {
    proof.seal(decision).unwrap_or(GovernanceProof {
        request_id,
        request_hash: String::new(),
        stages: vec![],
        verdict: Some(decision),
        final_hash: None,
    })
}
