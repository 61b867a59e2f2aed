// SPDX-License-Identifier: MIT OR Apache-2.0
//! The decision kernel.
//!
//! Four gates, in order: treaty availability, consent, capability, and
//! content policy. The first failing gate decides; on allow a single-use
//! capability token is minted and recorded in the ledger.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tg_core::payload_digest;
use tg_error::ReasonCode;
use tg_genome::loader::LoadedGenome;
use tg_genome::GenomeId;
use tg_ledger::{CapabilityToken, TokenLedger};
use tg_registry::ActionRegistry;
use tracing::debug;

use crate::consent::{ConsentLedger, ConsentStatus};

/// Payload keys that mark forbidden peer coordination.
const HIVE_FIELD: &str = "peer_instances";
/// Payload type value that marks forbidden peer coordination.
const HIVE_TYPE: &str = "coordination_beacon";

/// Outcome of authorizing one action request.
#[derive(Debug, Clone)]
pub enum ActionVerdict {
    /// The action is permitted; the token is the only way to redeem it.
    Allow {
        /// Single-use capability token bound to the sanitized payload.
        token: CapabilityToken,
        /// Capability descriptor that granted the action.
        capability_id: String,
    },
    /// The action is refused.
    Deny {
        /// Stable reason code.
        reason: ReasonCode,
        /// Internal detail for receipts and logs.
        detail: String,
    },
}

impl ActionVerdict {
    /// Returns `true` for an allow verdict.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// The action-decision kernel.
#[derive(Debug, Clone)]
pub struct DecisionKernel {
    genome: Option<Arc<LoadedGenome>>,
    registry: Arc<ActionRegistry>,
    consent: Arc<ConsentLedger>,
    ledger: Arc<TokenLedger>,
}

impl DecisionKernel {
    /// Create a kernel over a loaded artifact.
    #[must_use]
    pub fn new(
        genome: Arc<LoadedGenome>,
        registry: Arc<ActionRegistry>,
        consent: Arc<ConsentLedger>,
        ledger: Arc<TokenLedger>,
    ) -> Self {
        Self {
            genome: Some(genome),
            registry,
            consent,
            ledger,
        }
    }

    /// Create a kernel with no artifact; every evaluation denies
    /// `TREATY_UNAVAILABLE`. Used while the process boots degraded.
    #[must_use]
    pub fn without_genome(
        registry: Arc<ActionRegistry>,
        consent: Arc<ConsentLedger>,
        ledger: Arc<TokenLedger>,
    ) -> Self {
        Self {
            genome: None,
            registry,
            consent,
            ledger,
        }
    }

    /// Returns `true` when a policy artifact is in force.
    #[must_use]
    pub fn has_genome(&self) -> bool {
        self.genome.is_some()
    }

    /// Identity of the artifact in force, for receipt attribution.
    #[must_use]
    pub fn genome_id(&self) -> Option<&GenomeId> {
        self.genome.as_deref().map(|g| &g.id)
    }

    /// The consent ledger this kernel consults.
    #[must_use]
    pub fn consent(&self) -> &ConsentLedger {
        &self.consent
    }

    /// The action registry this kernel consults.
    #[must_use]
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// The token ledger this kernel mints into.
    #[must_use]
    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    /// Evaluate the four gates without minting a token.
    ///
    /// # Errors
    ///
    /// Returns `(reason, detail)` for the first failing gate.
    pub fn evaluate(
        &self,
        actor: &str,
        action_id: &str,
        payload: &Value,
    ) -> Result<String, (ReasonCode, String)> {
        // Gate 1: treaty availability.
        let Some(genome) = self.genome.as_deref() else {
            return Err((
                ReasonCode::TreatyUnavailable,
                "no policy artifact is loaded".into(),
            ));
        };

        // Gate 2: consent.
        match self.consent.status(actor) {
            ConsentStatus::AnchorStopped => {
                return Err((
                    ReasonCode::ConsentStopActive,
                    "CDI_ACTION_DENIED: anchor stop active".into(),
                ));
            }
            ConsentStatus::ActorStopped => {
                return Err((
                    ReasonCode::ConsentStopActive,
                    format!("stop signal active for actor '{actor}'"),
                ));
            }
            ConsentStatus::Paused => {
                return Err((
                    ReasonCode::ConsentNotGranted,
                    format!("activity paused for actor '{actor}'"),
                ));
            }
            ConsentStatus::Clear => {}
        }

        // Gate 3: capability.
        let Some(spec) = self.registry.get(action_id) else {
            return Err((
                ReasonCode::UnregisteredAction,
                format!("action '{action_id}' is not in the registry"),
            ));
        };
        // Actions that declare no capability requirement (the health
        // probe) pass on registry membership alone.
        let capability_id = if spec.required_capabilities.is_empty() {
            "treaty".to_string()
        } else {
            let grant = genome.genome.capabilities.iter().find(|cap| {
                cap.grants(action_id)
                    && spec.required_capabilities.iter().any(|r| *r == cap.id)
            });
            match grant {
                Some(capability) => capability.id.clone(),
                None => {
                    return Err((
                        ReasonCode::CdiActionDenied,
                        format!("no capability grants action '{action_id}'"),
                    ));
                }
            }
        };

        // Gate 4: content policy.
        if contains_hive_markers(payload) {
            return Err((
                ReasonCode::CdiHiveForbidden,
                "payload declares peer-coordination fields".into(),
            ));
        }

        Ok(capability_id)
    }

    /// Evaluate and, on allow, mint and record a capability token bound to
    /// the sanitized payload's digest.
    pub fn authorize(
        &self,
        actor: &str,
        action_id: &str,
        sanitized_payload: &Value,
        now: DateTime<Utc>,
    ) -> ActionVerdict {
        match self.evaluate(actor, action_id, sanitized_payload) {
            Err((reason, detail)) => {
                debug!(target: "tg.kernel", actor, action = action_id, %reason, "action denied");
                ActionVerdict::Deny { reason, detail }
            }
            Ok(capability_id) => {
                let payload_hash = match payload_digest(sanitized_payload) {
                    Ok(h) => h,
                    Err(_) => {
                        return ActionVerdict::Deny {
                            reason: ReasonCode::MalformedRequest,
                            detail: "payload cannot be canonicalized".into(),
                        };
                    }
                };
                let token = self.ledger.mint(
                    actor,
                    action_id,
                    payload_hash,
                    vec![capability_id.clone()],
                    now,
                );
                debug!(
                    target: "tg.kernel",
                    actor,
                    action = action_id,
                    capability = %capability_id,
                    token = %token.token_id,
                    "action allowed"
                );
                ActionVerdict::Allow {
                    token,
                    capability_id,
                }
            }
        }
    }
}

/// `true` when any mapping in the tree declares forbidden coordination
/// fields: a `peer_instances` key, or `"type": "coordination_beacon"`.
#[must_use]
pub fn contains_hive_markers(payload: &Value) -> bool {
    match payload {
        Value::Object(map) => {
            if map.contains_key(HIVE_FIELD) {
                return true;
            }
            if map.get("type").and_then(Value::as_str) == Some(HIVE_TYPE) {
                return true;
            }
            map.values().any(contains_hive_markers)
        }
        Value::Array(items) => items.iter().any(contains_hive_markers),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::{ConsentKind, ConsentSignal};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;
    use tg_core::RiskClass;
    use tg_genome::sign::{generate_signer, sign_genome};
    use tg_genome::{genome_id, CapabilityDescriptor, Genome};

    fn loaded_genome(caps: Vec<CapabilityDescriptor>) -> Arc<LoadedGenome> {
        let (spec, key) = generate_signer("root");
        let mut genome = Genome {
            schema_version: 1,
            name: "covenant".into(),
            version: "1.0.0".into(),
            signers: vec![spec],
            signature_threshold: 1,
            invariants: vec![],
            capabilities: caps,
            build_manifest: BTreeMap::new(),
            signatures: vec![],
        };
        sign_genome(&mut genome, &[("root".into(), key)]).unwrap();
        let id = genome_id(&genome).unwrap();
        Arc::new(LoadedGenome { genome, id })
    }

    fn job_runner_caps() -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor {
                id: "cap:job-runner".into(),
                risk: RiskClass::High,
                allow: vec!["action:job:run".into(), "action:job:checkpoint".into()],
                deny: vec![],
            },
            CapabilityDescriptor {
                id: "cap:memory-writer".into(),
                risk: RiskClass::Medium,
                allow: vec!["action:memory:create".into(), "action:memory:update".into()],
                deny: vec![],
            },
        ]
    }

    fn kernel_with(caps: Vec<CapabilityDescriptor>, anchors: BTreeSet<String>) -> DecisionKernel {
        DecisionKernel::new(
            loaded_genome(caps),
            Arc::new(tg_registry::ActionRegistry::builtin()),
            Arc::new(ConsentLedger::new(anchors)),
            Arc::new(TokenLedger::new(30_000, 0)),
        )
    }

    fn kernel() -> DecisionKernel {
        kernel_with(job_runner_caps(), ["anchor".to_string()].into_iter().collect())
    }

    #[test]
    fn allow_mints_a_recorded_token() {
        let k = kernel();
        let now = Utc::now();
        let payload = json!({"job": "index"});
        match k.authorize("alice", "action:job:run", &payload, now) {
            ActionVerdict::Allow { token, capability_id } => {
                assert_eq!(capability_id, "cap:job-runner");
                assert_eq!(token.action_id, "action:job:run");
                assert_eq!(token.payload_hash, payload_digest(&payload).unwrap());
                assert_eq!(k.ledger().outstanding(now), 1);
            }
            ActionVerdict::Deny { reason, detail } => panic!("denied: {reason} {detail}"),
        }
    }

    #[test]
    fn missing_genome_denies_treaty_unavailable() {
        let k = DecisionKernel::without_genome(
            Arc::new(tg_registry::ActionRegistry::builtin()),
            Arc::new(ConsentLedger::new(BTreeSet::new())),
            Arc::new(TokenLedger::new(30_000, 0)),
        );
        let err = k.evaluate("alice", "action:job:run", &json!({})).unwrap_err();
        assert_eq!(err.0, ReasonCode::TreatyUnavailable);
    }

    #[test]
    fn unregistered_action_denied() {
        let k = kernel();
        let err = k.evaluate("alice", "action:unknown:xyz", &json!({})).unwrap_err();
        assert_eq!(err.0, ReasonCode::UnregisteredAction);
    }

    #[test]
    fn uncovered_action_denied_by_capability_gate() {
        // Registry knows the action but the artifact grants no capability.
        let k = kernel_with(
            vec![CapabilityDescriptor {
                id: "cap:job-runner".into(),
                risk: RiskClass::High,
                allow: vec!["action:job:run".into()],
                deny: vec![],
            }],
            BTreeSet::new(),
        );
        let err = k
            .evaluate("alice", "action:memory:create", &json!({}))
            .unwrap_err();
        assert_eq!(err.0, ReasonCode::CdiActionDenied);
    }

    #[test]
    fn capability_deny_list_wins() {
        let k = kernel_with(
            vec![CapabilityDescriptor {
                id: "cap:job-runner".into(),
                risk: RiskClass::High,
                allow: vec!["action:job:run".into()],
                deny: vec!["action:job:run".into()],
            }],
            BTreeSet::new(),
        );
        let err = k.evaluate("alice", "action:job:run", &json!({})).unwrap_err();
        assert_eq!(err.0, ReasonCode::CdiActionDenied);
    }

    #[test]
    fn anchor_stop_denies_any_actor() {
        let k = kernel();
        k.consent().record(ConsentSignal {
            actor: "anchor".into(),
            kind: ConsentKind::Stop,
            at: Utc::now(),
        });
        let err = k
            .evaluate("alice", "action:memory:create", &json!({"id": "x", "type": "t"}))
            .unwrap_err();
        assert_eq!(err.0, ReasonCode::ConsentStopActive);
        assert!(err.1.contains("anchor"));
        assert!(err.1.contains("CDI_ACTION_DENIED"));
    }

    #[test]
    fn own_stop_denies_only_that_actor() {
        let k = kernel();
        k.consent().record(ConsentSignal {
            actor: "alice".into(),
            kind: ConsentKind::Stop,
            at: Utc::now(),
        });
        assert!(k.evaluate("alice", "action:job:run", &json!({})).is_err());
        assert!(k.evaluate("bob", "action:job:run", &json!({})).is_ok());
    }

    #[test]
    fn hive_markers_denied() {
        let k = kernel();
        let err = k
            .evaluate("alice", "action:job:run", &json!({"peer_instances": ["a", "b"]}))
            .unwrap_err();
        assert_eq!(err.0, ReasonCode::CdiHiveForbidden);

        let err = k
            .evaluate(
                "alice",
                "action:job:run",
                &json!({"msg": {"type": "coordination_beacon"}}),
            )
            .unwrap_err();
        assert_eq!(err.0, ReasonCode::CdiHiveForbidden);
    }

    #[test]
    fn plain_type_field_is_not_hive() {
        let k = kernel();
        assert!(k
            .evaluate("alice", "action:job:run", &json!({"type": "index", "job": "x"}))
            .is_ok());
    }

    #[test]
    fn verdicts_are_deterministic() {
        let k = kernel();
        let payload = json!({"job": "same"});
        let a = k.evaluate("alice", "action:job:run", &payload);
        let b = k.evaluate("alice", "action:job:run", &payload);
        assert_eq!(a.is_ok(), b.is_ok());
        assert_eq!(a.ok(), b.ok());
    }
}
