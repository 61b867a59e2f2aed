// SPDX-License-Identifier: MIT OR Apache-2.0
//! tg-registry
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The closed set of canonical action identifiers. Actions not in the
//! registry are always denied; the set is frozen at process start and
//! amendments require a treaty amendment, not a code path.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tg_core::RiskClass;

/// Canonical id for running a job.
pub const ACTION_JOB_RUN: &str = "action:job:run";
/// Canonical id for checkpointing a running job.
pub const ACTION_JOB_CHECKPOINT: &str = "action:job:checkpoint";
/// Canonical id for creating a memory node.
pub const ACTION_MEMORY_CREATE: &str = "action:memory:create";
/// Canonical id for updating a memory node.
pub const ACTION_MEMORY_UPDATE: &str = "action:memory:update";
/// Canonical id for interpreting operator input.
pub const ACTION_OI_INTERPRET: &str = "action:oi:interpret";
/// Canonical id for verifying a knowledge-ingestion batch.
pub const ACTION_INGEST_VERIFY: &str = "action:ingest:verify";
/// Canonical id for recording a consent signal.
pub const ACTION_CONSENT_SIGNAL: &str = "action:consent:signal";
/// Canonical id for the health probe.
pub const ACTION_HEALTH_CHECK: &str = "action:health:check";

/// Specification of a registered action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Canonical identifier.
    pub id: String,
    /// Risk classification.
    pub risk: RiskClass,
    /// Capability ids a caller must hold.
    pub required_capabilities: Vec<String>,
    /// Whether the action changes state and therefore takes a
    /// concurrency slot at the gate.
    pub mutates: bool,
}

impl ActionSpec {
    fn new(id: &str, risk: RiskClass, caps: &[&str], mutates: bool) -> Self {
        Self {
            id: id.to_string(),
            risk,
            required_capabilities: caps.iter().map(|c| (*c).to_string()).collect(),
            mutates,
        }
    }
}

/// Frozen lookup table of registered actions.
///
/// Lookup is constant-time. There is deliberately no insert method: the
/// set is fixed by the constructor and never changes afterwards.
///
/// # Examples
///
/// ```
/// use tg_registry::{ActionRegistry, ACTION_JOB_RUN};
///
/// let registry = ActionRegistry::builtin();
/// assert!(registry.is_registered(ACTION_JOB_RUN));
/// assert!(!registry.is_registered("action:unknown:xyz"));
/// ```
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, ActionSpec>,
}

impl ActionRegistry {
    /// The built-in action set.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_specs(vec![
            ActionSpec::new(ACTION_JOB_RUN, RiskClass::High, &["cap:job-runner"], true),
            ActionSpec::new(
                ACTION_JOB_CHECKPOINT,
                RiskClass::Medium,
                &["cap:job-runner"],
                true,
            ),
            ActionSpec::new(
                ACTION_MEMORY_CREATE,
                RiskClass::Medium,
                &["cap:memory-writer"],
                true,
            ),
            ActionSpec::new(
                ACTION_MEMORY_UPDATE,
                RiskClass::Medium,
                &["cap:memory-writer"],
                true,
            ),
            ActionSpec::new(
                ACTION_OI_INTERPRET,
                RiskClass::Low,
                &["cap:interpreter"],
                false,
            ),
            ActionSpec::new(
                ACTION_INGEST_VERIFY,
                RiskClass::High,
                &["cap:ingest-verifier"],
                true,
            ),
            ActionSpec::new(
                ACTION_CONSENT_SIGNAL,
                RiskClass::Critical,
                &["cap:consent"],
                true,
            ),
            ActionSpec::new(ACTION_HEALTH_CHECK, RiskClass::Low, &[], false),
        ])
    }

    /// Build a registry from explicit specs. Later duplicates win; tests
    /// use this to model amended treaties.
    #[must_use]
    pub fn from_specs(specs: Vec<ActionSpec>) -> Self {
        let mut actions = HashMap::with_capacity(specs.len());
        for spec in specs {
            actions.insert(spec.id.clone(), spec);
        }
        Self { actions }
    }

    /// Look up an action spec.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ActionSpec> {
        self.actions.get(id)
    }

    /// Returns `true` if the id is in the closed set.
    #[must_use]
    pub fn is_registered(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if the registry is empty (a boot defect).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate over the registered specs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions.values()
    }
}
