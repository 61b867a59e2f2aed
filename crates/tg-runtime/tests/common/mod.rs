// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fixtures for runtime tests.

use serde_json::json;
use std::collections::BTreeMap;
use tg_config::GovernorConfig;
use tg_core::RiskClass;
use tg_genome::loader::LoadedGenome;
use tg_genome::sign::{generate_signer, sign_genome};
use tg_genome::{genome_id, CapabilityDescriptor, Genome};
use tg_runtime::{FnHandler, Governor, GovernorBuilder};

/// A signed artifact granting every builtin capability.
pub fn test_genome() -> LoadedGenome {
    let (spec, key) = generate_signer("root");
    let caps = [
        ("cap:job-runner", vec!["action:job:run", "action:job:checkpoint"]),
        ("cap:memory-writer", vec!["action:memory:create", "action:memory:update"]),
        ("cap:interpreter", vec!["action:oi:interpret"]),
        ("cap:ingest-verifier", vec!["action:ingest:verify"]),
        ("cap:consent", vec!["action:consent:signal"]),
    ];
    let mut genome = Genome {
        schema_version: 1,
        name: "covenant".into(),
        version: "1.0.0".into(),
        signers: vec![spec],
        signature_threshold: 1,
        invariants: vec![],
        capabilities: caps
            .into_iter()
            .map(|(id, allow)| CapabilityDescriptor {
                id: id.into(),
                risk: RiskClass::Medium,
                allow: allow.into_iter().map(String::from).collect(),
                deny: vec![],
            })
            .collect(),
        build_manifest: BTreeMap::new(),
        signatures: vec![],
    };
    sign_genome(&mut genome, &[("root".into(), key)]).unwrap();
    let id = genome_id(&genome).unwrap();
    LoadedGenome { genome, id }
}

/// A governor with an echoing job handler and in-memory persistence.
pub fn governor_with(config: GovernorConfig) -> Governor {
    GovernorBuilder::new(config)
        .genome(test_genome())
        .handler(
            "action:job:run",
            FnHandler::new("echo-job", |payload, _token| async move {
                Ok(json!({"status": "ok", "ran": payload}))
            }),
        )
        .handler(
            "action:memory:create",
            FnHandler::new("memory-create", |payload, _token| async move {
                Ok(json!({"created": payload.get("id").cloned().unwrap_or(serde_json::Value::Null)}))
            }),
        )
        .build()
        .expect("governor fixture")
}

/// A governor with default configuration.
pub fn governor() -> Governor {
    governor_with(GovernorConfig::default())
}

/// Convenience: a governor plus a handler that returns a fixed response.
pub fn governor_returning(response: serde_json::Value) -> Governor {
    GovernorBuilder::new(GovernorConfig::default())
        .genome(test_genome())
        .handler(
            "action:job:run",
            FnHandler::new("fixed", move |_payload, _token| {
                let response = response.clone();
                async move { Ok(response) }
            }),
        )
        .build()
        .expect("governor fixture")
}
