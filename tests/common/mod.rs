// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fixtures for workspace end-to-end tests.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tg_config::GovernorConfig;
use tg_core::{RequestEnvelope, RiskClass};
use tg_genome::loader::LoadedGenome;
use tg_genome::sign::{generate_signer, sign_genome};
use tg_genome::{genome_id, CapabilityDescriptor, Genome};
use tg_ingest::{ChunkRetriever, RetrieverError};
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

/// Chunk retriever serving a fixed corpus.
pub struct CorpusRetriever {
    chunks: BTreeMap<String, String>,
}

impl CorpusRetriever {
    pub fn with(chunks: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        })
    }
}

#[async_trait]
impl ChunkRetriever for CorpusRetriever {
    async fn fetch(&self, ids: &[String]) -> Result<BTreeMap<String, String>, RetrieverError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.chunks.get(id).map(|text| (id.clone(), text.clone())))
            .collect())
    }
}

/// Governor with echo handlers, in-memory persistence, and a fixed corpus.
pub fn governor_with(config: GovernorConfig) -> Governor {
    builder_with(config).build().expect("governor fixture")
}

/// Builder preloaded with the fixture genome and handlers, for tests that
/// need to customize one piece.
pub fn builder_with(config: GovernorConfig) -> GovernorBuilder {
    GovernorBuilder::new(config)
        .genome(test_genome())
        .chunk_retriever(CorpusRetriever::with(&[(
            "c1",
            "Paris is the capital of France.",
        )]))
        .handler(
            "action:job:run",
            FnHandler::new("echo-job", |payload, _token| async move {
                Ok(json!({"status": "ok", "ran": payload}))
            }),
        )
        .handler(
            "action:memory:create",
            FnHandler::new("memory-create", |payload, _token| async move {
                Ok(json!({
                    "created": payload.get("id").cloned().unwrap_or(serde_json::Value::Null)
                }))
            }),
        )
}

/// Governor with default configuration.
pub fn governor() -> Governor {
    governor_with(GovernorConfig::default())
}

/// Build a pipeline envelope.
pub fn envelope(actor: &str, action: &str, payload: serde_json::Value) -> RequestEnvelope {
    tg_core::EnvelopeBuilder::new(actor, action)
        .endpoint("/pipeline")
        .payload(payload)
        .build()
}
