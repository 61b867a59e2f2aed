// SPDX-License-Identifier: MIT OR Apache-2.0
//! Handler registry: action id to handler, frozen at composition time.
//!
//! Handlers may not call storage directly; the gate invokes them with the
//! sanitized payload and the redeemed token, and all writes flow through
//! the gate's closure discipline.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tg_ledger::CapabilityToken;

/// An application handler invoked below the gate.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run the handler over the sanitized payload.
    ///
    /// # Errors
    ///
    /// Any error becomes an `UNCERTAIN_FAIL_CLOSED` denial with a receipt.
    async fn handle(&self, payload: Value, token: &CapabilityToken) -> anyhow::Result<Value>;

    /// Human-readable name used in tracing output.
    fn name(&self) -> &str;
}

/// Maps canonical action ids to handlers. Built once; no mutation after.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an action (builder pattern).
    #[must_use]
    pub fn register(mut self, action_id: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(action_id.into(), handler);
        self
    }

    /// Look up the handler for an action.
    #[must_use]
    pub fn get(&self, action_id: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(action_id).cloned()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// A closure-backed handler, convenient for tests and small deployments.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Value, CapabilityToken) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send,
{
    /// Wrap a closure as a handler.
    pub fn new(name: impl Into<String>, f: F) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            f,
        })
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Value, CapabilityToken) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send,
{
    async fn handle(&self, payload: Value, token: &CapabilityToken) -> anyhow::Result<Value> {
        (self.f)(payload, token.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
