// SPDX-License-Identifier: MIT OR Apache-2.0
//! Periodic self-audit and fail-closed posture.
//!
//! The heartbeat runs a fixed probe battery: artifact present, registry
//! non-empty, receipt chain and journal intact, plus canary probes (a
//! known-bad payload must quarantine, a known-safe one must pass). Any
//! failing probe flips the process into fail-closed posture; the
//! orchestrator then denies every non-health request until a later cycle
//! restores health. Posture transitions log exactly once.

use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tg_firewall::IngressFirewall;
use tg_kernel::DecisionKernel;
use tg_receipt::ReceiptChain;
use tg_receipt_store::ReceiptSink;
use tracing::{debug, info, warn};

/// Result of one probe battery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Names of failing probes, in battery order. Empty means healthy.
    pub failures: Vec<String>,
}

impl ProbeReport {
    /// Returns `true` when every probe passed.
    #[must_use]
    pub fn healthy(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The heartbeat task and the posture flag it owns.
pub struct Heartbeat {
    fail_closed: AtomicBool,
    kernel: Arc<DecisionKernel>,
    ingress: Arc<IngressFirewall>,
    chain: Arc<ReceiptChain>,
    sink: Arc<dyn ReceiptSink>,
    interval: Duration,
}

impl Heartbeat {
    /// Create a heartbeat over the given components.
    #[must_use]
    pub fn new(
        kernel: Arc<DecisionKernel>,
        ingress: Arc<IngressFirewall>,
        chain: Arc<ReceiptChain>,
        sink: Arc<dyn ReceiptSink>,
        interval_ms: u64,
    ) -> Self {
        Self {
            fail_closed: AtomicBool::new(false),
            kernel,
            ingress,
            chain,
            sink,
            interval: Duration::from_millis(interval_ms),
        }
    }

    /// Returns `true` while the process is in fail-closed posture.
    #[must_use]
    pub fn fail_closed(&self) -> bool {
        self.fail_closed.load(Ordering::SeqCst)
    }

    /// Force the posture, for tests and operator intervention.
    pub fn force(&self, fail_closed: bool) {
        self.fail_closed.store(fail_closed, Ordering::SeqCst);
    }

    /// Run the probe battery once, without changing posture.
    pub async fn probe(&self) -> ProbeReport {
        let mut failures = Vec::new();

        if !self.kernel.has_genome() {
            failures.push("policy artifact missing".to_string());
        }
        if self.kernel.registry().is_empty() {
            failures.push("action registry empty".to_string());
        }
        if !self.chain.validate().is_valid() {
            failures.push("receipt chain broken".to_string());
        }
        match self.sink.validate().await {
            Ok(report) if report.is_valid() => {}
            Ok(_) => failures.push("receipt journal broken".to_string()),
            Err(e) => failures.push(format!("receipt store unreachable: {e}")),
        }

        // Canary probes: the firewall must still tell good from bad.
        if !self
            .ingress
            .probe_quarantine(&json!({"job": "eval(canary)"}))
        {
            failures.push("quarantine canary passed the firewall".to_string());
        }
        if self
            .ingress
            .probe_quarantine(&json!({"job": "canary", "in": "canary.md"}))
        {
            failures.push("benign canary was quarantined".to_string());
        }

        ProbeReport { failures }
    }

    /// Run one probe cycle and update posture, logging transitions once.
    ///
    /// Housekeeping rides along: expired tokens are collected and idle
    /// rate buckets pruned before the battery runs.
    pub async fn cycle(&self) -> ProbeReport {
        let now = chrono::Utc::now();
        let collected = self.kernel.ledger().gc(now);
        if collected > 0 {
            debug!(target: "tg.heartbeat", collected, "expired tokens collected");
        }
        self.ingress.prune(now);

        let report = self.probe().await;
        let degraded = !report.healthy();
        let was = self.fail_closed.swap(degraded, Ordering::SeqCst);
        match (was, degraded) {
            (false, true) => {
                warn!(
                    target: "tg.heartbeat",
                    failures = ?report.failures,
                    "entering fail-closed posture"
                );
            }
            (true, false) => {
                info!(target: "tg.heartbeat", "health restored; leaving fail-closed posture");
            }
            _ => {
                debug!(target: "tg.heartbeat", healthy = !degraded, "probe cycle complete");
            }
        }
        report
    }

    /// Spawn the periodic probe loop. The task runs until aborted.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hb = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(hb.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = hb.cycle().await;
            }
        })
    }
}
