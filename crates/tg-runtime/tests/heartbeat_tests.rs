// SPDX-License-Identifier: MIT OR Apache-2.0
//! Heartbeat probes and fail-closed posture transitions.

mod common;

use common::governor;
use serde_json::json;
use tg_core::EnvelopeBuilder;

#[tokio::test]
async fn healthy_governor_passes_probe_battery() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tg=debug")
        .with_test_writer()
        .try_init();
    let gov = governor();
    let report = gov.heartbeat().probe().await;
    assert!(report.healthy(), "failures: {:?}", report.failures);
}

#[tokio::test]
async fn cycle_keeps_healthy_process_open() {
    let gov = governor();
    let report = gov.heartbeat().cycle().await;
    assert!(report.healthy());
    assert!(!gov.heartbeat().fail_closed());
}

#[tokio::test]
async fn forced_degradation_then_cycle_recovers() {
    let gov = governor();
    gov.heartbeat().force(true);
    assert!(gov.heartbeat().fail_closed());

    // The probe battery still passes, so one cycle restores service.
    let report = gov.heartbeat().cycle().await;
    assert!(report.healthy());
    assert!(!gov.heartbeat().fail_closed());
}

#[tokio::test]
async fn probes_run_against_live_chain_state() {
    let gov = governor();

    // Work through the pipeline, then re-probe: the chain grew and must
    // still validate.
    for i in 0..3 {
        let response = gov
            .handle(
                EnvelopeBuilder::new("alice", "action:job:run")
                    .endpoint("/jobs")
                    .payload(json!({"job": format!("probe-{i}")}))
                    .build(),
            )
            .await;
        assert!(response.is_ok());
    }
    assert_eq!(gov.chain().len(), 3);

    let report = gov.heartbeat().cycle().await;
    assert!(report.healthy(), "failures: {:?}", report.failures);
    assert!(!gov.heartbeat().fail_closed());
}

#[tokio::test]
async fn spawned_heartbeat_ticks() {
    let gov = governor();
    let handle = gov.spawn_heartbeat();

    // The first tick fires immediately; give it a moment to run.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!gov.heartbeat().fail_closed());
    handle.abort();
}
