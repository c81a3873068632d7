//! Contract Test: Degraded Mode
//!
//! Verifies how failed poll cycles are surfaced.
//!
//! Constraints verified:
//! - A transport failure keeps the scheduler Active
//! - The failure is written as a degraded value, distinct from a state write
//! - The poll lock is released so the next tick polls normally
//! - An unavailable public IP is handled the same way

mod common;

use common::*;
use noip_core::traits::CharacteristicValue;
use noip_core::{PollEvent, PollScheduler, SchedulerMode, SensorState};
use std::sync::Arc;
use tracing::Level;

#[tokio::test(start_paused = true)]
async fn transport_failure_writes_degraded_value_and_keeps_polling() {
    let harness = Harness::new(ScriptedClient::scripted(
        vec![Reply::Fail("connection refused")],
        Reply::Body(200, "nochg 203.0.113.5"),
    ));
    let (scheduler, mut events) =
        PollScheduler::spawn(settings(Some(1)), harness.collaborators()).unwrap();

    advance(10).await;

    assert_eq!(scheduler.mode(), SchedulerMode::Active);
    assert_eq!(scheduler.sensor_state(), SensorState::OutOfSync);
    assert_eq!(
        harness.accessory.current(),
        CharacteristicValue::Degraded("Transport error: connection refused".to_string())
    );
    assert!(harness
        .log
        .contains(Level::ERROR, "failed to update status"));
    assert!(harness.log.contains(Level::DEBUG, "Error: Transport"));

    advance(1000).await;

    assert_eq!(harness.client.calls(), 2);
    assert_eq!(scheduler.sensor_state(), SensorState::InSync);

    let values: Vec<_> = harness
        .accessory
        .writes()
        .into_iter()
        .map(|w| w.value)
        .collect();
    assert_eq!(
        values,
        vec![
            CharacteristicValue::State(SensorState::OutOfSync),
            CharacteristicValue::Degraded("Transport error: connection refused".to_string()),
            CharacteristicValue::State(SensorState::InSync),
        ]
    );

    scheduler.shutdown().await;

    let events = drain(&mut events);
    assert!(events.contains(&PollEvent::CycleFailed {
        error: "Transport error: connection refused".to_string()
    }));
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_never_suspend() {
    let harness = Harness::new(ScriptedClient::scripted(Vec::new(), Reply::Fail("timed out")));
    let (scheduler, _events) =
        PollScheduler::spawn(settings(Some(1)), harness.collaborators()).unwrap();

    advance(4500).await;

    assert_eq!(harness.client.calls(), 5);
    assert_eq!(harness.accessory.degraded_count(), 5);
    assert_eq!(scheduler.mode(), SchedulerMode::Active);
    assert!(scheduler.is_running());

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn missing_public_ip_is_a_cycle_failure() {
    let harness = Harness::new(ScriptedClient::always("nochg 203.0.113.5"))
        .with_ip_source(Arc::new(FailingIpSource));
    let (scheduler, _events) =
        PollScheduler::spawn(settings(Some(1)), harness.collaborators()).unwrap();

    advance(10).await;

    assert_eq!(harness.client.calls(), 0, "no request without an address");
    assert_eq!(harness.accessory.degraded_count(), 1);
    assert_eq!(scheduler.mode(), SchedulerMode::Active);

    scheduler.shutdown().await;
}
