//! Contract Test: Poll Overlap
//!
//! Verifies that at most one poll cycle runs per device.
//!
//! Constraints verified:
//! - The first poll runs immediately, not after one interval
//! - A tick that fires while a request is in flight is dropped, not queued
//! - Polling resumes on the next tick once the slow request returns
//!
//! If this test fails, someone has:
//! - Awaited the poll inline so ticks pile up behind it
//! - Removed or leaked the poll lock

mod common;

use common::*;
use noip_core::config::DEFAULT_REFRESH_RATE_SECS;
use noip_core::{PollEvent, PollScheduler, SchedulerMode};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn slow_response_drops_overlapping_ticks() {
    // 1s interval, 2.5s responses: ticks at 1s and 2s must be dropped
    let harness = Harness::new(
        ScriptedClient::always("nochg 203.0.113.5").with_delay(Duration::from_millis(2500)),
    );
    let (scheduler, mut events) =
        PollScheduler::spawn(settings(Some(1)), harness.collaborators()).unwrap();

    advance(3500).await;

    assert_eq!(harness.client.calls(), 2, "polls at 0s and 3s only");
    assert_eq!(harness.client.max_in_flight(), 1);
    assert_eq!(scheduler.mode(), SchedulerMode::Active);

    scheduler.shutdown().await;

    let events = drain(&mut events);
    assert_eq!(count(&events, |e| matches!(e, PollEvent::CycleStarted)), 2);
    assert_eq!(count(&events, |e| matches!(e, PollEvent::CycleSkipped)), 2);
    assert_eq!(
        count(&events, |e| matches!(e, PollEvent::CycleCompleted { .. })),
        1
    );
    assert!(harness.log.mentions("Update in progress, skipping tick"));
}

#[tokio::test(start_paused = true)]
async fn dropped_ticks_are_not_replayed_later() {
    let harness = Harness::new(
        ScriptedClient::always("nochg 203.0.113.5").with_delay(Duration::from_millis(4500)),
    );
    let (scheduler, _events) =
        PollScheduler::spawn(settings(Some(1)), harness.collaborators()).unwrap();

    // First request returns at 4.5s; the 1..4s ticks are gone for good
    advance(5200).await;

    assert_eq!(harness.client.calls(), 2, "polls at 0s and 5s only");
    assert_eq!(harness.client.max_in_flight(), 1);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn first_poll_is_immediate_with_default_interval() {
    let harness = Harness::new(ScriptedClient::always("nochg 203.0.113.5"));
    let (scheduler, mut events) =
        PollScheduler::spawn(settings(None), harness.collaborators()).unwrap();

    advance(10).await;
    assert_eq!(harness.client.calls(), 1);

    // Nothing more until the default interval has passed
    advance(DEFAULT_REFRESH_RATE_SECS * 1000 - 100).await;
    assert_eq!(harness.client.calls(), 1);

    advance(200).await;
    assert_eq!(harness.client.calls(), 2);

    scheduler.shutdown().await;

    let events = drain(&mut events);
    assert_eq!(
        events.first(),
        Some(&PollEvent::Started {
            device: "home.ddns.net".to_string(),
            refresh_rate: Duration::from_secs(DEFAULT_REFRESH_RATE_SECS),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn requests_carry_hostname_and_public_ip() {
    let harness = Harness::new(ScriptedClient::always("nochg 203.0.113.5"));
    let (scheduler, _events) =
        PollScheduler::spawn(settings(Some(60)), harness.collaborators()).unwrap();

    advance(10).await;

    assert_eq!(
        harness.client.seen(),
        vec![("home.ddns.net".to_string(), PUBLIC_IP)]
    );

    scheduler.shutdown().await;
}
