//! Test doubles and common utilities for scheduler contract tests
//!
//! These doubles record what the scheduler does to them without any real
//! network or framework behind them.

#![allow(dead_code)]

use noip_core::config::{DeviceConfig, DeviceSettings};
use noip_core::error::Result;
use noip_core::logging::{LogMode, LogSink};
use noip_core::scheduler::{Collaborators, PollEvent};
use noip_core::sensor::MemoryAccessory;
use noip_core::traits::{IpSource, RawResponse, StaticIpSource, UpdateClient};
use noip_core::{DeviceIdentity, Error};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

pub const PUBLIC_IP: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 5);

/// One scripted reply of [`ScriptedClient`]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with a status and body
    Body(u16, &'static str),
    /// Fail with a transport error
    Fail(&'static str),
}

/// An UpdateClient that replays scripted replies, then repeats a fallback
pub struct ScriptedClient {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<(String, Ipv4Addr)>>,
}

impl ScriptedClient {
    /// Always answer with `body` (status 200)
    pub fn always(body: &'static str) -> Self {
        Self::scripted(Vec::new(), Reply::Body(200, body))
    }

    /// Answer with `script` in order, then `fallback` forever
    pub fn scripted(script: Vec<Reply>, fallback: Reply) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Delay every reply (simulates a slow network)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of requests started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous requests observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// (hostname, ip) of every request
    pub fn seen(&self) -> Vec<(String, Ipv4Addr)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl UpdateClient for ScriptedClient {
    async fn fetch_status(&self, identity: &DeviceIdentity, ip: Ipv4Addr) -> Result<RawResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((identity.hostname.clone(), ip));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            Reply::Body(status, body) => Ok(RawResponse::new(status, body)),
            Reply::Fail(message) => Err(Error::transport(message)),
        }
    }

    fn client_name(&self) -> &'static str {
        "scripted"
    }
}

/// An IpSource that can never determine the address
pub struct FailingIpSource;

#[async_trait::async_trait]
impl IpSource for FailingIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        Err(Error::ip_source("no route to echo service"))
    }
}

/// A LogSink that records every message
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<(Level, String, String)>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<(Level, String, String)> {
        self.entries.lock().unwrap().clone()
    }

    /// Whether a message at `level` contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|(l, _, message)| *l == level && message.contains(needle))
    }

    /// Whether any message at any level contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|(_, _, message)| message.contains(needle))
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: Level, device: &str, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, device.to_string(), message.to_string()));
    }
}

/// Shared handles onto every double a scheduler is built from
pub struct Harness {
    pub client: Arc<ScriptedClient>,
    pub ip_source: Arc<dyn IpSource>,
    pub accessory: Arc<MemoryAccessory>,
    pub log: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(client: ScriptedClient) -> Self {
        Self {
            client: Arc::new(client),
            ip_source: Arc::new(StaticIpSource::new(PUBLIC_IP)),
            accessory: Arc::new(MemoryAccessory::new()),
            log: Arc::new(RecordingSink::default()),
        }
    }

    pub fn with_ip_source(mut self, ip_source: Arc<dyn IpSource>) -> Self {
        self.ip_source = ip_source;
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            client: self.client.clone(),
            ip_source: self.ip_source.clone(),
            accessory: self.accessory.clone(),
            log_sink: self.log.clone(),
        }
    }
}

/// Settings for `home.ddns.net` with debug logging
pub fn settings(refresh_secs: Option<u64>) -> DeviceSettings {
    let mut device = DeviceConfig::new("home.ddns.net", "user", "secret")
        .with_firmware("3.0.0")
        .with_logging(LogMode::Debug);
    device.refresh_rate = refresh_secs;
    device.resolve(None).expect("valid test device")
}

/// Collect every event currently buffered
pub fn drain(rx: &mut mpsc::Receiver<PollEvent>) -> Vec<PollEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Count events matching a predicate
pub fn count(events: &[PollEvent], predicate: impl Fn(&PollEvent) -> bool) -> usize {
    events.iter().filter(|e| predicate(e)).count()
}

/// Advance the (paused) clock
pub async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
