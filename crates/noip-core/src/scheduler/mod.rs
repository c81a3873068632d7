//! Poll scheduler
//!
//! The PollScheduler is responsible for:
//! - Running one poll cycle immediately, then one per refresh interval
//! - Dropping ticks while a cycle is still in flight
//! - Suspending for good after a fatal provider response
//! - Releasing every timer and task on teardown
//!
//! ## Architecture
//!
//! ```text
//!  ┌────────────┐  tick   ┌──────────┐  ip   ┌──────────────┐  body  ┌────────────┐
//!  │  interval  │───────▶│ PollLock │──────▶│ UpdateClient │──────▶│ interpret  │
//!  └────────────┘         └──────────┘       └──────────────┘        └────────────┘
//!        ▲                                                                 │
//!        │ Suspend stops the timer                       state / degraded  ▼
//!        └─────────────────────────────────────────────────── SensorProjector
//! ```
//!
//! ## State Machine
//!
//! `Active` → `Suspended` on any fatal token. `Suspended` is terminal for
//! this scheduler: recovery means building a new one with corrected config.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{DeviceIdentity, DeviceSettings};
use crate::error::{Error, Result};
use crate::logging::{DeviceLogger, LogSink};
use crate::response::{interpret, Directive, StatusCode};
use crate::sensor::{SensorProjector, SensorState};
use crate::traits::{AccessoryBinding, IpSource, RawResponse, UpdateClient};

/// How long a suspended scheduler waits for teardown before reporting the
/// suspension as a terminal error
pub const SUSPEND_GRACE: Duration = Duration::from_secs(1);

/// Capacity of the event channel returned by [`PollScheduler::spawn`]
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Scheduler mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Polling on the fixed interval
    Active,
    /// Polling halted pending operator action
    Suspended,
}

/// Events emitted by the PollScheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Scheduler started
    Started {
        device: String,
        refresh_rate: Duration,
    },

    /// A poll cycle took the lock
    CycleStarted,

    /// A tick was dropped because a cycle was still in flight
    CycleSkipped,

    /// A poll cycle received and interpreted a response
    CycleCompleted {
        code: Option<StatusCode>,
        sensor: SensorState,
    },

    /// A poll cycle failed before a response was available
    CycleFailed { error: String },

    /// A fatal response suspended polling
    Suspended { code: StatusCode },

    /// Scheduler stopped
    Stopped { reason: String },
}

/// External collaborators injected into a scheduler
#[derive(Clone)]
pub struct Collaborators {
    /// Performs the update request
    pub client: Arc<dyn UpdateClient>,
    /// Supplies the public IPv4 address
    pub ip_source: Arc<dyn IpSource>,
    /// Accessory framework capability
    pub accessory: Arc<dyn AccessoryBinding>,
    /// Structured logger capability
    pub log_sink: Arc<dyn LogSink>,
}

/// State shared between the timer task and the poll cycle tasks
struct Device {
    identity: DeviceIdentity,
    client: Arc<dyn UpdateClient>,
    ip_source: Arc<dyn IpSource>,
    projector: SensorProjector,
    log: DeviceLogger,
    /// The poll lock: set while a cycle is in flight
    in_progress: AtomicBool,
    suspended: AtomicBool,
    event_tx: mpsc::Sender<PollEvent>,
}

/// Held for the duration of one poll cycle; releases the lock on drop
struct PollGuard {
    device: Arc<Device>,
}

impl PollGuard {
    fn try_acquire(device: &Arc<Device>) -> Option<Self> {
        device
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                device: Arc::clone(device),
            })
    }
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.device.in_progress.store(false, Ordering::Release);
    }
}

impl Device {
    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    /// Run one fetch → interpret → project sequence
    ///
    /// Returns the fatal code if the response calls for suspension.
    async fn poll_cycle(&self) -> Option<StatusCode> {
        self.emit_event(PollEvent::CycleStarted);

        let raw = match self.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                if !e.is_cycle_local() {
                    self.log.warn(&format!("Unexpected collaborator error: {e}"));
                }
                self.projector.project_failure(&e);
                self.emit_event(PollEvent::CycleFailed {
                    error: e.to_string(),
                });
                return None;
            }
        };

        self.log.debug_warn(&format!(
            "statusCode: {} ({})",
            raw.status,
            self.client.client_name()
        ));
        self.log.debug(&format!("response: {:?}", raw.body));

        let result = interpret(self.identity.display_name(), &raw.body);
        if let Some(code) = result.response.code {
            self.log
                .debug(&format!("Contact Sensor: {}, {code}", self.log.device()));
        }
        self.log.log(result.level, &result.message);

        self.projector.update(result.sensor);
        self.emit_event(PollEvent::CycleCompleted {
            code: result.response.code,
            sensor: result.sensor,
        });

        match (result.directive, result.response.code) {
            (Directive::Suspend, Some(code)) => Some(code),
            _ => None,
        }
    }

    async fn fetch(&self) -> Result<RawResponse> {
        let ip = self.ip_source.current().await?;
        self.client.fetch_status(&self.identity, ip).await
    }

    fn suspend(&self, code: StatusCode) {
        self.suspended.store(true, Ordering::Release);
        self.log.debug(&format!(
            "Update polling halted by '{code}' response, reconfigure the device to resume"
        ));
        self.emit_event(PollEvent::Suspended { code });
    }

    fn emit_event(&self, event: PollEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if self.event_tx.try_send(event).is_err() {
            self.log.warn("Event channel full, dropping poll event");
        }
    }
}

/// Self-scheduling poller for one device
///
/// ## Lifecycle
///
/// 1. Create with [`PollScheduler::spawn()`]; the first poll runs right away
/// 2. A repeating timer fires every `refresh_rate`
/// 3. A fatal response suspends the scheduler; its timer task then exits
/// 4. [`PollScheduler::shutdown()`] (or drop) cancels everything
///
/// Must be created inside a tokio runtime.
pub struct PollScheduler {
    device: Arc<Device>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollScheduler {
    /// Bind the accessory and start polling
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields poll events
    pub fn spawn(
        settings: DeviceSettings,
        collaborators: Collaborators,
    ) -> Result<(Self, mpsc::Receiver<PollEvent>)> {
        let log = DeviceLogger::new(
            collaborators.log_sink,
            settings.accessory_name.clone(),
            settings.logging,
        );
        let projector = SensorProjector::bind(
            collaborators.accessory,
            settings.identity.display_name(),
            log.clone(),
        )?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let device = Arc::new(Device {
            identity: settings.identity,
            client: collaborators.client,
            ip_source: collaborators.ip_source,
            projector,
            log,
            in_progress: AtomicBool::new(false),
            suspended: AtomicBool::new(false),
            event_tx: tx,
        });

        let refresh_rate = settings.poll.refresh_rate();
        device.emit_event(PollEvent::Started {
            device: settings.accessory_name,
            refresh_rate,
        });

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(Arc::clone(&device), refresh_rate, cancel.clone()));

        Ok((
            Self {
                device,
                cancel,
                task: Some(task),
            },
            rx,
        ))
    }

    /// Current scheduler mode
    pub fn mode(&self) -> SchedulerMode {
        if self.device.is_suspended() {
            SchedulerMode::Suspended
        } else {
            SchedulerMode::Active
        }
    }

    /// Current sensor state
    pub fn sensor_state(&self) -> SensorState {
        self.device.projector.state()
    }

    /// Device name used as log context
    pub fn device_name(&self) -> &str {
        self.device.log.device()
    }

    /// Whether the timer task is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel polling and wait for the timer task to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            self.device
                .log
                .error(&format!("Poll task ended abnormally: {e}"));
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Timer loop: owns the interval and the in-flight cycle tasks
async fn run(device: Arc<Device>, refresh_rate: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval(refresh_rate);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycles = JoinSet::new();

    let reason = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break "teardown",

            Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                if let Err(e) = joined
                    && e.is_panic()
                {
                    device.log.error(&format!("Poll cycle panicked: {e}"));
                }
                if device.is_suspended() && cycles.is_empty() {
                    break "suspended";
                }
            }

            _ = ticker.tick(), if !device.is_suspended() => {
                if device.is_suspended() || cancel.is_cancelled() {
                    continue;
                }

                match PollGuard::try_acquire(&device) {
                    Some(guard) => {
                        cycles.spawn(poll_task(Arc::clone(&device), guard, cancel.child_token()));
                    }
                    None => {
                        device.log.debug("Update in progress, skipping tick");
                        device.emit_event(PollEvent::CycleSkipped);
                    }
                }
            }
        }
    };

    cycles.shutdown().await;
    device.emit_event(PollEvent::Stopped {
        reason: reason.to_string(),
    });
}

/// One poll cycle plus, after a fatal response, the guarded suspension wait
async fn poll_task(device: Arc<Device>, guard: PollGuard, cancel: CancellationToken) {
    let fatal = tokio::select! {
        _ = cancel.cancelled() => return,
        fatal = device.poll_cycle() => fatal,
    };

    let Some(code) = fatal else {
        return;
    };

    // Suspend before releasing the lock so no tick slips in between
    device.suspend(code);
    drop(guard);

    if time::timeout(SUSPEND_GRACE, cancel.cancelled()).await.is_err() {
        device.log.error(&Error::suspended(code).to_string());
    }
}
