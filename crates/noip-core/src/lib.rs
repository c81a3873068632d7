// # noip-core
//
// Core library for the No-IP contact sensor update client.
//
// ## Architecture Overview
//
// Each configured hostname becomes one device. A device reports the host's
// public IPv4 address to No-IP on a fixed interval and exposes "is the record
// in sync" as a binary contact sensor:
//
// - **UpdateClient**: Trait for the single authenticated `/nic/update` request
// - **IpSource**: Trait supplying the current public IPv4 address
// - **AccessoryBinding**: Narrow capability onto the accessory framework
// - **LogSink**: Injected structured logger (level, device, message)
// - **response**: Interprets the plaintext status vocabulary
// - **SensorProjector**: Pushes the sensor state (or a degraded marker) out
// - **PollScheduler**: Self-scheduling poll loop with lock and suspend policy
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Transport, interpretation and projection are independent
// 2. **One Request In Flight**: Overlapping ticks are dropped, never queued
// 3. **Fatal Means Stop**: Fatal provider responses suspend polling for good
// 4. **Library-First**: The daemon is a thin wiring layer over this crate

pub mod traits;
pub mod response;
pub mod sensor;
pub mod scheduler;
pub mod logging;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{AccessoryBinding, IpSource, UpdateClient};
pub use response::{interpret, Directive, Interpretation, StatusCode, UpdateResponse};
pub use sensor::{MemoryAccessory, SensorProjector, SensorState};
pub use scheduler::{Collaborators, PollEvent, PollScheduler, SchedulerMode};
pub use logging::{DeviceLogger, LogMode, LogSink, TracingSink};
pub use config::{DeviceConfig, DeviceIdentity, PlatformConfig, PlatformOptions, PollConfig};
pub use error::{Error, Result};
