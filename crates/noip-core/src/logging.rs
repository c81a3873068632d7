//! Device-scoped logging
//!
//! The core never logs through a global directly. Each device gets a
//! [`DeviceLogger`] that applies the device's [`LogMode`] and forwards
//! `(level, device, message)` to an injected [`LogSink`]. [`TracingSink`]
//! is the production sink; tests install a recording one.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Level;

/// Per-device logging mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogMode {
    /// Info and above
    #[default]
    Standard,
    /// Also debug messages, at debug level
    Debug,
    /// Also debug messages, promoted to info with a `[DEBUG]` prefix
    DebugMode,
    /// Nothing at all
    None,
}

impl LogMode {
    fn includes_debug(self) -> bool {
        matches!(self, Self::Debug | Self::DebugMode)
    }
}

impl std::str::FromStr for LogMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "debug" => Ok(Self::Debug),
            "debugMode" => Ok(Self::DebugMode),
            "none" => Ok(Self::None),
            other => Err(crate::Error::config(format!(
                "Unknown logging mode '{other}'. Valid modes: standard, debug, debugMode, none"
            ))),
        }
    }
}

/// Structured logger capability
pub trait LogSink: Send + Sync {
    /// Emit one message for `device` at `level`
    fn log(&self, level: Level, device: &str, message: &str);
}

/// Sink that forwards to `tracing` with a `device` field
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, device: &str, message: &str) {
        // tracing needs the level as a constant at each callsite
        match level {
            Level::ERROR => tracing::error!(device, "{}", message),
            Level::WARN => tracing::warn!(device, "{}", message),
            Level::INFO => tracing::info!(device, "{}", message),
            Level::DEBUG => tracing::debug!(device, "{}", message),
            _ => tracing::trace!(device, "{}", message),
        }
    }
}

/// Logger bound to one device and its logging mode
#[derive(Clone)]
pub struct DeviceLogger {
    sink: Arc<dyn LogSink>,
    device: String,
    mode: LogMode,
}

impl std::fmt::Debug for DeviceLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLogger")
            .field("device", &self.device)
            .field("mode", &self.mode)
            .finish()
    }
}

impl DeviceLogger {
    pub fn new(sink: Arc<dyn LogSink>, device: impl Into<String>, mode: LogMode) -> Self {
        Self {
            sink,
            device: device.into(),
            mode,
        }
    }

    /// Device context attached to every message
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Log at an interpreter-chosen level
    pub fn log(&self, level: Level, message: &str) {
        if level == Level::DEBUG || level == Level::TRACE {
            self.debug(message);
        } else if self.mode != LogMode::None {
            self.sink.log(level, &self.device, message);
        }
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn debug(&self, message: &str) {
        match self.mode {
            LogMode::Debug => self.sink.log(Level::DEBUG, &self.device, message),
            LogMode::DebugMode => {
                self.sink
                    .log(Level::INFO, &self.device, &format!("[DEBUG] {message}"))
            }
            LogMode::Standard | LogMode::None => {}
        }
    }

    /// Warn, but only when the device is in a debug mode
    pub fn debug_warn(&self, message: &str) {
        if self.mode.includes_debug() {
            self.sink.log(Level::WARN, &self.device, message);
        }
    }
}
