//! Configuration types for the update client
//!
//! The JSON layout mirrors the platform block an accessory framework hands to
//! the plugin:
//!
//! ```json
//! {
//!   "name": "NoIP",
//!   "devices": [
//!     { "hostname": "home.ddns.net", "username": "me", "password": "secret",
//!       "firmware": "3.0.0", "refreshRate": 1800, "logging": "standard" }
//!   ],
//!   "options": { "refreshRate": 3600 }
//! }
//! ```
//!
//! Per-device values take precedence over `options`, which take precedence
//! over the built-in defaults.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::logging::LogMode;

/// Refresh interval applied when none (or an invalid one) is configured
pub const DEFAULT_REFRESH_RATE_SECS: u64 = 1800;

/// Platform configuration block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Platform display name
    #[serde(default)]
    pub name: Option<String>,

    /// Devices (one per hostname)
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    /// Defaults shared by all devices
    #[serde(default)]
    pub options: Option<PlatformOptions>,
}

impl PlatformConfig {
    /// Parse a platform configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a platform configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Resolve every device against the platform options
    ///
    /// Fails on the first invalid device.
    pub fn resolve_devices(&self) -> Result<Vec<DeviceSettings>, crate::Error> {
        if self.devices.is_empty() {
            return Err(crate::Error::config("No devices configured"));
        }

        self.devices
            .iter()
            .map(|device| device.resolve(self.options.as_ref()))
            .collect()
    }
}

/// Defaults shared by all devices
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformOptions {
    /// Default refresh interval in seconds
    #[serde(default, deserialize_with = "positive_secs")]
    pub refresh_rate: Option<u64>,

    /// Default logging mode
    #[serde(default, deserialize_with = "known_log_mode")]
    pub logging: Option<LogMode>,
}

/// One configured device
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Accessory name override (defaults to the hostname)
    #[serde(default)]
    pub config_device_name: Option<String>,

    /// Hostname to keep updated
    pub hostname: String,

    /// Account username
    #[serde(default)]
    pub username: Option<String>,

    /// Account password
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub password: Option<String>,

    /// Client version sent in the User-Agent
    #[serde(default = "default_firmware")]
    pub firmware: String,

    /// Refresh interval in seconds
    #[serde(default, deserialize_with = "positive_secs")]
    pub refresh_rate: Option<u64>,

    /// Logging mode for this device
    #[serde(default, deserialize_with = "known_log_mode")]
    pub logging: Option<LogMode>,
}

// Custom Debug implementation that hides the password
impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("config_device_name", &self.config_device_name)
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("firmware", &self.firmware)
            .field("refresh_rate", &self.refresh_rate)
            .field("logging", &self.logging)
            .finish()
    }
}

impl DeviceConfig {
    /// Create a device configuration with the required fields
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            config_device_name: None,
            hostname: hostname.into(),
            username: Some(username.into()),
            password: Some(password.into()),
            firmware: default_firmware(),
            refresh_rate: None,
            logging: None,
        }
    }

    /// Set the refresh interval in seconds
    pub fn with_refresh_rate(mut self, secs: u64) -> Self {
        self.refresh_rate = Some(secs);
        self
    }

    /// Set the logging mode
    pub fn with_logging(mut self, logging: LogMode) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Set the firmware string
    pub fn with_firmware(mut self, firmware: impl Into<String>) -> Self {
        self.firmware = firmware.into();
        self
    }

    /// Validate and resolve this device against optional platform defaults
    pub fn resolve(&self, options: Option<&PlatformOptions>) -> Result<DeviceSettings, crate::Error> {
        validate_hostname(&self.hostname)?;

        let username = self
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| crate::Error::config(format!("Missing username for {}", self.hostname)))?;
        let password = self
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| crate::Error::config(format!("Missing password for {}", self.hostname)))?;

        let refresh_rate = self
            .refresh_rate
            .or_else(|| options.and_then(|o| o.refresh_rate));
        let logging = self
            .logging
            .or_else(|| options.and_then(|o| o.logging))
            .unwrap_or_default();

        let firmware = if self.firmware.trim().is_empty() {
            default_firmware()
        } else {
            self.firmware.clone()
        };

        Ok(DeviceSettings {
            accessory_name: self
                .config_device_name
                .clone()
                .unwrap_or_else(|| self.hostname.clone()),
            identity: DeviceIdentity {
                hostname: self.hostname.clone(),
                username: username.to_string(),
                password: password.to_string(),
                firmware,
            },
            poll: PollConfig::from_secs(refresh_rate),
            logging,
        })
    }
}

/// Fully resolved settings for one device
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    /// Name of the accessory in the framework
    pub accessory_name: String,
    /// Credentials and client identification
    pub identity: DeviceIdentity,
    /// Polling settings
    pub poll: PollConfig,
    /// Logging mode
    pub logging: LogMode,
}

/// Credentials and client identification for one hostname
///
/// Immutable for the lifetime of a scheduler.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub hostname: String,
    pub username: String,
    /// ⚠️ NEVER log this value
    pub password: String,
    pub firmware: String,
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("firmware", &self.firmware)
            .finish()
    }
}

impl DeviceIdentity {
    /// Name shown on the sensor: the first label of the hostname
    pub fn display_name(&self) -> &str {
        self.hostname.split('.').next().unwrap_or(&self.hostname)
    }
}

/// Polling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    refresh_rate: Duration,
}

impl PollConfig {
    /// Build from an optional interval in seconds; unset or zero uses the default
    pub fn from_secs(secs: Option<u64>) -> Self {
        let secs = secs
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_REFRESH_RATE_SECS);
        Self {
            refresh_rate: Duration::from_secs(secs),
        }
    }

    /// Interval between poll cycles
    pub fn refresh_rate(&self) -> Duration {
        self.refresh_rate
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from_secs(None)
    }
}

fn default_firmware() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Accept only positive whole seconds; anything else counts as unset
fn positive_secs<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_u64()).filter(|secs| *secs > 0))
}

/// Accept only known logging modes; anything else counts as unset
fn known_log_mode<'de, D>(deserializer: D) -> Result<Option<LogMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|mode| mode.parse().ok()))
}

/// Basic RFC 1035 hostname validation
fn validate_hostname(hostname: &str) -> Result<(), crate::Error> {
    if hostname.is_empty() {
        return Err(crate::Error::config("Hostname cannot be empty"));
    }

    if hostname.len() > 253 {
        return Err(crate::Error::config(format!(
            "Hostname too long: {} chars (max 253)",
            hostname.len()
        )));
    }

    for label in hostname.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Hostname has empty label: '{hostname}'"
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Hostname label too long: '{label}'"
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            || label.starts_with('-')
            || label.ends_with('-')
        {
            return Err(crate::Error::config(format!(
                "Hostname label contains invalid characters: '{label}'"
            )));
        }
    }

    Ok(())
}
