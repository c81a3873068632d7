//! Error types for the No-IP update client
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::response::StatusCode;

/// Result type alias for update client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the update client
#[derive(Error, Debug)]
pub enum Error {
    /// Request failure, timeout, or unreadable response body
    #[error("Transport error: {0}")]
    Transport(String),

    /// Polling halted after a fatal provider response
    #[error("Polling suspended after '{code}': {message}")]
    Suspended {
        /// The fatal status token that caused the suspension
        code: StatusCode,
        /// Remediation guidance for the operator
        message: String,
    },

    /// Public IP lookup errors
    #[error("IP source error: {0}")]
    IpSource(String),

    /// Accessory framework errors
    #[error("Accessory error: {0}")]
    Accessory(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create the terminal error for a suspended scheduler
    pub fn suspended(code: StatusCode) -> Self {
        Self::Suspended {
            code,
            message: code.explanation().to_string(),
        }
    }

    /// Create an IP source error
    pub fn ip_source(msg: impl Into<String>) -> Self {
        Self::IpSource(msg.into())
    }

    /// Create an accessory error
    pub fn accessory(msg: impl Into<String>) -> Self {
        Self::Accessory(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error only affects the current poll cycle
    pub fn is_cycle_local(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::IpSource(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
