// # Accessory Binding Trait
//
// Narrow capability onto the home-automation framework that owns the
// contact sensor service. The core never sees framework types; it only
// binds a binary-state characteristic and writes values to it.

use std::fmt;

use crate::sensor::SensorState;

/// A value written to the contact characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacteristicValue {
    /// Normal sensor state
    State(SensorState),
    /// Degraded marker carrying the error text of a failed poll cycle
    Degraded(String),
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(state) => write!(f, "{state}"),
            Self::Degraded(error) => write!(f, "degraded ({error})"),
        }
    }
}

/// Trait for accessory framework bindings
///
/// # Thread Safety
///
/// Implementations must be thread-safe; writes arrive from the device's poll
/// cycle task.
pub trait AccessoryBinding: Send + Sync {
    /// Look up the binary-state service, creating it if needed
    ///
    /// `display_name` is the first label of the configured hostname.
    fn get_or_create_binary_state(&self, display_name: &str) -> Result<(), crate::Error>;

    /// Write a normal sensor state
    fn write_state(&self, state: SensorState);

    /// Write a degraded marker after a failed poll cycle
    fn write_degraded(&self, error: &crate::Error);
}
