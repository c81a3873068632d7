//! Sensor state and projection onto the accessory framework

pub mod memory;

pub use memory::{CharacteristicWrite, MemoryAccessory};

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::logging::DeviceLogger;
use crate::traits::AccessoryBinding;

/// Binary "is the record in sync" state
///
/// Exposed as a contact sensor: in sync reads as contact detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SensorState {
    InSync,
    #[default]
    OutOfSync,
}

impl SensorState {
    /// HAP `ContactSensorState` value (0 = detected, 1 = not detected)
    pub fn contact_value(self) -> u8 {
        match self {
            Self::InSync => 0,
            Self::OutOfSync => 1,
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InSync => f.write_str("CONTACT_DETECTED"),
            Self::OutOfSync => f.write_str("CONTACT_NOT_DETECTED"),
        }
    }
}

/// Holds the device's sensor state and pushes it to the accessory
pub struct SensorProjector {
    accessory: Arc<dyn AccessoryBinding>,
    state: Mutex<SensorState>,
    log: DeviceLogger,
}

impl SensorProjector {
    /// Bind the binary-state service and project the default state
    pub fn bind(
        accessory: Arc<dyn AccessoryBinding>,
        display_name: &str,
        log: DeviceLogger,
    ) -> Result<Self, crate::Error> {
        log.debug("Configure Contact Sensor Service");
        accessory.get_or_create_binary_state(display_name)?;

        let projector = Self {
            accessory,
            state: Mutex::new(SensorState::default()),
            log,
        };
        projector.project(Some(projector.state()));
        Ok(projector)
    }

    /// Current sensor state
    pub fn state(&self) -> SensorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a new state and write it out
    pub fn update(&self, state: SensorState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        self.log.debug(&format!("ContactSensorState: {state}"));
        self.project(Some(state));
    }

    /// Write a state to the characteristic if it is defined
    pub fn project(&self, state: Option<SensorState>) {
        match state {
            Some(state) => {
                self.accessory.write_state(state);
                self.log
                    .debug(&format!("updateCharacteristic ContactSensorState: {state}"));
            }
            None => self.log.debug("ContactSensorState: undefined, not written"),
        }
    }

    /// Surface a failed poll cycle as a degraded value
    pub fn project_failure(&self, error: &crate::Error) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = SensorState::OutOfSync;
        self.log
            .error(&format!("failed to update status, Error Message: {error}"));
        self.log.debug(&format!(
            "Contact Sensor: {}, Error: {error:?}",
            self.log.device()
        ));
        self.accessory.write_degraded(error);
    }
}
