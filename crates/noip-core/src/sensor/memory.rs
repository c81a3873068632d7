// # Memory Accessory
//
// In-memory implementation of AccessoryBinding.
//
// ## Purpose
//
// Stands in for the accessory framework: keeps the bound display name, the
// history of characteristic writes, and a watch channel with the latest
// value. The daemon logs from the watch stream; tests inspect the history.

use chrono::{DateTime, Utc};
use std::pin::Pin;
use std::sync::Mutex;
use tokio::sync::watch;
use tokio_stream::Stream;
use tokio_stream::wrappers::WatchStream;

use crate::sensor::SensorState;
use crate::traits::{AccessoryBinding, CharacteristicValue};

/// One recorded characteristic write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicWrite {
    /// Value written
    pub value: CharacteristicValue,
    /// When it was written
    pub written_at: DateTime<Utc>,
}

/// In-memory accessory binding
///
/// # Example
///
/// ```rust
/// use noip_core::sensor::{MemoryAccessory, SensorState};
/// use noip_core::traits::{AccessoryBinding, CharacteristicValue};
///
/// let accessory = MemoryAccessory::new();
/// accessory.get_or_create_binary_state("home").unwrap();
/// accessory.write_state(SensorState::InSync);
///
/// assert_eq!(accessory.current(), CharacteristicValue::State(SensorState::InSync));
/// ```
#[derive(Debug)]
pub struct MemoryAccessory {
    display_name: Mutex<Option<String>>,
    writes: Mutex<Vec<CharacteristicWrite>>,
    latest: watch::Sender<CharacteristicValue>,
}

impl MemoryAccessory {
    /// Create an unbound accessory
    pub fn new() -> Self {
        let (latest, _) = watch::channel(CharacteristicValue::State(SensorState::default()));
        Self {
            display_name: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
            latest,
        }
    }

    /// Name the binary-state service was bound with
    pub fn display_name(&self) -> Option<String> {
        self.display_name
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Latest characteristic value
    pub fn current(&self) -> CharacteristicValue {
        self.latest.borrow().clone()
    }

    /// All writes so far, oldest first
    pub fn writes(&self) -> Vec<CharacteristicWrite> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of degraded writes so far
    pub fn degraded_count(&self) -> usize {
        self.writes()
            .iter()
            .filter(|w| matches!(w.value, CharacteristicValue::Degraded(_)))
            .count()
    }

    /// Stream of characteristic values, starting with the current one
    pub fn watch(&self) -> Pin<Box<dyn Stream<Item = CharacteristicValue> + Send + 'static>> {
        Box::pin(WatchStream::new(self.latest.subscribe()))
    }

    fn record(&self, value: CharacteristicValue) {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CharacteristicWrite {
                value: value.clone(),
                written_at: Utc::now(),
            });
        self.latest.send_replace(value);
    }
}

impl Default for MemoryAccessory {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessoryBinding for MemoryAccessory {
    fn get_or_create_binary_state(&self, display_name: &str) -> Result<(), crate::Error> {
        let mut bound = self.display_name.lock().unwrap_or_else(|e| e.into_inner());
        match bound.as_deref() {
            Some(existing) if existing != display_name => Err(crate::Error::accessory(format!(
                "service already bound as '{existing}'"
            ))),
            _ => {
                *bound = Some(display_name.to_string());
                Ok(())
            }
        }
    }

    fn write_state(&self, state: SensorState) {
        self.record(CharacteristicValue::State(state));
    }

    fn write_degraded(&self, error: &crate::Error) {
        self.record(CharacteristicValue::Degraded(error.to_string()));
    }
}
