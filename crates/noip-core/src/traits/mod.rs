//! Core traits for the update client
//!
//! This module defines the abstract interfaces the core depends on.
//!
//! - [`UpdateClient`]: Issue the authenticated update request
//! - [`IpSource`]: Supply the current public IPv4 address
//! - [`AccessoryBinding`]: Write sensor values to the accessory framework

pub mod update_client;
pub mod ip_source;
pub mod accessory;

pub use update_client::{UpdateClient, RawResponse};
pub use ip_source::{IpSource, StaticIpSource};
pub use accessory::{AccessoryBinding, CharacteristicValue};
