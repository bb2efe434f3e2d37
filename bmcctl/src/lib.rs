//! BMC client library.
//!
//! Reads PMBus power supply telemetry through a BMC's I2C master interface
//! and selects the next boot device through the system boot options.

pub mod client;
pub mod config;
pub mod error;
pub mod mgmt_protocol;
pub mod peripheral;
pub mod tracing;
pub mod transport;

pub use client::Client;
pub use error::{Error, Result};
