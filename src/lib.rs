//! Uconnect to Home Assistant MQTT bridge.
//!
//! Periodically pulls vehicle data from the Uconnect telematics service,
//! announces it to Home Assistant through MQTT discovery and exposes remote
//! commands as buttons.

pub mod bridge;
pub mod config;
pub mod error;
pub mod home;
pub mod mqtt;
pub mod telematics;
pub mod vehicle;

#[cfg(test)]
mod testing;
