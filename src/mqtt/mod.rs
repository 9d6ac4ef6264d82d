//! MQTT output for Home Assistant discovery.
//!
//! This module announces vehicle entities through the Home Assistant MQTT
//! discovery convention, publishes their states, and routes button presses
//! coming back from Home Assistant to the owning entity.

mod client;
pub mod entity;

pub use client::{Broker, MqttClient, MqttPublisher};
pub use entity::{Button, ButtonAction, DeviceTracker, Entity, HaDevice, Sensor};
