//! Home Assistant MQTT discovery entities.
//!
//! Every entity belongs to an [`HaDevice`] (one per vehicle) and knows its
//! discovery config topic, its state topic(s) and, for buttons, the command
//! topic Home Assistant publishes presses to.

use crate::bridge::transform::SensorDescriptor;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;

/// Prefix Home Assistant watches for discovery configs.
pub const DISCOVERY_PREFIX: &str = "homeassistant";

/// Prefix for all state and command topics owned by the bridge.
pub const TOPIC_PREFIX: &str = "FCAUconnect";

/// Payload Home Assistant sends when a button is pressed.
pub const PAYLOAD_PRESS: &str = "PRESS";

/// State value for a tracker outside every known zone.
pub const NOT_HOME: &str = "not_home";

/// Device grouping all entities of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HaDevice {
    pub name: String,
    pub identifier: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

impl HaDevice {
    fn discovery_json(&self) -> Value {
        json!({
            "identifiers": [self.identifier],
            "name": self.name,
            "manufacturer": self.manufacturer,
            "model": self.model,
            "sw_version": self.sw_version,
        })
    }

    fn topic_id(&self) -> String {
        sanitize(&self.identifier)
    }
}

/// Sensor entity: a transformed attribute bound to its vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub device: Arc<HaDevice>,
    pub descriptor: SensorDescriptor,
}

impl Sensor {
    pub fn new(device: Arc<HaDevice>, descriptor: SensorDescriptor) -> Self {
        Self { device, descriptor }
    }
}

/// GPS tracker whose state is the nearest zone name or `not_home`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTracker {
    pub device: Arc<HaDevice>,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub state: String,
}

pub type ButtonAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Interactive entity: a named command surface with a zero-argument action.
#[derive(Clone)]
pub struct Button {
    pub device: Arc<HaDevice>,
    pub name: String,
    action: ButtonAction,
}

impl Button {
    pub fn new(device: Arc<HaDevice>, name: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            device,
            name: name.into(),
            action,
        }
    }

    /// Run the button's action to completion.
    pub async fn press(&self) {
        (self.action)().await;
    }
}

impl fmt::Debug for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Button")
            .field("device", &self.device.identifier)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Entity {
    Sensor(Sensor),
    Tracker(DeviceTracker),
    Button(Button),
}

impl Entity {
    pub fn name(&self) -> &str {
        match self {
            Entity::Sensor(s) => &s.descriptor.name,
            Entity::Tracker(t) => &t.name,
            Entity::Button(b) => &b.name,
        }
    }

    pub fn device(&self) -> &HaDevice {
        match self {
            Entity::Sensor(s) => &s.device,
            Entity::Tracker(t) => &t.device,
            Entity::Button(b) => &b.device,
        }
    }

    /// Home Assistant platform the entity is registered under.
    pub fn component(&self) -> &'static str {
        match self {
            Entity::Sensor(_) => "sensor",
            Entity::Tracker(_) => "device_tracker",
            Entity::Button(_) => "button",
        }
    }

    pub fn object_id(&self) -> String {
        sanitize(self.name())
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.device().topic_id(), self.object_id())
    }

    fn base_topic(&self) -> String {
        format!(
            "{}/{}/{}",
            TOPIC_PREFIX,
            self.device().topic_id(),
            self.object_id()
        )
    }

    pub fn config_topic(&self) -> String {
        format!(
            "{}/{}/{}/{}/config",
            DISCOVERY_PREFIX,
            self.component(),
            self.device().topic_id(),
            self.object_id()
        )
    }

    pub fn state_topic(&self) -> String {
        format!("{}/state", self.base_topic())
    }

    pub fn attributes_topic(&self) -> String {
        format!("{}/attributes", self.base_topic())
    }

    /// Topic Home Assistant publishes presses to; buttons only.
    pub fn command_topic(&self) -> Option<String> {
        match self {
            Entity::Button(_) => Some(format!("{}/set", self.base_topic())),
            _ => None,
        }
    }

    pub fn discovery_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("name".into(), json!(self.name()));
        payload.insert("unique_id".into(), json!(self.unique_id()));
        payload.insert("object_id".into(), json!(self.unique_id()));
        payload.insert("device".into(), self.device().discovery_json());

        match self {
            Entity::Sensor(sensor) => {
                payload.insert("state_topic".into(), json!(self.state_topic()));
                if let Some(unit) = &sensor.descriptor.unit
                    && !unit.is_empty()
                {
                    payload.insert("unit_of_measurement".into(), json!(unit));
                }
                if let Some(class) = &sensor.descriptor.device_class {
                    payload.insert("device_class".into(), json!(class));
                }
            }
            Entity::Tracker(_) => {
                payload.insert("state_topic".into(), json!(self.state_topic()));
                payload.insert(
                    "json_attributes_topic".into(),
                    json!(self.attributes_topic()),
                );
                payload.insert("source_type".into(), json!("gps"));
            }
            Entity::Button(_) => {
                payload.insert("command_topic".into(), json!(self.command_topic()));
                payload.insert("payload_press".into(), json!(PAYLOAD_PRESS));
            }
        }

        Value::Object(payload)
    }

    /// Messages that carry the entity's current state, in publish order.
    pub fn state_messages(&self) -> Vec<(String, String)> {
        match self {
            Entity::Sensor(sensor) => vec![(self.state_topic(), sensor.descriptor.value.clone())],
            Entity::Tracker(tracker) => {
                let attributes = json!({
                    "latitude": tracker.latitude,
                    "longitude": tracker.longitude,
                    "gps_accuracy": 2,
                });
                vec![
                    (self.attributes_topic(), attributes.to_string()),
                    (self.state_topic(), tracker.state.clone()),
                ]
            }
            Entity::Button(_) => Vec::new(),
        }
    }
}

/// Restrict a name to the characters allowed in topic levels and object ids.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
