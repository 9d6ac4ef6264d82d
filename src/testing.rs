//! In-memory collaborators for unit tests.

use crate::error::{BridgeError, Result};
use crate::home::{Coordinate, HomeAutomation, UnitSystem, Zone};
use crate::mqtt::{Broker, Entity, HaDevice};
use crate::telematics::{Command, TelematicsClient};
use crate::vehicle::{Attributes, Location, Vehicle};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub fn test_device(vin: &str) -> HaDevice {
    HaDevice {
        name: "Car".into(),
        identifier: vin.into(),
        manufacturer: "FIAT".into(),
        model: "500e".into(),
        sw_version: "1.0".into(),
    }
}

pub fn test_vehicle(vin: &str, attributes: &[(&str, &str)]) -> Vehicle {
    Vehicle {
        vin: vin.into(),
        nickname: Some(format!("Car {vin}")),
        make: "FIAT".into(),
        model_description: "500e".into(),
        location: Location {
            latitude: 45.0703,
            longitude: 7.6869,
            timestamp_ms: 1_700_000_000_000,
        },
        attributes: attributes.iter().copied().collect::<Attributes>(),
    }
}

pub struct ScriptedTelematics {
    vehicles: Vec<Vehicle>,
    fail_login: AtomicBool,
    fail_fetch: AtomicBool,
    reject_commands: bool,
    logins: AtomicUsize,
    fetches: AtomicUsize,
    sent: Mutex<Vec<(String, Command, String)>>,
    last_command_at: Mutex<Option<Instant>>,
}

impl ScriptedTelematics {
    pub fn new(vehicles: Vec<Vehicle>) -> Self {
        Self {
            vehicles,
            fail_login: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            reject_commands: false,
            logins: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            last_command_at: Mutex::new(None),
        }
    }

    pub fn rejecting_commands(mut self) -> Self {
        self.reject_commands = true;
        self
    }

    pub fn set_fail_login(&self, fail: bool) {
        self.fail_login.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn sent_commands(&self) -> Vec<(String, Command, String)> {
        self.sent.lock().clone()
    }

    pub fn last_command_at(&self) -> Option<Instant> {
        *self.last_command_at.lock()
    }
}

#[async_trait]
impl TelematicsClient for ScriptedTelematics {
    async fn login_and_keep_alive(&self) -> Result<()> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(BridgeError::Auth("invalid credentials".into()));
        }
        Ok(())
    }

    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(BridgeError::Api {
                status: Some(503),
                body: Some("Service Unavailable".into()),
            });
        }
        Ok(self.vehicles.clone())
    }

    async fn send_command(&self, vin: &str, command: Command, pin: &str) -> Result<()> {
        self.sent
            .lock()
            .push((vin.to_string(), command, pin.to_string()));
        *self.last_command_at.lock() = Some(Instant::now());
        if self.reject_commands {
            return Err(BridgeError::Api {
                status: Some(403),
                body: None,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    AnnounceStarted(String),
    Announced(String),
    Published(String),
}

/// Records every call; announces take `announce_delay` to complete.
#[derive(Default)]
pub struct RecordingBroker {
    events: Mutex<Vec<(Instant, BrokerEvent)>>,
    configs: Mutex<HashMap<String, Value>>,
    states: Mutex<HashMap<String, String>>,
    announce_delay: Duration,
    failing_names: Vec<String>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_announce_delay(mut self, delay: Duration) -> Self {
        self.announce_delay = delay;
        self
    }

    /// Announces of entities with this name fail.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing_names.push(name.to_string());
        self
    }

    /// Cancel `token` when the entity with `unique_id` starts announcing.
    pub fn cancelling_on(mut self, unique_id: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((unique_id.to_string(), token));
        self
    }

    pub fn events(&self) -> Vec<BrokerEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Events with the (tokio) time they were recorded.
    pub fn timed_events(&self) -> Vec<(Instant, BrokerEvent)> {
        self.events.lock().clone()
    }

    fn record(&self, event: BrokerEvent) {
        self.events.lock().push((Instant::now(), event));
    }

    /// Last discovery payload announced for `unique_id`.
    pub fn config(&self, unique_id: &str) -> Option<Value> {
        self.configs.lock().get(unique_id).cloned()
    }

    /// Last state payload published for `unique_id`.
    pub fn state(&self, unique_id: &str) -> Option<String> {
        self.states.lock().get(unique_id).cloned()
    }

    pub fn announced(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BrokerEvent::Announced(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn published(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BrokerEvent::Published(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn announce(&self, entity: &Entity) -> Result<()> {
        let id = entity.unique_id();
        self.record(BrokerEvent::AnnounceStarted(id.clone()));
        if let Some((target, token)) = &self.cancel_on
            && *target == id
        {
            token.cancel();
        }
        if !self.announce_delay.is_zero() {
            tokio::time::sleep(self.announce_delay).await;
        }
        if self.failing_names.iter().any(|n| n == entity.name()) {
            return Err(BridgeError::Mqtt("announce rejected".into()));
        }
        self.configs
            .lock()
            .insert(id.clone(), entity.discovery_payload());
        self.record(BrokerEvent::Announced(id));
        Ok(())
    }

    async fn publish_state(&self, entity: &Entity) -> Result<()> {
        if let Some((_, payload)) = entity.state_messages().pop() {
            self.states.lock().insert(entity.unique_id(), payload);
        }
        self.record(BrokerEvent::Published(entity.unique_id()));
        Ok(())
    }
}

pub struct StaticHome {
    zones: Vec<Zone>,
    length_unit: String,
}

impl StaticHome {
    pub fn new(zones: Vec<Zone>, length_unit: &str) -> Self {
        Self {
            zones,
            length_unit: length_unit.to_string(),
        }
    }
}

#[async_trait]
impl HomeAutomation for StaticHome {
    async fn zones_ascending(&self, coordinate: Coordinate) -> Result<Vec<Zone>> {
        Ok(crate::home::zones_ascending(self.zones.clone(), &coordinate))
    }

    async fn unit_system(&self) -> Result<UnitSystem> {
        Ok(UnitSystem {
            length: self.length_unit.clone(),
        })
    }
}
