//! One synchronization pass over every vehicle on the account.

use super::buttons::create_interactive_entities;
use super::transform::{self, SensorDescriptor};
use super::{CommandDispatcher, EntityCache, ForceRefresh, Timings};
use crate::error::{BridgeError, Result};
use crate::home::{Coordinate, HomeAutomation};
use crate::mqtt::entity::NOT_HOME;
use crate::mqtt::{Broker, DeviceTracker, Entity, HaDevice, Sensor};
use crate::telematics::{Command, TelematicsClient};
use crate::vehicle::Vehicle;
use chrono::{DateTime, Local};
use futures_util::{StreamExt, stream};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Upper bound on concurrent announce/publish calls per vehicle.
const MAX_FANOUT: usize = 16;

pub const TRACKER_NAME: &str = "Vehicle_GPS_Location";
pub const LAST_API_UPDATE: &str = "Last_API_Update";
pub const LAST_LOCATION_UPDATE: &str = "Last_Location_Update";

/// Per-cycle behaviour switches taken from the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOptions {
    pub auto_refresh_location: bool,
    pub auto_refresh_battery: bool,
    pub convert_km_to_miles: bool,
    pub enable_dangerous_commands: bool,
    /// Suffix device names and identifiers so a dev instance does not clash.
    pub dev_mode: bool,
}

pub struct SyncCycle {
    telematics: Arc<dyn TelematicsClient>,
    broker: Arc<dyn Broker>,
    home: Arc<dyn HomeAutomation>,
    dispatcher: Arc<CommandDispatcher>,
    refresh: Arc<ForceRefresh>,
    cache: EntityCache,
    options: CycleOptions,
    timings: Timings,
}

impl SyncCycle {
    pub fn new(
        telematics: Arc<dyn TelematicsClient>,
        broker: Arc<dyn Broker>,
        home: Arc<dyn HomeAutomation>,
        dispatcher: Arc<CommandDispatcher>,
        refresh: Arc<ForceRefresh>,
        options: CycleOptions,
        timings: Timings,
    ) -> Self {
        Self {
            telematics,
            broker,
            home,
            dispatcher,
            refresh,
            cache: EntityCache::new(),
            options,
            timings,
        }
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Authenticate, fetch and process every vehicle in fetch order.
    ///
    /// The first error aborts the rest of the cycle; vehicles already
    /// processed keep what they published. Cancellation is honoured between
    /// vehicles.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        self.telematics.login_and_keep_alive().await?;

        let vehicles = self.telematics.fetch_vehicles().await?;
        let fetched_at = Local::now();

        for vehicle in &vehicles {
            if cancel.is_cancelled() {
                info!("[Sync] Cancelled, skipping remaining vehicles");
                break;
            }
            info!("[Sync] FOUND CAR: {}", vehicle.vin);
            self.process_vehicle(vehicle, fetched_at).await?;
        }

        Ok(())
    }

    async fn process_vehicle(&self, vehicle: &Vehicle, fetched_at: DateTime<Local>) -> Result<()> {
        self.auto_refresh(&vehicle.vin).await;

        let device = Arc::new(self.device_for(vehicle));

        // Location tracker
        let coordinate = Coordinate::new(vehicle.location.latitude, vehicle.location.longitude);
        let zones = self.home.zones_ascending(coordinate).await?;
        debug!("[Sync] Zones: {:?}", zones);

        let tracker = Entity::Tracker(DeviceTracker {
            device: device.clone(),
            name: TRACKER_NAME.to_string(),
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            state: zones
                .first()
                .map(|zone| zone.friendly_name.clone())
                .unwrap_or_else(|| NOT_HOME.to_string()),
        });
        info!("[Sync] Car is at location: {:?}", tracker);
        self.broker.announce(&tracker).await?;
        self.broker.publish_state(&tracker).await?;

        // Attribute sensors
        let unit_system = self.home.unit_system().await?;
        info!("[Sync] Using unit system: {:?}", unit_system);
        let convert_km = transform::should_convert_km_to_miles(
            self.options.convert_km_to_miles,
            &unit_system.length,
        );
        info!("[Sync] Convert km -> miles ? {}", convert_km);

        let mut descriptors = transform::sensors_from_attributes(&vehicle.attributes, convert_km);
        transform::apply_overrides(&mut descriptors);

        let sensors: Vec<Entity> = descriptors
            .into_iter()
            .map(|descriptor| Entity::Sensor(Sensor::new(device.clone(), descriptor)))
            .collect();

        info!("[Sync] Pushing new sensors and values to Home Assistant");
        let announced = self.announce_all(sensors).await;

        debug!("[Sync] Waiting for Home Assistant to process all sensors");
        tokio::time::sleep(self.timings.discovery_settle).await;

        self.publish_all(announced).await;

        // Timestamps
        let last_api_update = timestamp_sensor(&device, LAST_API_UPDATE, fetched_at);
        self.announce_and_publish(&last_api_update).await?;

        match location_local_time(vehicle.location.timestamp_ms) {
            Some(local_time) => {
                debug!("[Sync] Location timestamp: {}", local_time);
                let last_location = timestamp_sensor(&device, LAST_LOCATION_UPDATE, local_time);
                self.announce_and_publish(&last_location).await?;
            }
            None => warn!(
                "[Sync] {} reported an invalid location timestamp: {}",
                vehicle.vin, vehicle.location.timestamp_ms
            ),
        }

        // Interactive entities
        let buttons = self.cache.get_or_create(&vehicle.vin, || {
            create_interactive_entities(
                device.clone(),
                &vehicle.vin,
                self.dispatcher.clone(),
                self.refresh.clone(),
                self.options.enable_dangerous_commands,
            )
        });
        for button in buttons.iter() {
            let entity = Entity::Button(button.clone());
            debug!("[Sync] Announce button: {}", entity.unique_id());
            self.broker.announce(&entity).await?;
        }

        Ok(())
    }

    /// Optional deep refresh / locate before reading data.
    ///
    /// Failures are logged and do not stop processing of the vehicle. Never
    /// raises the force-refresh signal.
    async fn auto_refresh(&self, vin: &str) {
        let mut commands = Vec::new();
        if self.options.auto_refresh_battery {
            commands.push(Command::DeepRefresh);
        }
        if self.options.auto_refresh_location {
            commands.push(Command::Locate);
        }
        if commands.is_empty() {
            return;
        }

        for command in commands {
            match self.dispatcher.try_send_command(command, vin).await {
                Ok(_) => {}
                Err(BridgeError::PinNotSet) => {
                    warn!("[Sync] Auto refresh ({}) needs a PIN, skipping", command)
                }
                Err(e) => warn!("[Sync] Auto refresh ({}) failed: {}", command, e),
            }
        }

        tokio::time::sleep(self.timings.vehicle_refresh_settle).await;
    }

    fn device_for(&self, vehicle: &Vehicle) -> HaDevice {
        let suffix = if self.options.dev_mode { "DEV" } else { "" };
        HaDevice {
            name: format!("{}{}", vehicle.display_name(), suffix),
            identifier: format!("{}{}", vehicle.vin, suffix),
            manufacturer: vehicle.make.clone(),
            model: vehicle.model_description.clone(),
            sw_version: "1.0".to_string(),
        }
    }

    /// Announce concurrently; returns the entities whose announce succeeded.
    async fn announce_all(&self, entities: Vec<Entity>) -> Vec<Entity> {
        let total = entities.len();
        let results: Vec<(Entity, Result<()>)> = stream::iter(entities)
            .map(|entity| {
                let broker = self.broker.clone();
                async move {
                    let result = broker.announce(&entity).await;
                    (entity, result)
                }
            })
            .buffer_unordered(MAX_FANOUT)
            .collect()
            .await;

        let mut announced = Vec::with_capacity(total);
        let mut failures = 0usize;
        for (entity, result) in results {
            match result {
                Ok(()) => announced.push(entity),
                Err(e) => {
                    failures += 1;
                    warn!("[Sync] Announce of {} failed: {}", entity.unique_id(), e);
                }
            }
        }
        if failures > 0 {
            warn!(
                "[Sync] {} of {} sensor announcements failed, their states are not published",
                failures, total
            );
        }
        announced
    }

    async fn publish_all(&self, entities: Vec<Entity>) {
        let failures: Vec<(String, BridgeError)> = stream::iter(entities)
            .map(|entity| {
                let broker = self.broker.clone();
                async move {
                    let result = broker.publish_state(&entity).await;
                    (entity.unique_id(), result)
                }
            })
            .buffer_unordered(MAX_FANOUT)
            .filter_map(|(id, result)| async move { result.err().map(|e| (id, e)) })
            .collect()
            .await;

        for (id, e) in &failures {
            warn!("[Sync] Publish of {} failed: {}", id, e);
        }
    }

    async fn announce_and_publish(&self, entity: &Entity) -> Result<()> {
        self.broker.announce(entity).await?;
        self.broker.publish_state(entity).await
    }
}

fn timestamp_sensor(device: &Arc<HaDevice>, name: &str, at: DateTime<Local>) -> Entity {
    Entity::Sensor(Sensor::new(
        device.clone(),
        SensorDescriptor {
            name: name.to_string(),
            value: at.to_rfc3339(),
            unit: None,
            device_class: Some("timestamp".to_string()),
        },
    ))
}

/// Epoch milliseconds (UTC) → local time.
fn location_local_time(timestamp_ms: i64) -> Option<DateTime<Local>> {
    DateTime::from_timestamp_millis(timestamp_ms).map(|utc| utc.with_timezone(&Local))
}
