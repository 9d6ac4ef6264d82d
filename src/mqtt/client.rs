//! MQTT client wrapper for Home Assistant discovery and button commands.

use super::entity::{Button, Entity, PAYLOAD_PRESS};
use crate::config::MqttConfig;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Command topic → button pressed when a message arrives on it.
type CommandRoutes = Arc<RwLock<HashMap<String, Button>>>;

/// Output side of the bridge: discovery announcements and state updates.
///
/// Delivery is at-least-once; callers do not wait for broker acknowledgment
/// beyond the call returning.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Register the entity with Home Assistant (retained discovery config).
    async fn announce(&self, entity: &Entity) -> Result<()>;

    /// Publish the entity's current state (retained).
    async fn publish_state(&self, entity: &Entity) -> Result<()>;
}

/// MQTT client owning the connection event loop.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
    routes: CommandRoutes,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        // Set credentials if provided
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.as_deref().unwrap_or(""));
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self {
            client,
            event_loop,
            routes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Handle for announcing and publishing from other tasks.
    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
            routes: self.routes.clone(),
        }
    }

    /// Run the MQTT event loop until cancelled.
    ///
    /// Signals `connected` on the first ConnAck, resubscribes to every known
    /// button command topic on each (re)connect and runs button actions for
    /// incoming presses.
    pub async fn run(
        mut self,
        mut connected: Option<oneshot::Sender<()>>,
        cancel: CancellationToken,
    ) {
        info!("[MQTT] Starting event loop");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.event_loop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("[MQTT] Connected");
                    if let Some(tx) = connected.take() {
                        let _ = tx.send(());
                    }
                    self.resubscribe();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload);
                    debug!("[MQTT] Received on {}: {}", publish.topic, payload);

                    if let Some(button) = route_command(&self.routes, &publish.topic, &payload) {
                        info!("[MQTT] Button pressed: {}", button.name);
                        tokio::spawn(async move { button.press().await });
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    // Wait before reconnecting
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }

        info!("[MQTT] Event loop stopped");
    }

    fn resubscribe(&self) {
        let topics: Vec<String> = self.routes.read().keys().cloned().collect();
        for topic in topics {
            if let Err(e) = self.client.try_subscribe(&topic, QoS::AtLeastOnce) {
                warn!("[MQTT] Failed to resubscribe to {}: {}", topic, e);
            }
        }
    }
}

/// Button registered for `topic`, if the payload is a press.
fn route_command(routes: &CommandRoutes, topic: &str, payload: &str) -> Option<Button> {
    if payload.trim() != PAYLOAD_PRESS {
        return None;
    }
    routes.read().get(topic).cloned()
}

/// Cloneable publishing handle, shared with the synchronization cycle.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    routes: CommandRoutes,
}

impl MqttPublisher {
    async fn publish_retained(&self, topic: &str, payload: &str) -> Result<()> {
        debug!("[MQTT] Publishing to {}: {}", topic, payload);
        self.client
            .publish(topic, QoS::AtLeastOnce, true, payload.as_bytes())
            .await
            .map_err(BridgeError::from)
    }
}

#[async_trait]
impl Broker for MqttPublisher {
    async fn announce(&self, entity: &Entity) -> Result<()> {
        let payload = serde_json::to_string(&entity.discovery_payload())?;
        self.publish_retained(&entity.config_topic(), &payload)
            .await?;

        if let (Entity::Button(button), Some(topic)) = (entity, entity.command_topic()) {
            let is_new = self
                .routes
                .write()
                .insert(topic.clone(), button.clone())
                .is_none();
            if is_new {
                info!("[MQTT] Subscribing to command topic: {}", topic);
                self.client.subscribe(&topic, QoS::AtLeastOnce).await?;
            }
        }

        Ok(())
    }

    async fn publish_state(&self, entity: &Entity) -> Result<()> {
        for (topic, payload) in entity.state_messages() {
            self.publish_retained(&topic, &payload).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::entity::{ButtonAction, HaDevice};
    use futures_util::FutureExt;

    fn routes_with(topic: &str, name: &str) -> CommandRoutes {
        let device = Arc::new(HaDevice {
            name: "Car".into(),
            identifier: "VIN1".into(),
            manufacturer: "FIAT".into(),
            model: "500e".into(),
            sw_version: "1.0".into(),
        });
        let action: ButtonAction = Arc::new(|| async {}.boxed());
        let routes: CommandRoutes = Arc::new(RwLock::new(HashMap::new()));
        routes
            .write()
            .insert(topic.to_string(), Button::new(device, name, action));
        routes
    }

    #[test]
    fn test_route_press_to_button() {
        let routes = routes_with("FCAUconnect/VIN1/DoorLock/set", "DoorLock");
        let button = route_command(&routes, "FCAUconnect/VIN1/DoorLock/set", "PRESS\n");
        assert_eq!(button.map(|b| b.name), Some("DoorLock".to_string()));
    }

    #[test]
    fn test_route_ignores_other_payloads_and_topics() {
        let routes = routes_with("FCAUconnect/VIN1/DoorLock/set", "DoorLock");
        assert!(route_command(&routes, "FCAUconnect/VIN1/DoorLock/set", "ON").is_none());
        assert!(route_command(&routes, "FCAUconnect/VIN1/Other/set", "PRESS").is_none());
    }

    #[test]
    fn test_credentials_only_with_username() {
        let config = MqttConfig {
            broker_host: "localhost".into(),
            broker_port: 1883,
            client_id: "test".into(),
            username: Some("user".into()),
            password: None,
        };
        // Construction must not require a live broker.
        let client = MqttClient::new(&config);
        assert!(client.routes.read().is_empty());
    }
}
