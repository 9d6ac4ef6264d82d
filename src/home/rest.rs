//! Home Assistant REST API client for zone and unit lookups.

use super::{Coordinate, HomeAutomation, UnitSystem, Zone, zones_ascending};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct StateObject {
    entity_id: String,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CoreConfig {
    unit_system: UnitSystem,
}

pub struct HaRestApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HaRestApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[HA] GET {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::HomeAssistant(format!(
                "GET {path} returned {status}: {body}"
            )));
        }

        Ok(response.json().await?)
    }

    async fn zones(&self) -> Result<Vec<Zone>> {
        let states: Vec<StateObject> = self.get_json("/api/states").await?;
        Ok(parse_zones(states))
    }
}

/// Extract `zone.*` entities; passive zones and zones without geometry are skipped.
fn parse_zones(states: Vec<StateObject>) -> Vec<Zone> {
    states
        .into_iter()
        .filter(|s| s.entity_id.starts_with("zone."))
        .filter_map(|s| {
            let attr = |key: &str| s.attributes.get(key).and_then(|v| v.as_f64());
            let passive = s
                .attributes
                .get("passive")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if passive {
                return None;
            }

            let friendly_name = s
                .attributes
                .get("friendly_name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| s.entity_id.trim_start_matches("zone.").to_string());

            Some(Zone {
                friendly_name,
                center: Coordinate::new(attr("latitude")?, attr("longitude")?),
                radius: attr("radius")?,
            })
        })
        .collect()
}

#[async_trait]
impl HomeAutomation for HaRestApi {
    async fn zones_ascending(&self, coordinate: Coordinate) -> Result<Vec<Zone>> {
        Ok(zones_ascending(self.zones().await?, &coordinate))
    }

    async fn unit_system(&self) -> Result<UnitSystem> {
        let config: CoreConfig = self.get_json("/api/config").await?;
        Ok(config.unit_system)
    }
}
