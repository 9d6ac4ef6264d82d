//! Offline stand-in for the vehicle cloud.
//!
//! Serves a single demo vehicle and accepts every command, so the bridge can
//! be exercised end to end without an account.

use super::{Command, TelematicsClient};
use crate::error::Result;
use crate::vehicle::{Attributes, Location, Vehicle};
use async_trait::async_trait;
use log::info;
use rand::Rng;
use serde_json::json;

pub const FAKE_VIN: &str = "ZFAFAKE0000000001";

#[derive(Debug, Default)]
pub struct FakeTelematicsClient;

impl FakeTelematicsClient {
    pub fn new() -> Self {
        Self
    }

    fn demo_vehicle(&self) -> Vehicle {
        let mut rng = rand::thread_rng();
        let state_of_charge: u8 = rng.gen_range(20..=100);
        let range_km = u32::from(state_of_charge) * 3;

        let details = json!({
            "EV": {
                "Battery": {
                    "State_of_Charge": state_of_charge.to_string(),
                    "Distance_To_Empty_value": range_km.to_string(),
                    "Distance_To_Empty_unit": "km",
                    "Voltage_value": "400",
                    "Voltage_unit": "volts",
                    "Charging_Status": "DISCONNECTED"
                },
                "Time_To_Fully_Charge": "0"
            },
            "Odometer_value": "12345",
            "Odometer_unit": "km",
            "Tyre_Pressure_value": "2.5",
            "Tyre_Pressure_unit": null,
            "Doors_Locked": "true"
        });

        Vehicle {
            vin: FAKE_VIN.to_string(),
            nickname: Some("Demo 500e".to_string()),
            make: "FIAT".to_string(),
            model_description: "Neuer 500 (2020)".to_string(),
            location: Location {
                latitude: 45.0703,
                longitude: 7.6869,
                timestamp_ms: chrono::Utc::now().timestamp_millis(),
            },
            attributes: Attributes::flatten(&details),
        }
    }
}

#[async_trait]
impl TelematicsClient for FakeTelematicsClient {
    async fn login_and_keep_alive(&self) -> Result<()> {
        info!("[Fake] Login accepted");
        Ok(())
    }

    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>> {
        Ok(vec![self.demo_vehicle()])
    }

    async fn send_command(&self, vin: &str, command: Command, _pin: &str) -> Result<()> {
        info!(
            "[Fake] Command {} ({}) accepted for {}",
            command,
            command.action(),
            vin
        );
        Ok(())
    }
}
