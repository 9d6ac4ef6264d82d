//! Home Assistant lookups needed by the synchronization cycle.
//!
//! Zones are used to turn a raw GPS position into a tracker state, and the
//! configured unit system decides whether distances are converted to miles.

pub mod rest;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use rest::HaRestApi;

/// Mean earth radius used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Haversine distance in metres.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub friendly_name: String,
    pub center: Coordinate,
    /// Radius in metres.
    pub radius: f64,
}

impl Zone {
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.center.distance_to(coordinate) <= self.radius
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSystem {
    /// Length unit marker, e.g. "km" or "mi".
    pub length: String,
}

/// Zones containing `coordinate`, nearest center first.
pub fn zones_ascending(zones: Vec<Zone>, coordinate: &Coordinate) -> Vec<Zone> {
    let mut matching: Vec<(f64, Zone)> = zones
        .into_iter()
        .filter(|zone| zone.contains(coordinate))
        .map(|zone| (zone.center.distance_to(coordinate), zone))
        .collect();
    matching.sort_by(|a, b| a.0.total_cmp(&b.0));
    matching.into_iter().map(|(_, zone)| zone).collect()
}

#[async_trait]
pub trait HomeAutomation: Send + Sync {
    /// Zones the coordinate lies in, nearest first; empty when none match.
    async fn zones_ascending(&self, coordinate: Coordinate) -> Result<Vec<Zone>>;

    async fn unit_system(&self) -> Result<UnitSystem>;
}
