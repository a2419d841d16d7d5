//! Position samples and great-circle distance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for haversine distance
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Single fix from the platform geolocation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: Option<f64>,
    /// Ground speed in meters per second
    pub speed: Option<f64>,
    /// Degrees clockwise from true north
    pub heading: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            speed: None,
            heading: None,
            timestamp: Utc::now(),
        }
    }

    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed.map(|mps| mps * 3.6)
    }

    pub fn distance_km(&self, other: &Position) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Great-circle distance in kilometers between two lat/lng points
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Decides whether a new sample moved far enough to be worth reporting
#[derive(Debug, Clone, Copy)]
pub struct MovementFilter {
    threshold_km: f64,
}

impl MovementFilter {
    pub fn new(min_displacement_m: f64) -> Self {
        Self {
            threshold_km: min_displacement_m / 1000.0,
        }
    }

    pub fn threshold_km(&self) -> f64 {
        self.threshold_km
    }

    /// The first sample is always significant.
    pub fn is_significant(&self, last_reported: Option<&Position>, next: &Position) -> bool {
        match last_reported {
            Some(last) => last.distance_km(next) >= self.threshold_km,
            None => true,
        }
    }
}

impl Default for MovementFilter {
    fn default() -> Self {
        Self::new(20.0)
    }
}
