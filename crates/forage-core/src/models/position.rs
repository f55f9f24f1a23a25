use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres (IUGG).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A single position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in metres.
    pub accuracy: f32,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Create a fix taken now. Fails if the coordinates are out of range.
    pub fn new(latitude: f64, longitude: f64, accuracy: f32) -> Result<Self> {
        if !Self::coordinates_valid(latitude, longitude) {
            bail!(
                "Invalid coordinates: latitude {} longitude {}",
                latitude,
                longitude
            );
        }
        Ok(Self {
            latitude,
            longitude,
            accuracy,
            timestamp: Utc::now(),
        })
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_valid(&self) -> bool {
        Self::coordinates_valid(self.latitude, self.longitude)
    }

    fn coordinates_valid(latitude: f64, longitude: f64) -> bool {
        latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude)
    }

    /// OKAPI `lat|lon` notation.
    pub fn to_okapi(&self) -> String {
        format!("{}|{}", self.latitude, self.longitude)
    }

    /// Great-circle distance to another coordinate in metres.
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        haversine(self.latitude, self.longitude, latitude, longitude)
    }
}

pub(crate) fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}
