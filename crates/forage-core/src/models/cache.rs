use std::fmt;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use super::position::haversine;
use super::Position;

/// Geocache category as reported by OKAPI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CacheKind {
    Traditional,
    Multi,
    Quiz,
    Virtual,
    Event,
    Webcam,
    Moving,
    Own,
    /// Anything else, keeping the original text for display.
    Other(String),
}

impl From<String> for CacheKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Traditional" => CacheKind::Traditional,
            "Multi" => CacheKind::Multi,
            "Quiz" => CacheKind::Quiz,
            "Virtual" => CacheKind::Virtual,
            "Event" => CacheKind::Event,
            "Webcam" => CacheKind::Webcam,
            "Moving" => CacheKind::Moving,
            "Own" => CacheKind::Own,
            _ => CacheKind::Other(s),
        }
    }
}

impl From<CacheKind> for String {
    fn from(kind: CacheKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKind::Traditional => write!(f, "Traditional"),
            CacheKind::Multi => write!(f, "Multi"),
            CacheKind::Quiz => write!(f, "Quiz"),
            CacheKind::Virtual => write!(f, "Virtual"),
            CacheKind::Event => write!(f, "Event"),
            CacheKind::Webcam => write!(f, "Webcam"),
            CacheKind::Moving => write!(f, "Moving"),
            CacheKind::Own => write!(f, "Own"),
            CacheKind::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A geocache as persisted in the local store. Identity is `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub code: String,
    pub name: String,
    pub kind: CacheKind,
    pub latitude: f64,
    pub longitude: f64,
    pub difficulty: f32,
    pub terrain: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl CacheRecord {
    /// Distance from a position fix in metres.
    pub fn distance_to(&self, position: &Position) -> f64 {
        haversine(
            position.latitude,
            position.longitude,
            self.latitude,
            self.longitude,
        )
    }

    /// Difficulty/terrain pair as usually shown, e.g. "D1.5/T2".
    pub fn rating_display(&self) -> String {
        format!("D{}/T{}", self.difficulty, self.terrain)
    }
}

// ============================================================================
// OKAPI response types
// ============================================================================

/// Result of `services/caches/search/nearest`.
#[derive(Debug, Clone, Deserialize)]
pub struct NearestResponse {
    pub results: Vec<String>,
    #[serde(default)]
    pub more: bool,
}

/// One entry of `services/caches/geocaches`, requested with
/// `fields=code|name|location|type|difficulty|terrain|hint2`.
#[derive(Debug, Clone, Deserialize)]
pub struct OkApiGeocache {
    pub code: String,
    pub name: String,
    /// "lat|lon"
    pub location: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub difficulty: f32,
    pub terrain: f32,
    #[serde(default)]
    pub hint2: Option<String>,
}

impl OkApiGeocache {
    pub fn to_record(&self) -> Result<CacheRecord> {
        let (latitude, longitude) = parse_okapi_location(&self.location)
            .with_context(|| format!("Bad location for cache {}", self.code))?;

        let hint = self
            .hint2
            .as_ref()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string);

        Ok(CacheRecord {
            code: self.code.clone(),
            name: self.name.clone(),
            kind: CacheKind::from(self.kind.clone()),
            latitude,
            longitude,
            difficulty: self.difficulty,
            terrain: self.terrain,
            hint,
        })
    }
}

fn parse_okapi_location(s: &str) -> Result<(f64, f64)> {
    let (lat, lon) = s
        .split_once('|')
        .ok_or_else(|| anyhow!("expected \"lat|lon\", got {:?}", s))?;
    let lat: f64 = lat.trim().parse().context("latitude is not a number")?;
    let lon: f64 = lon.trim().parse().context("longitude is not a number")?;
    Ok((lat, lon))
}
