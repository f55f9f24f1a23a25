//! Application configuration management.
//!
//! Configuration is stored at `~/.config/forage/config.json` (or the
//! platform's equivalent config directory). A missing file means defaults.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "forage";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the configured OKAPI consumer key
pub const CONSUMER_KEY_ENV: &str = "FORAGE_CONSUMER_KEY";

pub const DEFAULT_OKAPI_URL: &str = "https://www.opencaching.us/okapi/";
pub const DEFAULT_PROBE_ADDR: &str = "www.opencaching.us:443";
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// OKAPI refuses `limit` above 500.
const MAX_SEARCH_LIMIT: u32 = 500;

/// A fixed position to search around.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomeLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_accuracy")]
    pub accuracy: f32,
}

fn default_accuracy() -> f32 {
    10.0
}

impl HomeLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: default_accuracy(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub okapi_url: String,
    pub consumer_key: Option<String>,
    pub search_limit: u32,
    pub home: Option<HomeLocation>,
    pub probe_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            okapi_url: DEFAULT_OKAPI_URL.to_string(),
            consumer_key: None,
            search_limit: DEFAULT_SEARCH_LIMIT,
            home: None,
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Consumer key from the environment, falling back to the config file.
    pub fn consumer_key(&self) -> Option<String> {
        std::env::var(CONSUMER_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.consumer_key.clone())
    }

    pub fn search_limit(&self) -> u32 {
        self.search_limit.clamp(1, MAX_SEARCH_LIMIT)
    }
}
