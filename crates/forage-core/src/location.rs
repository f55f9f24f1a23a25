//! Position sources.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::HomeLocation;
use crate::models::Position;

/// Yields a single current position fix.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Fails when no fix can be obtained.
    async fn current_position(&self) -> Result<Position>;
}

/// Reports a configured position, stamped with the time of the request.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    home: Option<HomeLocation>,
}

impl FixedLocation {
    pub fn new(home: Option<HomeLocation>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Position> {
        let home = self
            .home
            .ok_or_else(|| anyhow!("No location configured; set one with `forage config --set-home`"))?;
        let position = Position::new(home.latitude, home.longitude, home.accuracy)?;
        debug!(lat = position.latitude, lon = position.longitude, "Using fixed location");
        Ok(position)
    }
}
