//! Remote cache search.
//!
//! `RemoteFetcher` is what the fetch pipeline calls; `OkApiClient` implements
//! it against an Opencaching OKAPI installation.

pub mod client;
pub mod error;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CacheRecord, Position};

pub use client::OkApiClient;
pub use error::ApiError;

#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Caches near `position`, nearest first.
    ///
    /// `position` must have latitude in [-90, 90] and longitude in
    /// [-180, 180]. Fails on transport errors or malformed payloads.
    async fn fetch_nearby(&self, position: &Position) -> Result<Vec<CacheRecord>>;
}
