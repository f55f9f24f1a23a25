//! API client for Opencaching OKAPI.
//!
//! A nearby search is two requests: `services/caches/search/nearest` returns
//! cache codes ordered by distance, then `services/caches/geocaches` returns
//! the details for those codes.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ApiError, RemoteFetcher};
use crate::config::Config;
use crate::models::cache::{NearestResponse, OkApiGeocache};
use crate::models::{CacheRecord, Position};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Fields requested from `services/caches/geocaches`.
const CACHE_FIELDS: &str = "code|name|location|type|difficulty|terrain|hint2";

/// OKAPI client. Clone is cheap - reqwest::Client shares its connection pool.
#[derive(Clone)]
pub struct OkApiClient {
    client: Client,
    base_url: String,
    consumer_key: String,
    limit: u32,
}

impl OkApiClient {
    /// `base_url` is the OKAPI root, e.g. `https://www.opencaching.us/okapi/`.
    pub fn new(base_url: &str, consumer_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
            consumer_key: consumer_key.into(),
            limit: crate::config::DEFAULT_SEARCH_LIMIT,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let key = config.consumer_key().ok_or_else(|| {
            anyhow::anyhow!(
                "No OKAPI consumer key configured; set {} or run `forage config --consumer-key`",
                crate::config::CONSUMER_KEY_ENV
            )
        })?;
        Ok(Self::new(&config.okapi_url, key)?.with_limit(config.search_limit()))
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, method);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(&url)
                .query(params)
                .query(&[("consumer_key", self.consumer_key.as_str())])
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response
                        .text()
                        .await
                        .with_context(|| format!("Failed to read response body from {}", url))?;
                    return serde_json::from_str(&text)
                        .map_err(|e| ApiError::InvalidResponse(e.to_string()))
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// Codes of the caches nearest to `position`, nearest first.
    pub async fn search_nearest(&self, position: &Position) -> Result<Vec<String>> {
        let center = position.to_okapi();
        let limit = self.limit.to_string();
        let response: NearestResponse = self
            .get(
                "services/caches/search/nearest",
                &[("center", center.as_str()), ("limit", limit.as_str())],
            )
            .await
            .context("Nearest cache search failed")?;

        debug!(count = response.results.len(), more = response.more, "Nearest search returned");
        Ok(response.results)
    }

    /// Details for the given cache codes. Unknown codes map to `None`.
    pub async fn fetch_geocaches(&self, codes: &[String]) -> Result<HashMap<String, Option<OkApiGeocache>>> {
        let cache_codes = codes.join("|");
        self.get(
            "services/caches/geocaches",
            &[("cache_codes", cache_codes.as_str()), ("fields", CACHE_FIELDS)],
        )
        .await
        .context("Geocache details request failed")
    }
}

#[async_trait]
impl RemoteFetcher for OkApiClient {
    async fn fetch_nearby(&self, position: &Position) -> Result<Vec<CacheRecord>> {
        if !position.is_valid() {
            return Err(ApiError::InvalidPosition {
                latitude: position.latitude,
                longitude: position.longitude,
            }
            .into());
        }

        let codes = self.search_nearest(position).await?;
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut details = self.fetch_geocaches(&codes).await?;

        let mut records = Vec::with_capacity(codes.len());
        for code in &codes {
            match details.remove(code).flatten() {
                Some(cache) => records.push(cache.to_record()?),
                None => warn!(code = %code, "Cache listed by search but missing from details"),
            }
        }
        Ok(records)
    }
}
