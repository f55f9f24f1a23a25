use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{upsert, LocalStore, Observers, StoreListener, StoreSnapshot, Subscription};
use crate::models::CacheRecord;

/// Consider the stored caches stale after 1 hour.
const CACHE_STALE_MINUTES: i64 = 60;

/// File holding the stored caches inside the cache directory.
const STORE_FILE: &str = "caches.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

struct State {
    version: u64,
    records: Vec<CacheRecord>,
    cached_at: Option<DateTime<Utc>>,
}

impl State {
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            version: self.version,
            records: self.records.clone(),
        }
    }
}

/// `LocalStore` backed by a JSON file.
///
/// The full record list is rewritten on every save: the new contents go to a
/// temporary file that is renamed over `caches.json`, so a failed write leaves
/// the previous contents (on disk and in memory) untouched.
pub struct JsonStore {
    path: PathBuf,
    state: Mutex<State>,
    observers: Observers,
}

impl JsonStore {
    /// Open the store in `cache_dir`, loading any previously saved caches.
    pub fn open(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref();
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;

        let path = cache_dir.join(STORE_FILE);
        let (records, cached_at) = match Self::load(&path)? {
            Some(cached) => (cached.data, Some(cached.cached_at)),
            None => (Vec::new(), None),
        };
        info!(path = %path.display(), count = records.len(), "Opened cache store");

        Ok(Self {
            path,
            state: Mutex::new(State {
                version: 0,
                records,
                cached_at,
            }),
            observers: Observers::new(),
        })
    }

    fn load(path: &Path) -> Result<Option<CachedData<Vec<CacheRecord>>>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache file: {}", path.display()))?;
        let cached = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", path.display()))?;

        Ok(Some(cached))
    }

    fn write(&self, cached: &CachedData<&[CacheRecord]>) -> Result<()> {
        let contents = serde_json::to_string_pretty(cached)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the stored caches were last written, if ever.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.lock().cached_at
    }

    /// Human readable age of the stored caches, e.g. "5m ago", or "never".
    pub fn age_display(&self) -> String {
        let state = self.lock();
        match state.cached_at {
            Some(cached_at) => CachedData { data: (), cached_at }.age_display(),
            None => "never".to_string(),
        }
    }

    /// True when nothing was ever saved or the last save is over an hour old.
    pub fn is_stale(&self) -> bool {
        let state = self.lock();
        match state.cached_at {
            Some(cached_at) => CachedData { data: (), cached_at }.is_stale(),
            None => true,
        }
    }
}

#[async_trait]
impl LocalStore for JsonStore {
    async fn save_all(&self, records: Vec<CacheRecord>) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            let mut next = state.records.clone();
            upsert(&mut next, records);

            let cached = CachedData::new(next.as_slice());
            self.write(&cached)?;

            state.cached_at = Some(cached.cached_at);
            state.records = next;
            state.version += 1;
            state.snapshot()
        };
        debug!(version = snapshot.version, count = snapshot.records.len(), "Cache store saved");
        self.observers.notify(&snapshot);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            if self.path.exists() {
                std::fs::remove_file(&self.path)
                    .with_context(|| format!("Failed to remove {}", self.path.display()))?;
            }
            state.records.clear();
            state.cached_at = None;
            state.version += 1;
            state.snapshot()
        };
        debug!(version = snapshot.version, "Cache store cleared");
        self.observers.notify(&snapshot);
        Ok(())
    }

    fn snapshot(&self) -> StoreSnapshot {
        self.lock().snapshot()
    }

    fn observe(&self, listener: StoreListener) -> Subscription {
        self.observers.subscribe(listener)
    }
}
