use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{upsert, LocalStore, Observers, StoreListener, StoreSnapshot, Subscription};
use crate::models::CacheRecord;

/// In-memory `LocalStore`. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreSnapshot>,
    observers: Observers,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<CacheRecord>) -> Self {
        let mut initial = Vec::with_capacity(records.len());
        upsert(&mut initial, records);
        Self {
            state: Mutex::new(StoreSnapshot {
                version: 0,
                records: initial,
            }),
            observers: Observers::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreSnapshot> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `mutate` as one new version and notify observers with the result.
    fn commit(&self, mutate: impl FnOnce(&mut Vec<CacheRecord>)) -> StoreSnapshot {
        let snapshot = {
            let mut state = self.lock();
            mutate(&mut state.records);
            state.version += 1;
            state.clone()
        };
        self.observers.notify(&snapshot);
        snapshot
    }

    /// Synchronous `save_all`.
    pub(crate) fn save_now(&self, records: Vec<CacheRecord>) {
        let snapshot = self.commit(|current| upsert(current, records));
        debug!(version = snapshot.version, count = snapshot.records.len(), "Memory store saved");
    }

    /// Synchronous `clear_all`.
    pub(crate) fn clear_now(&self) {
        let snapshot = self.commit(|records| records.clear());
        debug!(version = snapshot.version, "Memory store cleared");
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn save_all(&self, records: Vec<CacheRecord>) -> Result<()> {
        self.save_now(records);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.clear_now();
        Ok(())
    }

    fn snapshot(&self) -> StoreSnapshot {
        self.lock().clone()
    }

    fn observe(&self, listener: StoreListener) -> Subscription {
        self.observers.subscribe(listener)
    }
}
