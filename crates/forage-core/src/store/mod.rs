//! Local persistence for cache records.
//!
//! `LocalStore` is the contract the fetch pipeline writes through and the
//! list controller observes. Two implementations ship with the crate:
//!
//! - `MemoryStore`: process-local, used by tests and ephemeral sessions
//! - `JsonStore`: a single JSON file in the cache directory, written atomically
//!
//! Both keep records in first-insertion order and upsert by cache code.
//! Every successful mutation bumps the store version; snapshots carry the
//! version they were taken at so observers can discard out-of-order ones.

pub mod json;
pub mod memory;
pub mod observers;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::CacheRecord;

pub use json::{CachedData, JsonStore};
pub use memory::MemoryStore;
pub use observers::{Observers, Subscription};

/// Ordered store contents as of `version`.
///
/// Versions start at 0 for a freshly opened store and grow by one with each
/// successful `save_all` or `clear_all`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub version: u64,
    pub records: Vec<CacheRecord>,
}

/// Callback invoked with the store's full snapshot after a mutation.
///
/// Notifications for concurrent mutations may arrive out of order; compare
/// `version` to tell which one is newer.
pub type StoreListener = Arc<dyn Fn(&StoreSnapshot) + Send + Sync>;

#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Upsert all records in one transaction. Readers never see a partial write.
    async fn save_all(&self, records: Vec<CacheRecord>) -> Result<()>;

    async fn clear_all(&self) -> Result<()>;

    /// Current ordered contents and the version they belong to.
    fn snapshot(&self) -> StoreSnapshot;

    /// Current ordered contents.
    fn records(&self) -> Vec<CacheRecord> {
        self.snapshot().records
    }

    /// Register for change notifications. Fires after every successful
    /// `save_all` or `clear_all` until the returned handle is dropped.
    fn observe(&self, listener: StoreListener) -> Subscription;
}

/// Upsert `incoming` into `records` by code. Existing codes are replaced in
/// place, new codes are appended in the order given.
pub(crate) fn upsert(records: &mut Vec<CacheRecord>, incoming: Vec<CacheRecord>) {
    for record in incoming {
        match records.iter_mut().find(|r| r.code == record.code) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    #[test]
    fn test_upsert_appends_new_codes_in_order() {
        let mut records = vec![record("GC1")];
        upsert(&mut records, vec![record("GC2"), record("GC3")]);
        let codes: Vec<&str> = records.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, ["GC1", "GC2", "GC3"]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut records = vec![record("GC1"), record("GC2")];
        let mut renamed = record("GC1");
        renamed.name = "Renamed".to_string();
        upsert(&mut records, vec![renamed]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].code, "GC1");
        assert_eq!(records[0].name, "Renamed");
    }

    #[test]
    fn test_upsert_dedups_within_batch() {
        let mut records = Vec::new();
        let mut second = record("GC1");
        second.name = "Second".to_string();
        upsert(&mut records, vec![record("GC1"), second]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Second");
    }
}
