//! List state for the cache list view.
//!
//! `ListController` mirrors the `LocalStore` contents into an ordered
//! `ListState` and reports the derived empty flag to a `ListListener` on
//! attach and after every store mutation.
//!
//! Snapshots are applied only if their store version is newer than the last
//! one applied, so a notification that arrives late (or the initial read in
//! `attach` racing a write) can never roll the list back to older contents.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::ErrorKind;
use crate::models::CacheRecord;
use crate::store::{LocalStore, StoreSnapshot, Subscription};

/// Receives the empty-state flag whenever the list is (re)materialized.
pub trait ListListener: Send + Sync {
    fn on_empty_state_changed(&self, is_empty: bool);
}

/// Materialized copy of the store contents, in store order.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState {
    pub records: Vec<CacheRecord>,
    pub is_empty: bool,
}

impl ListState {
    fn from_snapshot(records: &[CacheRecord]) -> Self {
        Self {
            records: records.to_vec(),
            is_empty: records.is_empty(),
        }
    }
}

impl Default for ListState {
    fn default() -> Self {
        Self::from_snapshot(&[])
    }
}

#[derive(Default)]
struct Shared {
    state: ListState,
    listener: Option<Arc<dyn ListListener>>,
    // Bumped on every attach/detach so callbacks from an old registration
    // are ignored even if they are already in flight.
    generation: u64,
    // Store version of the snapshot currently in `state`, for this generation.
    applied: Option<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps a `ListState` in sync with a `LocalStore`.
///
/// Listener calls are serialized, so the last flag a listener receives always
/// matches the newest snapshot applied. A listener must not synchronously
/// trigger another store notification from inside its callback.
pub struct ListController {
    store: Arc<dyn LocalStore>,
    shared: Arc<Mutex<Shared>>,
    // Held while applying a snapshot and reporting it.
    delivery: Arc<Mutex<()>>,
    subscription: Option<Subscription>,
}

impl ListController {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            shared: Arc::new(Mutex::new(Shared::default())),
            delivery: Arc::new(Mutex::new(())),
            subscription: None,
        }
    }

    /// Register `listener` for store changes and report the current state
    /// right away. Replaces any previous registration.
    pub fn attach(&mut self, listener: Arc<dyn ListListener>) {
        self.detach();

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.listener = Some(listener);
            shared.applied = None;
            shared.generation
        };

        let shared = Arc::clone(&self.shared);
        let delivery = Arc::clone(&self.delivery);
        self.subscription = Some(self.store.observe(Arc::new(move |snapshot: &StoreSnapshot| {
            Self::on_store_changed(&shared, &delivery, generation, snapshot);
        })));
        debug!(generation, "List controller attached");

        // A notification that landed since `observe` already reported newer
        // contents; this read is then dropped as stale.
        let snapshot = self.store.snapshot();
        Self::on_store_changed(&self.shared, &self.delivery, generation, &snapshot);
    }

    /// Release the store registration. Safe to call when not attached.
    pub fn detach(&mut self) {
        {
            let _delivery = lock(&self.delivery);
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.listener = None;
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            debug!("List controller detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    fn on_store_changed(
        shared: &Mutex<Shared>,
        delivery: &Mutex<()>,
        generation: u64,
        snapshot: &StoreSnapshot,
    ) {
        let _delivery = lock(delivery);
        let (listener, is_empty) = {
            let mut shared = lock(shared);
            if shared.generation != generation {
                return;
            }
            if shared.applied.is_some_and(|applied| snapshot.version <= applied) {
                debug!(
                    version = snapshot.version,
                    applied = shared.applied,
                    "Ignoring stale store snapshot"
                );
                return;
            }
            let Some(listener) = shared.listener.clone() else {
                return;
            };
            shared.state = ListState::from_snapshot(&snapshot.records);
            shared.applied = Some(snapshot.version);
            (listener, shared.state.is_empty)
        };

        debug!(
            version = snapshot.version,
            count = snapshot.records.len(),
            is_empty,
            "List state recomputed"
        );
        // Outside the state lock so the listener may read the list back.
        listener.on_empty_state_changed(is_empty);
    }

    /// The record at `position` in the last materialized order.
    pub fn item_at(&self, position: usize) -> Result<CacheRecord, ErrorKind> {
        let shared = lock(&self.shared);
        let records = &shared.state.records;
        records.get(position).cloned().ok_or_else(|| {
            warn!(position, len = records.len(), "List lookup out of range");
            ErrorKind::IndexOutOfRange {
                index: position,
                len: records.len(),
            }
        })
    }

    pub fn state(&self) -> ListState {
        lock(&self.shared).state.clone()
    }

    pub fn records(&self) -> Vec<CacheRecord> {
        lock(&self.shared).state.records.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.shared).state.records.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.shared).state.is_empty
    }
}

impl Drop for ListController {
    fn drop(&mut self) {
        self.detach();
    }
}
