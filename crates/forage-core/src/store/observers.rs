use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

use super::{StoreListener, StoreSnapshot};

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, StoreListener)>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // A panicking listener must not take change notifications down with it.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Listener registry shared by the store implementations.
#[derive(Default)]
pub struct Observers {
    registry: Arc<Mutex<Registry>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: StoreListener) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, listener));
        debug!(id, count = registry.listeners.len(), "Store observer registered");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver a snapshot to every registered listener.
    ///
    /// Listeners are called outside the registry lock so they may drop their
    /// own subscription from inside the callback.
    pub fn notify(&self, snapshot: &StoreSnapshot) {
        let listeners: Vec<StoreListener> = lock(&self.registry)
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        debug!(
            listeners = listeners.len(),
            version = snapshot.version,
            records = snapshot.records.len(),
            "Notifying store observers"
        );
        for listener in listeners {
            listener(snapshot);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for a store registration. Dropping it unregisters the listener.
#[must_use = "dropping a Subscription immediately unregisters the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Explicitly release the registration. Same as dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = lock(&registry);
            registry.listeners.retain(|(id, _)| *id != self.id);
            debug!(id = self.id, "Store observer released");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::snapshot;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener() -> (Arc<AtomicUsize>, StoreListener) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let listener: StoreListener = Arc::new(move |_: &StoreSnapshot| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[test]
    fn test_notify_reaches_all_listeners() {
        let observers = Observers::new();
        let (a, la) = counting_listener();
        let (b, lb) = counting_listener();
        let _sa = observers.subscribe(la);
        let _sb = observers.subscribe(lb);

        observers.notify(&snapshot(1, &["GC1"]));

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unregisters() {
        let observers = Observers::new();
        let (count, listener) = counting_listener();
        let sub = observers.subscribe(listener);
        assert_eq!(observers.len(), 1);

        drop(sub);
        observers.notify(&StoreSnapshot::default());

        assert!(observers.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_unregisters_only_itself() {
        let observers = Observers::new();
        let (a, la) = counting_listener();
        let (b, lb) = counting_listener();
        let sa = observers.subscribe(la);
        let _sb = observers.subscribe(lb);

        sa.cancel();
        observers.notify(&StoreSnapshot::default());

        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outliving_registry_is_harmless() {
        let observers = Observers::new();
        let (_count, listener) = counting_listener();
        let sub = observers.subscribe(listener);
        drop(observers);
        drop(sub);
    }
}
