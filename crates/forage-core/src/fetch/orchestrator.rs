use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{FetchListener, Stage};
use crate::api::RemoteFetcher;
use crate::connectivity::ConnectivityChecker;
use crate::error::ErrorKind;
use crate::location::LocationProvider;
use crate::models::CacheRecord;
use crate::store::LocalStore;

/// Move `stage` forward to `next` unless that would go backwards or leave a
/// terminal stage. Returns whether the transition happened.
///
/// This is the only way stages change, so a cancelled attempt can never be
/// moved on by a late stage completion.
fn advance(stage: &watch::Sender<Stage>, next: Stage) -> bool {
    stage.send_if_modified(|current| {
        if current.can_advance_to(next) {
            *current = next;
            true
        } else {
            false
        }
    })
}

/// One run of the pipeline. Owned by the orchestrator's `current` slot.
struct FetchAttempt {
    id: u64,
    stage: Arc<watch::Sender<Stage>>,
    task: Option<JoinHandle<()>>,
}

impl FetchAttempt {
    fn new(id: u64) -> Self {
        let (stage, _) = watch::channel(Stage::Idle);
        Self {
            id,
            stage: Arc::new(stage),
            task: None,
        }
    }

    fn cancel(&self) -> bool {
        advance(&self.stage, Stage::Cancelled)
    }
}

/// The suspending part of an attempt, run on a spawned task.
struct Pipeline {
    id: u64,
    stage: Arc<watch::Sender<Stage>>,
    location: Arc<dyn LocationProvider>,
    remote: Arc<dyn RemoteFetcher>,
    store: Arc<dyn LocalStore>,
    listener: Arc<dyn FetchListener>,
}

impl Pipeline {
    async fn run(self) {
        let outcome = tokio::select! {
            biased;
            _ = cancelled(Arc::clone(&self.stage)) => None,
            outcome = self.stages() => outcome,
        };

        match outcome {
            Some(result) => finish(self.id, &self.stage, self.listener.as_ref(), result),
            None => debug!(attempt = self.id, "Fetch attempt unwound after cancellation"),
        }
    }

    /// Location, fetch, persist. `None` means the attempt was cancelled at a
    /// stage boundary and the finished stage's result was thrown away.
    async fn stages(&self) -> Option<Result<Vec<CacheRecord>, ErrorKind>> {
        if !advance(&self.stage, Stage::AwaitingLocation) {
            return None;
        }
        let position = match self.location.current_position().await {
            Ok(position) => position,
            Err(e) => {
                error!(attempt = self.id, error = %e, "Location unavailable");
                return Some(Err(ErrorKind::LocationUnavailable));
            }
        };
        debug!(
            attempt = self.id,
            lat = position.latitude,
            lon = position.longitude,
            accuracy = position.accuracy,
            "Position acquired"
        );

        if !advance(&self.stage, Stage::AwaitingFetch) {
            return None;
        }
        let records = match self.remote.fetch_nearby(&position).await {
            Ok(records) => records,
            Err(e) => {
                error!(attempt = self.id, error = %e, "Remote fetch failed");
                return Some(Err(ErrorKind::RemoteFetchError));
            }
        };
        debug!(attempt = self.id, count = records.len(), "Caches fetched");

        if !advance(&self.stage, Stage::AwaitingPersist) {
            return None;
        }
        match self.store.save_all(records.clone()).await {
            Ok(()) => Some(Ok(records)),
            Err(e) => {
                error!(attempt = self.id, error = %e, "Failed to persist caches");
                Some(Err(ErrorKind::PersistenceError))
            }
        }
    }
}

/// Resolves once the attempt is cancelled.
async fn cancelled(stage: Arc<watch::Sender<Stage>>) {
    let mut rx = stage.subscribe();
    let _ = rx.wait_for(|s| *s == Stage::Cancelled).await;
}

/// Move to the terminal stage and report it. Reports nothing if the attempt
/// was cancelled first.
fn finish(
    id: u64,
    stage: &watch::Sender<Stage>,
    listener: &dyn FetchListener,
    result: Result<Vec<CacheRecord>, ErrorKind>,
) {
    let terminal = match &result {
        Ok(_) => Stage::Succeeded,
        Err(kind) => Stage::Failed(*kind),
    };
    if !advance(stage, terminal) {
        debug!(attempt = id, "Attempt already cancelled, outcome discarded");
        return;
    }

    match result {
        Ok(records) => {
            info!(attempt = id, count = records.len(), "Fetch succeeded");
            listener.on_fetch_succeeded(&records);
        }
        Err(kind) => {
            warn!(attempt = id, error = %kind, "Fetch failed");
            listener.on_fetch_failed(kind);
        }
    }
}

/// Runs refreshes: connectivity check, position fix, remote fetch, local save.
///
/// Starting a fetch while another is outstanding cancels the old one and waits
/// for it to unwind before the new one begins. Outcomes are delivered to the
/// `FetchListener`; cancelled attempts report nothing.
pub struct FetchOrchestrator {
    connectivity: Arc<dyn ConnectivityChecker>,
    location: Arc<dyn LocationProvider>,
    remote: Arc<dyn RemoteFetcher>,
    store: Arc<dyn LocalStore>,
    listener: Arc<dyn FetchListener>,

    current: Mutex<Option<FetchAttempt>>,
    // Serializes start_fetch so supersede-then-start is one step.
    starting: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
}

impl FetchOrchestrator {
    pub fn new(
        connectivity: Arc<dyn ConnectivityChecker>,
        location: Arc<dyn LocationProvider>,
        remote: Arc<dyn RemoteFetcher>,
        store: Arc<dyn LocalStore>,
        listener: Arc<dyn FetchListener>,
    ) -> Self {
        Self {
            connectivity,
            location,
            remote,
            store,
            listener,
            current: Mutex::new(None),
            starting: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<FetchAttempt>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new fetch attempt, superseding any outstanding one.
    ///
    /// Returns once the attempt is running in the background, or right away
    /// after reporting `NoConnectivity`. Must be called within a Tokio runtime.
    pub async fn start_fetch(&self) {
        let _starting = self.starting.lock().await;

        let previous = self.lock_current().take();
        if let Some(mut previous) = previous {
            if previous.cancel() {
                info!(attempt = previous.id, "Superseding outstanding fetch");
            }
            if let Some(task) = previous.task.take() {
                if let Err(e) = task.await {
                    warn!(attempt = previous.id, error = %e, "Previous fetch task ended abnormally");
                }
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let attempt = FetchAttempt::new(id);
        let stage = Arc::clone(&attempt.stage);
        *self.lock_current() = Some(attempt);
        info!(attempt = id, "Fetch started");

        advance(&stage, Stage::CheckingConnectivity);
        if !self.connectivity.has_connectivity() {
            finish(id, &stage, self.listener.as_ref(), Err(ErrorKind::NoConnectivity));
            return;
        }

        let pipeline = Pipeline {
            id,
            stage,
            location: Arc::clone(&self.location),
            remote: Arc::clone(&self.remote),
            store: Arc::clone(&self.store),
            listener: Arc::clone(&self.listener),
        };
        let task = tokio::spawn(pipeline.run());

        if let Some(attempt) = self.lock_current().as_mut().filter(|a| a.id == id) {
            attempt.task = Some(task);
        }
    }

    /// Cancel the outstanding attempt, if any. Idempotent.
    pub fn cancel(&self) {
        if let Some(attempt) = self.lock_current().as_ref() {
            if attempt.cancel() {
                info!(attempt = attempt.id, "Fetch cancelled");
            }
        }
    }

    /// Stage of the most recent attempt, `Idle` if none was started.
    pub fn stage(&self) -> Stage {
        self.lock_current()
            .as_ref()
            .map(|attempt| *attempt.stage.borrow())
            .unwrap_or(Stage::Idle)
    }

    /// Wait until the most recent attempt reaches a terminal stage and return
    /// it. `None` if no attempt was ever started.
    pub async fn wait(&self) -> Option<Stage> {
        let mut rx = self.lock_current().as_ref()?.stage.subscribe();
        let stage = rx.wait_for(Stage::is_terminal).await.map(|s| *s).ok();
        stage
    }
}

impl Drop for FetchOrchestrator {
    fn drop(&mut self) {
        self.cancel();
    }
}
