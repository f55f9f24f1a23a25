//! Recording fakes for the collaborator traits, shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::api::RemoteFetcher;
use crate::connectivity::ConnectivityChecker;
use crate::error::ErrorKind;
use crate::fetch::FetchListener;
use crate::list::ListListener;
use crate::location::LocationProvider;
use crate::models::{CacheKind, CacheRecord, Position};
use crate::store::{LocalStore, MemoryStore, StoreListener, StoreSnapshot, Subscription};

pub fn record(code: &str) -> CacheRecord {
    CacheRecord {
        code: code.to_string(),
        name: format!("Cache {}", code),
        kind: CacheKind::Traditional,
        latitude: 37.0,
        longitude: -122.0,
        difficulty: 1.5,
        terrain: 2.0,
        hint: None,
    }
}

pub fn snapshot(version: u64, codes: &[&str]) -> StoreSnapshot {
    StoreSnapshot {
        version,
        records: codes.iter().map(|code| record(code)).collect(),
    }
}

/// Holds each call until the test releases a permit.
#[derive(Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn new() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    pub fn open(&self, calls: usize) {
        self.0.add_permits(calls);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.0.acquire().await {
            permit.forget();
        }
    }
}

pub struct FakeConnectivity {
    online: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeConnectivity {
    pub fn new(online: bool) -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(online),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityChecker for FakeConnectivity {
    fn has_connectivity(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.online.load(Ordering::SeqCst)
    }
}

pub struct FakeLocation {
    position: Option<Position>,
    gate: Option<Gate>,
    pub calls: AtomicUsize,
}

impl FakeLocation {
    pub fn at(latitude: f64, longitude: f64) -> Arc<Self> {
        Arc::new(Self {
            position: Some(Position::new(latitude, longitude, 5.0).unwrap()),
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            position: None,
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn gated(latitude: f64, longitude: f64, gate: Gate) -> Arc<Self> {
        Arc::new(Self {
            position: Some(Position::new(latitude, longitude, 5.0).unwrap()),
            gate: Some(gate),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LocationProvider for FakeLocation {
    async fn current_position(&self) -> Result<Position> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        self.position.ok_or_else(|| anyhow!("no fix"))
    }
}

pub struct FakeRemote {
    records: Option<Vec<CacheRecord>>,
    gate: Option<Gate>,
    pub calls: AtomicUsize,
    pub positions: Mutex<Vec<Position>>,
}

impl FakeRemote {
    pub fn returning(records: Vec<CacheRecord>) -> Arc<Self> {
        Self::build(Some(records), None)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(None, None)
    }

    pub fn gated(records: Vec<CacheRecord>, gate: Gate) -> Arc<Self> {
        Self::build(Some(records), Some(gate))
    }

    fn build(records: Option<Vec<CacheRecord>>, gate: Option<Gate>) -> Arc<Self> {
        Arc::new(Self {
            records,
            gate,
            calls: AtomicUsize::new(0),
            positions: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl RemoteFetcher for FakeRemote {
    async fn fetch_nearby(&self, position: &Position) -> Result<Vec<CacheRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.positions.lock().unwrap().push(*position);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        self.records.clone().ok_or_else(|| anyhow!("malformed payload"))
    }
}

/// `MemoryStore` wrapper that records every `save_all` batch.
pub struct RecordingStore {
    inner: MemoryStore,
    fail_saves: AtomicBool,
    gate: Option<Gate>,
    pub saves: Mutex<Vec<Vec<CacheRecord>>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            fail_saves: AtomicBool::new(false),
            gate: None,
            saves: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        let store = Self::new();
        store.fail_saves.store(true, Ordering::SeqCst);
        store
    }

    pub fn gated(gate: Gate) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            fail_saves: AtomicBool::new(false),
            gate: Some(gate),
            saves: Mutex::new(Vec::new()),
        })
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }
}

#[async_trait]
impl LocalStore for RecordingStore {
    async fn save_all(&self, records: Vec<CacheRecord>) -> Result<()> {
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(anyhow!("disk full"));
        }
        self.saves.lock().unwrap().push(records.clone());
        self.inner.save_all(records).await
    }

    async fn clear_all(&self) -> Result<()> {
        self.inner.clear_all().await
    }

    fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot()
    }

    fn observe(&self, listener: StoreListener) -> Subscription {
        self.inner.observe(listener)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(Vec<String>),
    Failed(ErrorKind),
}

#[derive(Default)]
pub struct RecordingFetchListener {
    pub outcomes: Mutex<Vec<Outcome>>,
}

impl RecordingFetchListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

impl FetchListener for RecordingFetchListener {
    fn on_fetch_succeeded(&self, records: &[CacheRecord]) {
        let codes = records.iter().map(|r| r.code.clone()).collect();
        self.outcomes.lock().unwrap().push(Outcome::Succeeded(codes));
    }

    fn on_fetch_failed(&self, kind: ErrorKind) {
        self.outcomes.lock().unwrap().push(Outcome::Failed(kind));
    }
}

#[derive(Default)]
pub struct RecordingListListener {
    pub flags: Mutex<Vec<bool>>,
}

impl RecordingListListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn flags(&self) -> Vec<bool> {
        self.flags.lock().unwrap().clone()
    }
}

impl ListListener for RecordingListListener {
    fn on_empty_state_changed(&self, is_empty: bool) {
        self.flags.lock().unwrap().push(is_empty);
    }
}
