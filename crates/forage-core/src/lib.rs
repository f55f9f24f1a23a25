//! Core library for Forage.
//!
//! Forage finds geocaches near the user's position, stores them locally and
//! keeps a list view in sync with the store. This crate holds everything that
//! is not presentation:
//!
//! - `fetch`: the `FetchOrchestrator` pipeline (connectivity, location,
//!   remote fetch, persistence) with cancellation
//! - `list`: the `ListController` that mirrors the store and tracks the empty state
//! - `models`: `CacheRecord` and `Position`
//! - `store`, `api`, `location`, `connectivity`: collaborator traits and their
//!   default implementations
//! - `config`: user configuration

pub mod api;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod fetch;
pub mod list;
pub mod location;
pub mod models;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{OkApiClient, RemoteFetcher};
pub use config::Config;
pub use connectivity::{ConnectivityChecker, TcpProbe};
pub use error::ErrorKind;
pub use fetch::{FetchListener, FetchOrchestrator, Stage};
pub use list::{ListController, ListListener, ListState};
pub use location::{FixedLocation, LocationProvider};
pub use models::{CacheKind, CacheRecord, Position};
pub use store::{JsonStore, LocalStore, MemoryStore, StoreSnapshot, Subscription};
