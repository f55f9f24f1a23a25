//! Data models for Forage.
//!
//! - `CacheRecord`, `CacheKind`: a geocache as persisted in the local store
//! - `Position`: a single position fix used to search nearby caches

pub mod cache;
pub mod position;

pub use cache::{CacheKind, CacheRecord};
pub use position::Position;
