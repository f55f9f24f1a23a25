//! Fetch orchestration.
//!
//! `FetchOrchestrator` runs one refresh as a single cancellable attempt:
//! connectivity check, position fix, remote fetch, local save. Each attempt
//! ends in exactly one of success, failure or silent cancellation, and at most
//! one attempt is ever outstanding.

pub mod orchestrator;
pub mod stage;

pub use orchestrator::FetchOrchestrator;
pub use stage::Stage;

use crate::error::ErrorKind;
use crate::models::CacheRecord;

/// Receives the outcome of each non-cancelled fetch attempt.
///
/// Exactly one of these methods is called per attempt that is not cancelled.
/// Calls may arrive on a runtime worker thread.
pub trait FetchListener: Send + Sync {
    fn on_fetch_succeeded(&self, records: &[CacheRecord]);

    fn on_fetch_failed(&self, kind: ErrorKind);
}
