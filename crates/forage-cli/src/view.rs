//! Terminal rendering of fetch outcomes and list state.

use std::sync::Mutex;

use forage_core::config::HomeLocation;
use forage_core::{CacheRecord, ErrorKind, FetchListener, ListListener, Position};

/// Prints pipeline outcomes and list changes to the terminal.
pub struct ConsoleView {
    home: Option<HomeLocation>,
    last_failure: Mutex<Option<ErrorKind>>,
    // Last empty flag reported by the list, None until attached.
    empty: Mutex<Option<bool>>,
    empty_notice: bool,
}

impl ConsoleView {
    pub fn new(home: Option<HomeLocation>) -> Self {
        Self {
            home,
            last_failure: Mutex::new(None),
            empty: Mutex::new(None),
            empty_notice: true,
        }
    }

    /// Don't print the "no caches stored" hint. Used while refreshing, where
    /// the fetch outcome already says what happened.
    pub fn without_empty_notice(mut self) -> Self {
        self.empty_notice = false;
        self
    }

    pub fn last_failure(&self) -> Option<ErrorKind> {
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The empty flag most recently reported by an attached list.
    pub fn reported_empty(&self) -> Option<bool> {
        *self.empty.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn home_position(&self) -> Option<Position> {
        let home = self.home?;
        Position::new(home.latitude, home.longitude, home.accuracy).ok()
    }

    pub fn print_row(&self, index: usize, record: &CacheRecord) {
        let distance = self
            .home_position()
            .map(|home| format_distance(record.distance_to(&home)))
            .unwrap_or_default();
        println!(
            "{:>3}  {:<8} {:<32} {:<12} {:<10} {:>8}",
            index,
            record.code,
            truncate(&record.name, 32),
            record.kind.to_string(),
            record.rating_display(),
            distance
        );
    }

    pub fn print_detail(&self, record: &CacheRecord) {
        println!("{}  {}", record.code, record.name);
        println!("  Type:       {}", record.kind);
        println!("  Rating:     {}", record.rating_display());
        println!("  Location:   {:.5}, {:.5}", record.latitude, record.longitude);
        if let Some(home) = self.home_position() {
            println!("  Distance:   {}", format_distance(record.distance_to(&home)));
        }
        if let Some(hint) = &record.hint {
            println!("  Hint:       {}", hint);
        }
    }
}

impl FetchListener for ConsoleView {
    fn on_fetch_succeeded(&self, records: &[CacheRecord]) {
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
        match records.len() {
            0 => println!("No caches found nearby."),
            1 => println!("Found 1 cache nearby."),
            n => println!("Found {} caches nearby.", n),
        }
    }

    fn on_fetch_failed(&self, kind: ErrorKind) {
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(kind);
        if kind.offers_retry() {
            eprintln!("{}. Run `forage refresh` to retry.", kind);
        } else {
            eprintln!("{}.", kind);
        }
    }
}

impl ListListener for ConsoleView {
    fn on_empty_state_changed(&self, is_empty: bool) {
        *self.empty.lock().unwrap_or_else(|e| e.into_inner()) = Some(is_empty);
        if is_empty && self.empty_notice {
            println!("No caches stored. Run `forage refresh` to find some nearby.");
        }
    }
}

fn format_distance(metres: f64) -> String {
    if metres < 1000.0 {
        format!("{:.0} m", metres)
    } else {
        format!("{:.1} km", metres / 1000.0)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forage_core::{CacheKind, ListController, LocalStore, MemoryStore};
    use std::sync::Arc;

    fn record(code: &str) -> CacheRecord {
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

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(12.4), "12 m");
        assert_eq!(format_distance(1530.0), "1.5 km");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello", 10), "Hello");
        assert_eq!(truncate("Hello World", 8), "Hello...");
    }

    #[test]
    fn test_failure_is_remembered_until_success() {
        let view = ConsoleView::new(None);
        view.on_fetch_failed(ErrorKind::RemoteFetchError);
        assert_eq!(view.last_failure(), Some(ErrorKind::RemoteFetchError));
        view.on_fetch_succeeded(&[]);
        assert_eq!(view.last_failure(), None);
    }

    #[tokio::test]
    async fn test_store_writes_reach_attached_view() {
        let store = Arc::new(MemoryStore::new());
        let view = Arc::new(ConsoleView::new(None).without_empty_notice());
        let mut list = ListController::new(store.clone());

        assert_eq!(view.reported_empty(), None);
        list.attach(view.clone());
        assert_eq!(view.reported_empty(), Some(true));

        store.save_all(vec![record("GC1")]).await.unwrap();
        assert_eq!(view.reported_empty(), Some(false));

        store.clear_all().await.unwrap();
        assert_eq!(view.reported_empty(), Some(true));
    }
}
