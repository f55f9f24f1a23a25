use thiserror::Error;

/// Failures surfaced to the UI by the fetch pipeline and the list controller.
///
/// A cancelled fetch is not an error and never produces one of these.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("No internet connection")]
    NoConnectivity,

    #[error("Unable to determine your location")]
    LocationUnavailable,

    #[error("Failed to download nearby caches")]
    RemoteFetchError,

    #[error("Failed to save caches")]
    PersistenceError,

    #[error("Index {index} out of range for {len} caches")]
    IndexOutOfRange { index: usize, len: usize },
}

impl ErrorKind {
    /// Whether the UI should offer a retry action for this failure.
    pub fn offers_retry(&self) -> bool {
        matches!(
            self,
            ErrorKind::NoConnectivity | ErrorKind::RemoteFetchError | ErrorKind::PersistenceError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offers_retry() {
        assert!(ErrorKind::NoConnectivity.offers_retry());
        assert!(ErrorKind::RemoteFetchError.offers_retry());
        assert!(ErrorKind::PersistenceError.offers_retry());
        assert!(!ErrorKind::LocationUnavailable.offers_retry());
        assert!(!ErrorKind::IndexOutOfRange { index: 3, len: 2 }.offers_retry());
    }

    #[test]
    fn test_messages_are_distinct() {
        let kinds = [
            ErrorKind::NoConnectivity,
            ErrorKind::LocationUnavailable,
            ErrorKind::RemoteFetchError,
            ErrorKind::PersistenceError,
            ErrorKind::IndexOutOfRange { index: 0, len: 0 },
        ];
        let mut messages: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), kinds.len());
    }

    #[test]
    fn test_index_out_of_range_message() {
        let err = ErrorKind::IndexOutOfRange { index: 5, len: 2 };
        assert_eq!(err.to_string(), "Index 5 out of range for 2 caches");
    }
}
