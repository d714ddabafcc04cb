//! Feed errors

use waybill_core::{Categorized, ErrorCategory};
use waybill_transport::TransportError;

/// Errors surfaced by [`NotificationFeed`](crate::NotificationFeed).
///
/// None of them are fatal to the hosting view: a failed load keeps the
/// previous list, a failed clear keeps the optimistic empty list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Snapshot load failed
    #[error("failed to load notifications: {0}")]
    Fetch(#[source] TransportError),
    /// Backend clear-all failed
    #[error("failed to clear notifications: {0}")]
    Clear(#[source] TransportError),
    /// Push channel could not be configured
    #[error("live updates unavailable: {0}")]
    Live(#[source] TransportError),
    /// Operation needs an active view
    #[error("feed is not active")]
    Inactive,
}

impl FeedError {
    /// Whether retrying may succeed.
    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }
}

impl Categorized for FeedError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) | Self::Clear(e) | Self::Live(e) => e.category(),
            Self::Inactive => ErrorCategory::Input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_follows_transport() {
        let err = FeedError::Fetch(TransportError::Closed);
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.is_transient());
        assert_eq!(
            FeedError::Clear(TransportError::Unauthorized).category(),
            ErrorCategory::Auth
        );
        assert!(!FeedError::Inactive.is_transient());
    }
}
