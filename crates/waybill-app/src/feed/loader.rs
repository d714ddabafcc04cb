//! Snapshot loader

use crate::error::FeedError;
use futures_signals::signal::{Mutable, Signal, SignalExt};
use std::sync::Arc;
use waybill_core::Notification;
use waybill_transport::NotificationApi;

/// Fetches the full notification set and tracks whether a fetch is running.
#[derive(Clone)]
pub struct SnapshotLoader {
    api: Arc<dyn NotificationApi>,
    in_flight: Mutable<usize>,
}

impl std::fmt::Debug for SnapshotLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotLoader")
            .field("in_flight", &self.in_flight.get())
            .finish_non_exhaustive()
    }
}

/// Decrements the in-flight count even when the load future is dropped.
struct LoadingGuard(Mutable<usize>);

impl LoadingGuard {
    fn start(in_flight: &Mutable<usize>) -> Self {
        *in_flight.lock_mut() += 1;
        Self(in_flight.clone())
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let mut count = self.0.lock_mut();
        *count = count.saturating_sub(1);
    }
}

impl SnapshotLoader {
    /// Loader over a notification backend.
    pub fn new(api: Arc<dyn NotificationApi>) -> Self {
        Self {
            api,
            in_flight: Mutable::new(0),
        }
    }

    /// Fetch the recipient's notifications.
    ///
    /// Failures are logged here and returned; callers keep their previous list.
    pub async fn load_snapshot(&self) -> Result<Vec<Notification>, FeedError> {
        let _loading = LoadingGuard::start(&self.in_flight);
        match self.api.list_notifications().await {
            Ok(items) => {
                tracing::debug!(count = items.len(), "Notification snapshot loaded");
                Ok(items)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load notification snapshot");
                Err(FeedError::Fetch(e))
            }
        }
    }

    /// Whether a fetch is running.
    pub fn is_loading(&self) -> bool {
        self.in_flight.get() > 0
    }

    /// Loading flag as a signal.
    pub fn loading_signal(&self) -> impl Signal<Item = bool> + Send + Sync + 'static {
        self.in_flight.signal().map(|n| n > 0).dedupe()
    }
}
