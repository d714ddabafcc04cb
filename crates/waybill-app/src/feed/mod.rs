//! Notification feed: the view-facing lifecycle around the reconciler
//!
//! A [`NotificationFeed`] is what a hosting view holds. Activating it
//! attaches to the shared [`LiveHub`], loads a snapshot, and optionally
//! starts polling; deactivating detaches, stops polling, and makes any
//! snapshot still in flight land nowhere.

mod loader;
mod reconciler;

pub use loader::SnapshotLoader;
pub use reconciler::{Reconciler, SnapshotOutcome, SnapshotTicket};

use crate::error::FeedError;
use futures_signals::signal::Signal;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use waybill_core::{FeedConfig, Notification, NotificationList, WaybillConfig};
use waybill_transport::{
    ConnectionState, CredentialSource, LiveHub, NotificationApi, RestClient, Subscription,
};

struct Activation {
    _subscription: Subscription,
    poll: Option<JoinHandle<()>>,
}

impl Drop for Activation {
    fn drop(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.abort();
        }
    }
}

#[derive(Default)]
struct ActivationSlot {
    epoch: u64,
    current: Option<Activation>,
}

struct FeedInner {
    reconciler: Reconciler,
    loader: SnapshotLoader,
    api: Arc<dyn NotificationApi>,
    hub: LiveHub,
    config: FeedConfig,
    activation: Mutex<ActivationSlot>,
}

impl FeedInner {
    fn is_current(&self, epoch: u64) -> bool {
        let slot = self.activation.lock();
        slot.current.is_some() && slot.epoch == epoch
    }

    fn active_epoch(&self) -> Option<u64> {
        let slot = self.activation.lock();
        slot.current.as_ref().map(|_| slot.epoch)
    }

    async fn refresh(&self, epoch: u64) -> Result<(), FeedError> {
        let ticket = self.reconciler.begin_snapshot();
        let result = self.loader.load_snapshot().await;

        if !self.is_current(epoch) {
            self.reconciler.cancel_snapshot(ticket);
            tracing::debug!("Feed deactivated while loading, snapshot discarded");
            return Ok(());
        }

        match result {
            Ok(items) => {
                self.reconciler.apply_snapshot(ticket, items);
                Ok(())
            }
            Err(e) => {
                self.reconciler.cancel_snapshot(ticket);
                Err(e)
            }
        }
    }

    async fn finish_clear(&self) -> Result<(), FeedError> {
        let outcome = self.api.clear_all().await;
        match &outcome {
            Ok(()) => tracing::info!("Notifications cleared on backend"),
            Err(e) => tracing::warn!(error = %e, "Backend clear failed, keeping local clear"),
        }

        if self.config.reconcile_after_clear {
            if let Some(epoch) = self.active_epoch() {
                // Load errors are already logged by the loader.
                let _ = self.refresh(epoch).await;
            }
        }

        outcome.map_err(FeedError::Clear)
    }
}

/// View-facing notification feed.
#[derive(Clone)]
pub struct NotificationFeed {
    inner: Arc<FeedInner>,
}

impl std::fmt::Debug for NotificationFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationFeed")
            .field("active", &self.is_active())
            .field("count", &self.count())
            .field("live", &self.live_state())
            .finish()
    }
}

impl NotificationFeed {
    /// Feed over a backend and a (possibly shared) live hub.
    pub fn new(api: Arc<dyn NotificationApi>, hub: LiveHub, config: FeedConfig) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                reconciler: Reconciler::new(),
                loader: SnapshotLoader::new(api.clone()),
                api,
                hub,
                config,
                activation: Mutex::new(ActivationSlot::default()),
            }),
        }
    }

    /// Feed wired to the configured REST backend and socket server.
    pub fn from_config(
        config: &WaybillConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, FeedError> {
        let api = RestClient::new(&config.api, credentials.clone()).map_err(FeedError::Fetch)?;
        let hub = LiveHub::from_config(&config.live, credentials).map_err(FeedError::Live)?;
        Ok(Self::new(Arc::new(api), hub, config.feed.clone()))
    }

    /// Start the view: attach to live events, then load the snapshot.
    ///
    /// The listener is attached before the load begins so no event is lost
    /// while the snapshot is in flight. A failed load is returned but leaves
    /// the feed active and listening. Activating an active feed does nothing.
    pub async fn activate(&self) -> Result<(), FeedError> {
        let epoch = {
            let mut slot = self.inner.activation.lock();
            if slot.current.is_some() {
                return Ok(());
            }
            slot.epoch += 1;
            let epoch = slot.epoch;

            let reconciler = self.inner.reconciler.clone();
            let subscription = self
                .inner
                .hub
                .attach(move |n| reconciler.on_live_event(n.clone()));
            let poll = self
                .inner
                .config
                .poll_interval()
                .map(|period| tokio::spawn(poll(Arc::downgrade(&self.inner), epoch, period)));

            slot.current = Some(Activation {
                _subscription: subscription,
                poll,
            });
            epoch
        };
        tracing::info!(epoch, "Notification feed activated");

        self.inner.refresh(epoch).await
    }

    /// Stop the view. Live events and late snapshots no longer change the list.
    pub fn deactivate(&self) {
        let activation = self.inner.activation.lock().current.take();
        if activation.is_some() {
            tracing::info!("Notification feed deactivated");
        }
        drop(activation);
    }

    /// Whether the view is active.
    pub fn is_active(&self) -> bool {
        self.inner.active_epoch().is_some()
    }

    /// Reload the snapshot now.
    pub async fn refresh(&self) -> Result<(), FeedError> {
        let epoch = self.inner.active_epoch().ok_or(FeedError::Inactive)?;
        self.inner.refresh(epoch).await
    }

    /// Clear every notification.
    ///
    /// The local list is empty once this returns, before the returned future
    /// is polled. Awaiting it runs the backend call and, when configured, a
    /// reconciliation snapshot; a backend failure is reported but not rolled
    /// back.
    pub fn clear_all(&self) -> impl Future<Output = Result<(), FeedError>> + Send + 'static {
        self.inner.reconciler.clear_local();
        tracing::debug!("Local notification list cleared");
        let inner = self.inner.clone();
        async move { inner.finish_clear().await }
    }

    /// Current list.
    pub fn list(&self) -> NotificationList {
        self.inner.reconciler.snapshot()
    }

    /// Current items, newest arrival first.
    pub fn items(&self) -> Vec<Notification> {
        self.inner.reconciler.items()
    }

    /// Unread count.
    pub fn count(&self) -> usize {
        self.inner.reconciler.count()
    }

    /// Items as a signal.
    pub fn items_signal(&self) -> impl Signal<Item = Vec<Notification>> + Send + Sync + 'static {
        self.inner.reconciler.items_signal()
    }

    /// Count as a signal.
    pub fn count_signal(&self) -> impl Signal<Item = usize> + Send + Sync + 'static {
        self.inner.reconciler.count_signal()
    }

    /// Whether a snapshot load is running.
    pub fn is_loading(&self) -> bool {
        self.inner.loader.is_loading()
    }

    /// Loading flag as a signal.
    pub fn loading_signal(&self) -> impl Signal<Item = bool> + Send + Sync + 'static {
        self.inner.loader.loading_signal()
    }

    /// Live channel state.
    pub fn live_state(&self) -> ConnectionState {
        self.inner.hub.state()
    }

    /// Live channel state as a signal.
    pub fn live_state_signal(&self) -> impl Signal<Item = ConnectionState> + Send + Sync + 'static {
        self.inner.hub.state_signal()
    }

    /// The hub this feed listens on.
    pub fn hub(&self) -> &LiveHub {
        &self.inner.hub
    }
}

async fn poll(feed: Weak<FeedInner>, epoch: u64, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; activation already loads.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = feed.upgrade() else { return };
        if !inner.is_current(epoch) {
            return;
        }
        tracing::trace!("Polling notification snapshot");
        let _ = inner.refresh(epoch).await;
    }
}
