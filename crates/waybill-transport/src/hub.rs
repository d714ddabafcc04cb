//! Shared live notification channel
//!
//! One [`LiveHub`] owns at most one push connection no matter how many
//! consumers listen. The first [`LiveHub::attach`] starts a driver task that
//! opens the [`EventSource`], forwards every notification to the attached
//! listeners, and reconnects per the [`ReconnectPolicy`]. Dropping or
//! detaching the last [`Subscription`] stops the driver unless the hub was
//! built with `keep_warm`.
//!
//! Listeners run on the driver task while the listener table is read-locked,
//! so once [`Subscription::detach`] returns the listener will not run again.
//! A listener must not attach or detach from inside its own callback.

use crate::error::{TransportError, TransportResult};
use crate::reconnect::{ConnectionState, ReconnectPolicy, ReconnectStats};
use crate::session::CredentialSource;
use crate::source::{EventSource, SocketIoSource};
use futures_signals::signal::{Mutable, Signal};
use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use waybill_core::{LiveConfig, Notification};

type Listener = Box<dyn Fn(&Notification) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

#[derive(Default)]
struct DriverSlot {
    epoch: u64,
    handle: Option<JoinHandle<()>>,
}

impl DriverSlot {
    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.epoch += 1;
    }
}

struct HubInner {
    source: Arc<dyn EventSource>,
    policy: ReconnectPolicy,
    keep_warm: bool,
    listeners: RwLock<Listeners>,
    driver: Mutex<DriverSlot>,
    state: Mutable<ConnectionState>,
    stats: Mutex<ReconnectStats>,
}

impl HubInner {
    fn dispatch(&self, notification: &Notification) {
        let listeners = self.listeners.read();
        if listeners.entries.is_empty() {
            tracing::trace!(id = %notification.id, "No live listener attached, event skipped");
            return;
        }
        for listener in listeners.entries.values() {
            listener(notification);
        }
        self.stats.lock().events_delivered += 1;
    }

    /// Publish a state change from the driver of `epoch`; stale drivers are ignored.
    fn publish(&self, epoch: u64, state: ConnectionState) -> bool {
        let slot = self.driver.lock();
        if slot.epoch != epoch {
            return false;
        }
        self.state.set_neq(state);
        true
    }

    fn detach(&self, id: u64) {
        let now_empty = {
            let mut listeners = self.listeners.write();
            if listeners.entries.remove(&id).is_none() {
                return;
            }
            listeners.entries.is_empty()
        };
        tracing::debug!(listener = id, "Live listener detached");

        if now_empty && !self.keep_warm {
            let mut slot = self.driver.lock();
            // An attach may have raced in after the table emptied.
            if self.listeners.read().entries.is_empty() {
                slot.stop();
                self.state.set_neq(ConnectionState::Idle);
                tracing::info!("Last live listener detached, push channel released");
            }
        }
    }
}

impl Drop for HubInner {
    fn drop(&mut self) {
        self.driver.get_mut().stop();
    }
}

/// Shared, reference-counted push channel.
#[derive(Clone)]
pub struct LiveHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for LiveHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveHub")
            .field("state", &self.state())
            .field("listeners", &self.listener_count())
            .field("keep_warm", &self.inner.keep_warm)
            .finish()
    }
}

impl LiveHub {
    /// Hub over an arbitrary event source.
    pub fn new(source: Arc<dyn EventSource>, policy: ReconnectPolicy, keep_warm: bool) -> Self {
        Self {
            inner: Arc::new(HubInner {
                source,
                policy,
                keep_warm,
                listeners: RwLock::new(Listeners::default()),
                driver: Mutex::new(DriverSlot::default()),
                state: Mutable::new(ConnectionState::Idle),
                stats: Mutex::new(ReconnectStats::default()),
            }),
        }
    }

    /// Hub over the Socket.IO server described by `config`.
    pub fn from_config(
        config: &LiveConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> TransportResult<Self> {
        let source = SocketIoSource::new(config, credentials)?;
        Ok(Self::new(
            Arc::new(source),
            ReconnectPolicy::from_config(config),
            config.keep_warm,
        ))
    }

    /// Register a listener for every incoming notification.
    ///
    /// Starts the push connection when no driver is running, which includes
    /// a channel that previously gave up. Must be called inside a Tokio runtime.
    pub fn attach<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let id = {
            let mut listeners = self.inner.listeners.write();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.insert(id, Box::new(listener));
            id
        };
        tracing::debug!(listener = id, "Live listener attached");
        self.ensure_driver();

        Subscription {
            hub: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().entries.len()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Connection state as a signal.
    pub fn state_signal(&self) -> impl Signal<Item = ConnectionState> + Send + Sync + 'static {
        self.inner.state.signal()
    }

    /// Snapshot of channel counters.
    pub fn stats(&self) -> ReconnectStats {
        self.inner.stats.lock().clone()
    }

    /// Drop every listener and close the connection, even when kept warm.
    pub fn shutdown(&self) {
        let mut slot = self.inner.driver.lock();
        self.inner.listeners.write().entries.clear();
        slot.stop();
        self.inner.state.set_neq(ConnectionState::Idle);
        tracing::info!("Live hub shut down");
    }

    fn ensure_driver(&self) {
        let mut slot = self.inner.driver.lock();
        if slot.is_running() || self.inner.listeners.read().entries.is_empty() {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(error = %e, "No async runtime, push channel not started");
                return;
            }
        };

        slot.stop();
        let epoch = slot.epoch;
        self.inner.state.set_neq(ConnectionState::Connecting);
        slot.handle = Some(runtime.spawn(drive(Arc::downgrade(&self.inner), epoch)));
    }
}

/// Handle for one attached listener. Detaches on drop.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    hub: Weak<HubInner>,
    id: Option<u64>,
}

impl Subscription {
    /// Stop receiving notifications.
    pub fn detach(mut self) {
        self.release();
    }

    /// Whether the listener is still registered with a live hub.
    pub fn is_attached(&self) -> bool {
        match (self.id, self.hub.upgrade()) {
            (Some(id), Some(hub)) => hub.listeners.read().entries.contains_key(&id),
            _ => false,
        }
    }

    fn release(&mut self) {
        if let (Some(id), Some(hub)) = (self.id.take(), self.hub.upgrade()) {
            hub.detach(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

async fn drive(hub: Weak<HubInner>, epoch: u64) {
    let (source, policy) = match hub.upgrade() {
        Some(inner) => (inner.source.clone(), inner.policy),
        None => return,
    };
    let mut attempt: u32 = 0;

    loop {
        match source.open().await {
            Ok(mut events) => {
                {
                    let Some(inner) = hub.upgrade() else { return };
                    if !inner.publish(epoch, ConnectionState::Connected) {
                        return;
                    }
                    let mut stats = inner.stats.lock();
                    stats.connections += 1;
                    if attempt > 0 {
                        stats.successful_reconnects += 1;
                        tracing::info!(attempt, "Push channel reconnected");
                    }
                }
                attempt = 0;

                while let Some(item) = events.next().await {
                    let Some(inner) = hub.upgrade() else { return };
                    match item {
                        Ok(notification) => inner.dispatch(&notification),
                        Err(TransportError::Decode(reason)) => {
                            inner.stats.lock().events_dropped += 1;
                            tracing::warn!(%reason, "Dropping malformed notification event");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Push channel lost");
                            break;
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, attempt, "Push channel connect failed"),
        }

        attempt += 1;
        let Some(inner) = hub.upgrade() else { return };
        match policy.delay_before(attempt) {
            Some(delay) => {
                if !inner.publish(epoch, ConnectionState::Reconnecting { attempt }) {
                    return;
                }
                inner.stats.lock().reconnect_attempts += 1;
                drop(inner);
                tokio::time::sleep(delay).await;
            }
            None => {
                if inner.publish(epoch, ConnectionState::GaveUp) {
                    inner.stats.lock().gave_up += 1;
                    tracing::error!(
                        attempts = policy.max_attempts,
                        "Push channel gave up reconnecting"
                    );
                }
                return;
            }
        }
    }
}
