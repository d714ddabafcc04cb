//! In-memory fakes for the REST API and the push channel
//!
//! Available to this crate's tests and, through the `testing` feature, to
//! downstream crates.

use crate::error::{TransportError, TransportResult};
use crate::rest::NotificationApi;
use crate::source::{EventSource, EventStream};
use async_trait::async_trait;
use futures::stream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};
use waybill_core::Notification;

enum Scripted {
    Connection(mpsc::UnboundedReceiver<TransportResult<Notification>>),
    Refusal(TransportError),
}

/// An [`EventSource`] that plays back queued connections in order.
///
/// Once the queue is empty every `open` fails with `ConnectionFailed`.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Scripted>>,
    opens: AtomicUsize,
}

impl ScriptedSource {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection that succeeds; the returned sender drives it.
    pub fn push_connection(&self) -> LiveSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().push_back(Scripted::Connection(rx));
        LiveSender { tx }
    }

    /// Queue a failed connection attempt.
    pub fn push_refusal(&self, error: TransportError) {
        self.script.lock().push_back(Scripted::Refusal(error));
    }

    /// Number of `open` calls so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn open(&self) -> TransportResult<EventStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Connection(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Some(Scripted::Refusal(error)) => Err(error),
            None => Err(TransportError::ConnectionFailed(
                "no scripted connection left".to_string(),
            )),
        }
    }
}

/// Server side of one scripted connection.
#[derive(Debug)]
pub struct LiveSender {
    tx: mpsc::UnboundedSender<TransportResult<Notification>>,
}

impl LiveSender {
    /// Push a notification event. Returns `false` once the client went away.
    pub fn emit(&self, notification: Notification) -> bool {
        self.tx.send(Ok(notification)).is_ok()
    }

    /// Push an error item.
    pub fn fail(&self, error: TransportError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// Whether the client side was dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// End the connection.
    pub fn drop_connection(self) {}
}

/// A [`NotificationApi`] backed by a vector, with failure injection and
/// gates for holding calls in flight.
#[derive(Default)]
pub struct InMemoryApi {
    store: Mutex<Vec<Notification>>,
    list_failure: Mutex<Option<TransportError>>,
    clear_failure: Mutex<Option<TransportError>>,
    list_gate: Mutex<Option<oneshot::Receiver<()>>>,
    clear_gate: Mutex<Option<oneshot::Receiver<()>>>,
    list_calls: AtomicUsize,
    clear_calls: AtomicUsize,
}

impl InMemoryApi {
    /// Backend holding `items`, newest first.
    pub fn with_items(items: Vec<Notification>) -> Self {
        Self {
            store: Mutex::new(items),
            ..Self::default()
        }
    }

    /// Store a new notification at the front, as the backend does on create.
    pub fn insert(&self, notification: Notification) {
        self.store.lock().insert(0, notification);
    }

    /// Current backend contents.
    pub fn items(&self) -> Vec<Notification> {
        self.store.lock().clone()
    }

    /// Make the next list call fail.
    pub fn fail_next_list(&self, error: TransportError) {
        *self.list_failure.lock() = Some(error);
    }

    /// Make the next clear-all call fail.
    pub fn fail_next_clear(&self, error: TransportError) {
        *self.clear_failure.lock() = Some(error);
    }

    /// Hold the next list call after it captured its snapshot.
    /// Send on (or drop) the returned sender to let it finish.
    pub fn hold_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.list_gate.lock() = Some(rx);
        tx
    }

    /// Hold the next clear-all call before it touches the store.
    pub fn hold_next_clear(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.clear_gate.lock() = Some(rx);
        tx
    }

    /// Number of list calls so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of clear-all calls so far.
    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationApi for InMemoryApi {
    async fn list_notifications(&self) -> TransportResult<Vec<Notification>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.store.lock().clone();
        let failure = self.list_failure.lock().take();
        let gate = self.list_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(snapshot),
        }
    }

    async fn clear_all(&self) -> TransportResult<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.clear_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(error) = self.clear_failure.lock().take() {
            return Err(error);
        }
        self.store.lock().clear();
        Ok(())
    }
}
