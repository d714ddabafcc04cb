//! Reconciler: the only writer of the visible notification list
//!
//! The list lives in a [`Mutable`], so list and count are one value and can
//! never be observed out of step. Snapshot loads are ticketed: live events
//! that arrive while a ticket is outstanding are replayed on top of the
//! snapshot when it lands, and [`Reconciler::clear_local`] voids every
//! outstanding ticket so an older snapshot cannot bring cleared items back.
//! Landing a ticket also voids every older one still outstanding.

use futures_signals::signal::{Mutable, Signal, SignalExt};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use waybill_core::{Notification, NotificationList, Placement};

/// Claim on applying one snapshot load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a ticket must be applied or cancelled"]
pub struct SnapshotTicket {
    generation: u64,
    id: u64,
}

/// Outcome of [`Reconciler::apply_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// The snapshot replaced the list
    Applied {
        /// Live events re-applied on top
        replayed: usize,
    },
    /// A clear-all or a newer snapshot landed after the ticket was issued
    Stale,
}

#[derive(Debug, Default)]
struct TicketBook {
    generation: u64,
    next_id: u64,
    // Live events seen since each outstanding ticket, in arrival order.
    pending: BTreeMap<u64, Vec<Notification>>,
}

/// Merges snapshots, live events, and clears into one ordered list.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    list: Mutable<NotificationList>,
    book: Arc<Mutex<TicketBook>>,
}

impl Reconciler {
    /// Empty reconciler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list with `items` outright.
    pub fn on_snapshot_loaded(&self, items: Vec<Notification>) {
        let _book = self.book.lock();
        let count = items.len();
        self.list.set(NotificationList::from_snapshot(items));
        tracing::debug!(count, "Snapshot replaced notification list");
    }

    /// Put a live notification at the front; a known id is updated in place.
    pub fn on_live_event(&self, item: Notification) {
        let mut book = self.book.lock();
        for replay in book.pending.values_mut() {
            replay.push(item.clone());
        }
        let id = item.id.clone();
        let placement = self.list.lock_mut().prepend(item);
        if placement == Placement::Updated {
            tracing::debug!(%id, "Live event updated a known notification");
        }
    }

    /// Start a snapshot load.
    pub fn begin_snapshot(&self) -> SnapshotTicket {
        let mut book = self.book.lock();
        let id = book.next_id;
        book.next_id += 1;
        book.pending.insert(id, Vec::new());
        SnapshotTicket {
            generation: book.generation,
            id,
        }
    }

    /// Land a ticketed snapshot: replace the list, then replay the live
    /// events that arrived since the ticket was issued.
    pub fn apply_snapshot(
        &self,
        ticket: SnapshotTicket,
        items: Vec<Notification>,
    ) -> SnapshotOutcome {
        let mut book = self.book.lock();
        let replay = book.pending.remove(&ticket.id);
        let replay = match replay {
            Some(replay) if ticket.generation == book.generation => replay,
            _ => {
                tracing::debug!(ticket = ticket.id, "Discarding superseded snapshot");
                return SnapshotOutcome::Stale;
            }
        };
        // Older tickets would roll the list back to earlier data.
        let newer = book.pending.split_off(&ticket.id);
        let superseded = std::mem::replace(&mut book.pending, newer).len();
        if superseded > 0 {
            tracing::debug!(ticket = ticket.id, superseded, "Voided older snapshot tickets");
        }

        let mut list = NotificationList::from_snapshot(items);
        let replayed = replay.len();
        for item in replay {
            list.prepend(item);
        }
        let count = list.len();
        self.list.set(list);
        tracing::debug!(count, replayed, "Snapshot applied");
        SnapshotOutcome::Applied { replayed }
    }

    /// Give up on a ticket whose load failed or was discarded.
    pub fn cancel_snapshot(&self, ticket: SnapshotTicket) {
        self.book.lock().pending.remove(&ticket.id);
    }

    /// Empty the list immediately and void outstanding snapshot tickets.
    pub fn clear_local(&self) {
        let mut book = self.book.lock();
        book.generation += 1;
        book.pending.clear();
        self.list.lock_mut().clear();
    }

    /// Current list.
    pub fn snapshot(&self) -> NotificationList {
        self.list.get_cloned()
    }

    /// Current items, newest arrival first.
    pub fn items(&self) -> Vec<Notification> {
        self.list.lock_ref().to_vec()
    }

    /// Unread count; always the list length.
    pub fn count(&self) -> usize {
        self.list.lock_ref().unread_count()
    }

    /// Items as a signal.
    pub fn items_signal(&self) -> impl Signal<Item = Vec<Notification>> + Send + Sync + 'static {
        self.list.signal_ref(NotificationList::to_vec)
    }

    /// Count as a signal.
    pub fn count_signal(&self) -> impl Signal<Item = usize> + Send + Sync + 'static {
        self.list.signal_ref(NotificationList::unread_count).dedupe()
    }

    /// Number of snapshot loads currently ticketed.
    pub fn outstanding_snapshots(&self) -> usize {
        self.book.lock().pending.len()
    }
}
