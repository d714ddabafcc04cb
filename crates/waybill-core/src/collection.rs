//! # Notification List
//!
//! An insertion-ordered, identifier-keyed collection holding the visible
//! notification feed.
//!
//! Position 0 is the newest arrival. Identifiers are unique: re-applying a
//! notification whose identifier is already present updates the record in
//! place and keeps its position, so at-least-once delivery never shows up as
//! a duplicate row.
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use waybill_core::{Notification, NotificationList};
//!
//! let mut list = NotificationList::from_snapshot(vec![
//!     Notification::new("n1", "Order placed", Utc::now()),
//! ]);
//! list.prepend(Notification::new("n2", "Order shipped", Utc::now()));
//!
//! let ids: Vec<_> = list.ids().map(|id| id.as_str()).collect();
//! assert_eq!(ids, ["n2", "n1"]);
//! assert_eq!(list.unread_count(), 2);
//! ```

use crate::notification::{Notification, NotificationId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Where an applied notification ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The identifier was new and the record now sits at the front.
    Inserted,
    /// The identifier was already present; the record was replaced in place.
    Updated,
}

/// Ordered, deduplicated notification collection (newest first).
///
/// Counts are derived from the map, never stored separately, so the badge
/// count can not drift from the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationList {
    items: IndexMap<NotificationId, Notification>,
}

impl NotificationList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from a server snapshot, preserving server order.
    ///
    /// A repeated identifier inside the snapshot keeps its first position and
    /// takes the later record's contents.
    pub fn from_snapshot(items: impl IntoIterator<Item = Notification>) -> Self {
        let mut list = Self::new();
        list.replace(items);
        list
    }

    // ─── Queries ─────────────────────────────────────────────

    /// Number of visible notifications.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Badge count. Everything not yet cleared counts as unread.
    pub fn unread_count(&self) -> usize {
        self.items.len()
    }

    /// Look up a notification by identifier.
    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.get(id)
    }

    /// Whether an identifier is present.
    pub fn contains(&self, id: &NotificationId) -> bool {
        self.items.contains_key(id)
    }

    /// Position of an identifier (0 is newest).
    pub fn position(&self, id: &NotificationId) -> Option<usize> {
        self.items.get_index_of(id)
    }

    /// Notification at a display position.
    pub fn at(&self, index: usize) -> Option<&Notification> {
        self.items.get_index(index).map(|(_, n)| n)
    }

    /// Newest notification.
    pub fn first(&self) -> Option<&Notification> {
        self.at(0)
    }

    /// Iterate newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.values()
    }

    /// Iterate identifiers newest first.
    pub fn ids(&self) -> impl Iterator<Item = &NotificationId> {
        self.items.keys()
    }

    /// Clone the records out in display order.
    pub fn to_vec(&self) -> Vec<Notification> {
        self.items.values().cloned().collect()
    }

    // ─── Mutations ───────────────────────────────────────────

    /// Apply a live arrival: new identifiers go to the front, known ones are
    /// updated where they stand.
    pub fn prepend(&mut self, item: Notification) -> Placement {
        if let Some(existing) = self.items.get_mut(&item.id) {
            *existing = item;
            Placement::Updated
        } else {
            self.items.shift_insert(0, item.id.clone(), item);
            Placement::Inserted
        }
    }

    /// Replace the whole list with `items`, in the given order.
    pub fn replace(&mut self, items: impl IntoIterator<Item = Notification>) {
        self.items.clear();
        for item in items {
            if let Some(existing) = self.items.get_mut(&item.id) {
                *existing = item;
            } else {
                self.items.insert(item.id.clone(), item);
            }
        }
    }

    /// Remove a single notification.
    pub fn remove(&mut self, id: &NotificationId) -> Option<Notification> {
        self.items.shift_remove(id)
    }

    /// Drop every notification.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

// ─── Serde Support ───────────────────────────────────────────

impl Serialize for NotificationList {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.items.values())
    }
}

impl<'de> Deserialize<'de> for NotificationList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let items = Vec::<Notification>::deserialize(deserializer)?;
        Ok(Self::from_snapshot(items))
    }
}

impl FromIterator<Notification> for NotificationList {
    fn from_iter<T: IntoIterator<Item = Notification>>(iter: T) -> Self {
        Self::from_snapshot(iter)
    }
}

impl<'a> IntoIterator for &'a NotificationList {
    type Item = &'a Notification;
    type IntoIter = indexmap::map::Values<'a, NotificationId, Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}

// ─── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn n(id: &str, hour: u32) -> Notification {
        Notification::new(id, format!("title {id}"), ts(hour))
    }

    fn ids(list: &NotificationList) -> Vec<&str> {
        list.ids().map(NotificationId::as_str).collect()
    }

    #[test]
    fn test_new_is_empty() {
        let list = NotificationList::new();
        assert!(list.is_empty());
        assert_eq!(list.unread_count(), 0);
        assert!(list.first().is_none());
    }

    #[test]
    fn test_prepend_uses_arrival_order_not_timestamp() {
        let mut list = NotificationList::new();
        list.prepend(n("a", 9));
        list.prepend(n("b", 3));

        assert_eq!(ids(&list), ["b", "a"]);
    }

    #[test]
    fn test_prepend_known_id_updates_in_place() {
        let mut list = NotificationList::from_snapshot(vec![n("a", 1), n("b", 2), n("c", 3)]);

        let placement = list.prepend(n("b", 2).read());

        assert_eq!(placement, Placement::Updated);
        assert_eq!(ids(&list), ["a", "b", "c"]);
        assert!(list.get(&"b".into()).unwrap().is_read);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_snapshot_keeps_server_order_and_dedups() {
        let list = NotificationList::from_snapshot(vec![n("x", 5), n("y", 4), n("x", 6)]);

        assert_eq!(ids(&list), ["x", "y"]);
        assert_eq!(list.get(&"x".into()).unwrap().created_at, ts(6));
    }

    #[test]
    fn test_replace_discards_previous_contents() {
        let mut list = NotificationList::new();
        list.prepend(n("live", 1));
        list.replace(Vec::new());

        assert!(list.is_empty());
        assert_eq!(list.unread_count(), 0);
    }

    #[test]
    fn test_remove_and_position() {
        let mut list = NotificationList::from_snapshot(vec![n("a", 1), n("b", 2), n("c", 3)]);

        assert_eq!(list.position(&"c".into()), Some(2));
        assert!(list.remove(&"a".into()).is_some());
        assert_eq!(list.position(&"c".into()), Some(1));
        assert!(list.remove(&"missing".into()).is_none());
    }

    #[test]
    fn test_serializes_as_ordered_array() {
        let mut list = NotificationList::from_snapshot(vec![n("a", 1)]);
        list.prepend(n("b", 2));

        let json = serde_json::to_value(&list).unwrap();
        let arr = json.as_array().unwrap();
        assert_eq!(arr[0]["_id"], "b");
        assert_eq!(arr[1]["_id"], "a");
    }

    proptest! {
        #[test]
        fn prop_ids_stay_unique_and_count_matches(ops in prop::collection::vec((0u8..3, 0u8..6), 0..64)) {
            let mut list = NotificationList::new();
            for (op, id) in ops {
                let id = format!("n{id}");
                match op {
                    0 => { list.prepend(n(&id, 1)); }
                    1 => list.replace(vec![n(&id, 2)]),
                    _ => list.clear(),
                }

                let mut seen: Vec<_> = list.ids().cloned().collect();
                let before = seen.len();
                seen.sort();
                seen.dedup();
                prop_assert_eq!(seen.len(), before);
                prop_assert_eq!(list.unread_count(), list.len());
            }
        }
    }
}
