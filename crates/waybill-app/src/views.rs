//! Display rows for the notification panel and badge

use chrono::{DateTime, Utc};
use serde::Serialize;
use waybill_core::Notification;

/// Largest count the badge shows verbatim.
pub const BADGE_CAP: usize = 99;

/// One rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRow {
    /// Notification id
    pub id: String,
    /// Originator name, "Unknown User" when absent
    pub sender: String,
    /// Title
    pub title: String,
    /// Relative age such as "5m ago"
    pub age: String,
    /// Read flag
    pub is_read: bool,
}

impl NotificationRow {
    /// Render `notification` relative to `now`.
    pub fn new(notification: &Notification, now: DateTime<Utc>) -> Self {
        Self {
            id: notification.id.to_string(),
            sender: notification.sender_name().to_string(),
            title: notification.title.clone(),
            age: relative_age(notification.created_at, now),
            is_read: notification.is_read,
        }
    }
}

/// Render every item, keeping order.
pub fn rows(items: &[Notification], now: DateTime<Utc>) -> Vec<NotificationRow> {
    items.iter().map(|n| NotificationRow::new(n, now)).collect()
}

/// Coarse age: "just now", "12m ago", "3h ago", "2d ago".
///
/// Timestamps in the future (clock skew) read as "just now".
pub fn relative_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created_at).num_seconds();
    match secs {
        s if s < 60 => "just now".to_string(),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s => format!("{}d ago", s / 86_400),
    }
}

/// Badge text for an unread count; `None` hides the badge.
pub fn badge_label(count: usize) -> Option<String> {
    match count {
        0 => None,
        n if n > BADGE_CAP => Some(format!("{BADGE_CAP}+")),
        n => Some(n.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_relative_age_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(relative_age(now, now), "just now");
        assert_eq!(relative_age(now + Duration::minutes(5), now), "just now");
        assert_eq!(relative_age(now - Duration::minutes(12), now), "12m ago");
        assert_eq!(relative_age(now - Duration::hours(3), now), "3h ago");
        assert_eq!(relative_age(now - Duration::days(2), now), "2d ago");
    }

    #[test]
    fn test_badge_caps() {
        assert_eq!(badge_label(0), None);
        assert_eq!(badge_label(7).as_deref(), Some("7"));
        assert_eq!(badge_label(99).as_deref(), Some("99"));
        assert_eq!(badge_label(100).as_deref(), Some("99+"));
    }

    #[test]
    fn test_row_uses_unknown_user() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let row = NotificationRow::new(
            &Notification::new("n1", "Order placed", now - Duration::hours(1)),
            now,
        );
        assert_eq!(row.sender, "Unknown User");
        assert_eq!(row.age, "1h ago");
        assert!(!row.is_read);
    }
}
