//! Notification records as delivered by the dashboard backend.
//!
//! The wire shape is the backend's document shape (`_id`, `userId`,
//! `isRead`, `createdAt`); the Rust field names are normalized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Name of the push-channel event carrying a freshly created notification.
pub const NEW_NOTIFICATION_EVENT: &str = "new-notification";

/// Display name used when a notification has no resolvable originator.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Opaque, backend-assigned notification identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NotificationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NotificationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user whose action produced a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Originator {
    /// Display name, when the backend populated it.
    #[serde(rename = "fullName", default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// A single notification addressed to the signed-in recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier.
    #[serde(rename = "_id")]
    pub id: NotificationId,
    /// Originating user reference. `None` when absent, null, or unpopulated.
    #[serde(
        rename = "userId",
        default,
        deserialize_with = "deserialize_originator"
    )]
    pub originator: Option<Originator>,
    /// Short headline.
    pub title: String,
    /// Read flag; notifications arrive unread unless the backend says otherwise.
    #[serde(rename = "isRead", default)]
    pub is_read: bool,
    /// Server-side creation time.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Build an unread notification with no originator.
    pub fn new(
        id: impl Into<NotificationId>,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            originator: None,
            title: title.into(),
            is_read: false,
            created_at,
        }
    }

    /// Attach an originator display name.
    #[must_use]
    pub fn with_originator(mut self, full_name: impl Into<String>) -> Self {
        self.originator = Some(Originator {
            full_name: Some(full_name.into()),
        });
        self
    }

    /// Mark the notification as already read.
    #[must_use]
    pub fn read(mut self) -> Self {
        self.is_read = true;
        self
    }

    /// Name to display for the originator, falling back to [`UNKNOWN_USER`].
    pub fn sender_name(&self) -> &str {
        self.originator
            .as_ref()
            .and_then(|o| o.full_name.as_deref())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(UNKNOWN_USER)
    }
}

/// Payload of a [`NEW_NOTIFICATION_EVENT`] push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCreated {
    /// The created notification.
    pub notification: Notification,
}

/// `userId` is a populated object, `null`, or a bare id string when the
/// backend did not populate the reference. Only the object form carries a name.
fn deserialize_originator<'de, D>(deserializer: D) -> Result<Option<Originator>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Populated(Originator),
        Unpopulated(#[allow(dead_code)] String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Populated(originator)) => Some(originator),
        Some(Raw::Unpopulated(_)) | None => None,
    })
}
