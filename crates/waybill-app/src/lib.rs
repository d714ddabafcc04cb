//! # Waybill App
//!
//! The live notification feed a view hosts:
//!
//! - [`Reconciler`] merges snapshots, live events, and clears into one
//!   ordered, deduplicated list whose count always equals its length
//! - [`SnapshotLoader`] fetches the full set and exposes a loading flag
//! - [`NotificationFeed`] ties both to the shared live hub across view
//!   activation and deactivation
//!
//! Plus local [`preferences`] and display [`views`].

pub mod error;
pub mod feed;
pub mod preferences;
pub mod views;

pub use error::FeedError;
pub use feed::{NotificationFeed, Reconciler, SnapshotLoader, SnapshotOutcome, SnapshotTicket};
pub use preferences::{
    Language, NotificationPreferences, Preferences, PreferencesError, PreferencesStore,
};
pub use views::{badge_label, NotificationRow};
