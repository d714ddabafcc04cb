//! # Waybill Core
//!
//! Shared vocabulary for the Waybill notification client:
//!
//! - [`Notification`] and its backend wire shape
//! - [`NotificationList`], the ordered and deduplicated visible feed
//! - [`WaybillConfig`], layered file/env/flag configuration
//! - [`ErrorCategory`], the reporting taxonomy every crate maps onto
//!
//! This crate performs no IO beyond reading its config file.

pub mod collection;
pub mod config;
pub mod error;
pub mod notification;

pub use collection::{NotificationList, Placement};
pub use config::{ApiConfig, FeedConfig, LiveConfig, SessionConfig, WaybillConfig};
pub use error::{Categorized, ConfigError, ErrorCategory};
pub use notification::{
    Notification, NotificationCreated, NotificationId, Originator, NEW_NOTIFICATION_EVENT,
    UNKNOWN_USER,
};
