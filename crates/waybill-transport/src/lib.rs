//! # Waybill Transport
//!
//! Everything that leaves the process:
//!
//! - [`RestClient`]: `GET /notifications` and `DELETE /notifications/clear-all`
//!   with bearer credentials from a [`CredentialSource`]
//! - [`SocketIoSource`]: Socket.IO push events over WebSocket
//! - [`LiveHub`]: one shared, reference-counted push connection with
//!   bounded fixed-delay reconnection

pub mod error;
pub mod hub;
pub mod reconnect;
pub mod rest;
pub mod session;
pub mod socketio;
pub mod source;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{TransportError, TransportResult};
pub use hub::{LiveHub, Subscription};
pub use reconnect::{ConnectionState, ReconnectPolicy, ReconnectStats};
pub use rest::{NotificationApi, RestClient};
pub use session::{CredentialSource, FileSession, Session, StaticCredentials};
pub use source::{EventSource, EventStream, SocketIoSource};
