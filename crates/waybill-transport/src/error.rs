//! Transport errors
//!
//! One enum covers the REST client, the session store, and the push channel.
//! Each variant maps onto a shared [`ErrorCategory`] so callers can decide
//! whether a retry is worthwhile.

use waybill_core::{Categorized, ErrorCategory};

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised while talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response
    #[error("request failed: {0}")]
    Request(String),
    /// The server answered with a non-success status
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },
    /// The server rejected the session credential
    #[error("session is no longer valid")]
    Unauthorized,
    /// No session credential is available
    #[error("no session credential available")]
    MissingCredentials,
    /// A payload could not be decoded
    #[error("failed to decode payload: {0}")]
    Decode(String),
    /// An operation exceeded its deadline
    #[error("operation '{0}' timed out")]
    Timeout(String),
    /// The push channel could not be established
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The push channel handshake was refused or malformed
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// The peer violated the channel framing
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The push channel closed
    #[error("connection closed")]
    Closed,
    /// A configured URL is unusable
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// The local session store failed
    #[error("session store error: {0}")]
    SessionStore(String),
}

impl TransportError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }
}

impl Categorized for TransportError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Request(_) | Self::Timeout(_) | Self::ConnectionFailed(_) | Self::Closed => {
                ErrorCategory::Network
            }
            Self::Status { status, .. } if *status >= 500 || *status == 429 => {
                ErrorCategory::Network
            }
            Self::Status { .. } | Self::Decode(_) | Self::Handshake(_) | Self::Protocol(_) => {
                ErrorCategory::Protocol
            }
            Self::Unauthorized | Self::MissingCredentials => ErrorCategory::Auth,
            Self::InvalidEndpoint(_) => ErrorCategory::Config,
            Self::SessionStore(_) => ErrorCategory::Storage,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.url().map_or_else(|| "request".to_string(), |u| u.to_string()))
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::Closed,
            WsError::Http(response) => Self::Handshake(format!(
                "upgrade rejected with status {}",
                response.status()
            )),
            WsError::Url(e) => Self::InvalidEndpoint(e.to_string()),
            other => Self::ConnectionFailed(other.to_string()),
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}
