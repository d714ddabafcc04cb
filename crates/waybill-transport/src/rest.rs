//! REST access to the notifications resource
//!
//! [`NotificationApi`] is the seam the feed talks to; [`RestClient`] is the
//! reqwest-backed implementation. Every call carries the session bearer
//! token; a `401` invalidates the session before the error is returned.

use crate::error::{TransportError, TransportResult};
use crate::session::CredentialSource;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use waybill_core::{ApiConfig, Notification};

/// Collection path for the recipient's notifications.
pub const NOTIFICATIONS_PATH: &str = "/notifications";
/// Bulk-delete path.
pub const CLEAR_ALL_PATH: &str = "/notifications/clear-all";

/// Backend operations the notification feed depends on.
#[async_trait]
pub trait NotificationApi: Send + Sync + 'static {
    /// `GET /notifications`: the recipient's notifications, newest first.
    async fn list_notifications(&self) -> TransportResult<Vec<Notification>>;

    /// `DELETE /notifications/clear-all`: delete every recipient notification.
    async fn clear_all(&self) -> TransportResult<()>;
}

/// Bare array, or an object wrapping the array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody {
    Bare(Vec<Notification>),
    Wrapped { notifications: Vec<Notification> },
}

/// reqwest-backed [`NotificationApi`].
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialSource>,
}

impl RestClient {
    /// Build a client for `config.base_url`.
    pub fn new(config: &ApiConfig, credentials: Arc<dyn CredentialSource>) -> TransportResult<Self> {
        url::Url::parse(&config.base_url)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Absolute URL for an API path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> TransportResult<RequestBuilder> {
        let token = self
            .credentials
            .bearer()
            .ok_or(TransportError::MissingCredentials)?;
        Ok(self
            .http
            .request(method, self.endpoint(path))
            .bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> TransportResult<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %response.url(), "Backend rejected session credential");
            self.credentials.invalidate();
            return Err(TransportError::Unauthorized);
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl NotificationApi for RestClient {
    async fn list_notifications(&self) -> TransportResult<Vec<Notification>> {
        let response = self
            .send(self.request(Method::GET, NOTIFICATIONS_PATH)?)
            .await?;
        let bytes = response.bytes().await?;
        let body: ListBody =
            serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))?;

        let items = match body {
            ListBody::Bare(items) | ListBody::Wrapped { notifications: items } => items,
        };
        tracing::debug!(count = items.len(), "Fetched notification snapshot");
        Ok(items)
    }

    async fn clear_all(&self) -> TransportResult<()> {
        self.send(self.request(Method::DELETE, CLEAR_ALL_PATH)?)
            .await?;
        tracing::debug!("Cleared notifications on backend");
        Ok(())
    }
}
