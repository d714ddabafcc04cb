//! Push event sources
//!
//! An [`EventSource`] opens one connection and yields the notifications it
//! carries. Reconnection is not its concern; the [`LiveHub`](crate::LiveHub)
//! reopens the source according to its [`ReconnectPolicy`](crate::ReconnectPolicy).
//!
//! Stream contract: an `Err(TransportError::Decode(_))` item reports a single
//! malformed event and the stream continues. Any other error is the last
//! item; the connection is gone.

use crate::error::{TransportError, TransportResult};
use crate::session::CredentialSource;
use crate::socketio::{Frame, OpenHandshake, SocketPacket, DEFAULT_NAMESPACE, ENGINE_IO_VERSION};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;
use waybill_core::{LiveConfig, Notification, NotificationCreated, NEW_NOTIFICATION_EVENT};

/// Notifications from one open connection.
pub type EventStream = BoxStream<'static, TransportResult<Notification>>;

/// Something that can open a push connection.
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    /// Connect and complete the handshake.
    async fn open(&self) -> TransportResult<EventStream>;
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket.IO client over the WebSocket transport.
pub struct SocketIoSource {
    url: Url,
    connect_timeout: Duration,
    credentials: Arc<dyn CredentialSource>,
}

impl SocketIoSource {
    /// Source for the configured socket server.
    pub fn new(config: &LiveConfig, credentials: Arc<dyn CredentialSource>) -> TransportResult<Self> {
        Ok(Self {
            url: websocket_url(&config.endpoint, &config.path)?,
            connect_timeout: config.connect_timeout(),
            credentials,
        })
    }

    /// WebSocket URL the source connects to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn handshake(&self) -> TransportResult<(Socket, OpenHandshake)> {
        let (mut ws, _response) = connect_async(self.url.as_str()).await?;

        let open = match next_frame(&mut ws).await? {
            Frame::Open(open) => open,
            other => {
                return Err(TransportError::Handshake(format!(
                    "expected open packet, got {other:?}"
                )))
            }
        };
        tracing::debug!(sid = %open.sid, ping_interval = open.ping_interval, "Engine session opened");

        let auth = self.credentials.bearer().map(|token| json!({ "token": token }));
        send_frame(&mut ws, &Frame::connect(auth)).await?;

        loop {
            match next_frame(&mut ws).await? {
                Frame::Ping(payload) => send_frame(&mut ws, &Frame::Pong(payload)).await?,
                Frame::Message(SocketPacket::Connect { namespace, .. })
                    if namespace == DEFAULT_NAMESPACE =>
                {
                    return Ok((ws, open))
                }
                Frame::Message(SocketPacket::ConnectError { data, .. }) => {
                    let reason = data
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map_or_else(|| data.to_string(), str::to_string);
                    return Err(TransportError::Handshake(format!(
                        "connection refused: {reason}"
                    )));
                }
                Frame::Close => return Err(TransportError::Closed),
                other => tracing::trace!(frame = ?other, "Ignoring frame during handshake"),
            }
        }
    }
}

#[async_trait]
impl EventSource for SocketIoSource {
    async fn open(&self) -> TransportResult<EventStream> {
        let (ws, open) = timeout(self.connect_timeout, self.handshake())
            .await
            .map_err(|_| TransportError::Timeout("push channel connect".to_string()))??;
        tracing::info!(url = %self.url, "Push channel connected");
        Ok(event_stream(ws, open.liveness_window()))
    }
}

/// Map an `http(s)`/`ws(s)` origin and handshake path onto the WebSocket
/// transport URL.
pub fn websocket_url(endpoint: &str, path: &str) -> TransportResult<Url> {
    let mut url = Url::parse(endpoint)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme '{other}'"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| TransportError::InvalidEndpoint(endpoint.to_string()))?;
    url.set_path(path);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket");
    Ok(url)
}

fn event_stream(ws: Socket, liveness: Duration) -> EventStream {
    stream::unfold(Some(ws), move |state| async move {
        let mut ws = state?;
        loop {
            let message = match timeout(liveness, ws.next()).await {
                Err(_) => {
                    return Some((
                        Err(TransportError::Timeout("push channel heartbeat".to_string())),
                        None,
                    ))
                }
                Ok(None) => return Some((Err(TransportError::Closed), None)),
                Ok(Some(Err(e))) => return Some((Err(e.into()), None)),
                Ok(Some(Ok(message))) => message,
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => return Some((Err(TransportError::Closed), None)),
                _ => continue,
            };

            let frame = match Frame::decode(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping undecodable frame");
                    continue;
                }
            };

            match frame {
                Frame::Ping(payload) => {
                    if let Err(e) = send_frame(&mut ws, &Frame::Pong(payload)).await {
                        return Some((Err(e), None));
                    }
                }
                Frame::Close => return Some((Err(TransportError::Closed), None)),
                Frame::Message(SocketPacket::Disconnect { namespace })
                    if namespace == DEFAULT_NAMESPACE =>
                {
                    return Some((Err(TransportError::Closed), None))
                }
                Frame::Message(packet) => {
                    match packet.event_arg::<NotificationCreated>(NEW_NOTIFICATION_EVENT) {
                        Some(Ok(created)) => return Some((Ok(created.notification), Some(ws))),
                        Some(Err(e)) => return Some((Err(e), Some(ws))),
                        None => tracing::trace!(packet = ?packet, "Ignoring packet"),
                    }
                }
                _ => {}
            }
        }
    })
    .boxed()
}

async fn next_frame(ws: &mut Socket) -> TransportResult<Frame> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Frame::decode(&text),
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn send_frame(ws: &mut Socket, frame: &Frame) -> TransportResult<()> {
    ws.send(Message::Text(frame.encode())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StaticCredentials;
    use assert_matches::assert_matches;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const OPEN: &str = r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    const EVENT: &str = r#"42["new-notification",{"notification":{"_id":"n9","userId":{"fullName":"Ada"},"title":"Low stock","isRead":false,"createdAt":"2024-03-01T08:00:00Z"}}]"#;

    async fn server<F, Fut>(script: F) -> String
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = accept_async(tcp).await.unwrap();
            script(ws).await;
        });
        format!("http://{addr}")
    }

    async fn recv_text(ws: &mut WebSocketStream<TcpStream>) -> String {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("client went away: {other:?}"),
            }
        }
    }

    fn source(endpoint: String, creds: StaticCredentials) -> SocketIoSource {
        let config = LiveConfig {
            endpoint,
            ..LiveConfig::default()
        };
        SocketIoSource::new(&config, Arc::new(creds)).unwrap()
    }

    #[test]
    fn test_websocket_url_mapping() {
        let url = websocket_url("https://api.example.com", "/socket.io/").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.example.com/socket.io/?EIO=4&transport=websocket"
        );
        let url = websocket_url("http://localhost:5000", "/socket.io/").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert!(websocket_url("ftp://example.com", "/").is_err());
    }

    #[tokio::test]
    async fn test_handshake_heartbeat_and_event() {
        let endpoint = server(|mut ws| async move {
            ws.send(Message::Text(OPEN.into())).await.unwrap();
            assert_eq!(recv_text(&mut ws).await, r#"40{"token":"t0k"}"#);
            ws.send(Message::Text(r#"40{"sid":"n1"}"#.into())).await.unwrap();
            ws.send(Message::Text("2".into())).await.unwrap();
            assert_eq!(recv_text(&mut ws).await, "3");
            ws.send(Message::Text(r#"42["other-event",{}]"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(EVENT.into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut events = source(endpoint, StaticCredentials::new("t0k"))
            .open()
            .await
            .unwrap();

        let first = events.next().await.unwrap().unwrap();
        assert_eq!(first.id.as_str(), "n9");
        assert_eq!(first.sender_name(), "Ada");
        assert_matches!(events.next().await, Some(Err(TransportError::Closed)));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_event_does_not_end_stream() {
        let endpoint = server(|mut ws| async move {
            ws.send(Message::Text(OPEN.into())).await.unwrap();
            assert_eq!(recv_text(&mut ws).await, "40");
            ws.send(Message::Text("40".into())).await.unwrap();
            ws.send(Message::Text(r#"42["new-notification",{"notification":{"_id":1}}]"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(EVENT.into())).await.unwrap();
            ws.send(Message::Text("41".into())).await.unwrap();
        })
        .await;

        let mut events = source(endpoint, StaticCredentials::anonymous())
            .open()
            .await
            .unwrap();

        assert_matches!(events.next().await, Some(Err(TransportError::Decode(_))));
        assert_eq!(events.next().await.unwrap().unwrap().id.as_str(), "n9");
        assert_matches!(events.next().await, Some(Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_connect_error_is_handshake_failure() {
        let endpoint = server(|mut ws| async move {
            ws.send(Message::Text(OPEN.into())).await.unwrap();
            let _ = recv_text(&mut ws).await;
            ws.send(Message::Text(r#"44{"message":"Not authorized"}"#.into()))
                .await
                .unwrap();
        })
        .await;

        let result = source(endpoint, StaticCredentials::new("bad"))
            .open()
            .await
            .map(|_| ());
        assert_matches!(result, Err(TransportError::Handshake(reason)) if reason.contains("Not authorized"));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = source(format!("http://{addr}"), StaticCredentials::anonymous())
            .open()
            .await;
        assert!(result.is_err());
        assert!(result.err().map(|e| e.is_transient()).unwrap_or(false));
    }
}
