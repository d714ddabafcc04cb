//! Socket.IO v5 over Engine.IO v4 framing
//!
//! Only the WebSocket transport is spoken, so every WebSocket text message
//! is exactly one Engine.IO packet:
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   open
//! 2 / 3                                                     ping / pong
//! 4<socket packet>                                          message
//! ```
//!
//! and a Socket.IO packet inside a message is
//! `<type>[/namespace,][ack id][json]`, e.g.
//! `42["new-notification",{"notification":{..}}]`.
//!
//! Binary attachments are not used by the notification channel and are
//! rejected as protocol errors.

use crate::error::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Namespace used when a packet does not name one.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Engine.IO protocol revision spoken by this client.
pub const ENGINE_IO_VERSION: &str = "4";

/// Parameters the server sends in the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    /// Engine.IO session id.
    pub sid: String,
    /// Server ping period in milliseconds.
    pub ping_interval: u64,
    /// Grace period after a missed ping in milliseconds.
    pub ping_timeout: u64,
    /// Transports the server would upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Largest payload the server accepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl OpenHandshake {
    /// How long the connection may stay silent before it is considered dead.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// A decoded Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Namespace connect request (client) or acknowledgement (server).
    Connect {
        /// Target namespace
        namespace: String,
        /// Auth payload (client) or `{sid}` (server)
        data: Option<Value>,
    },
    /// Namespace disconnect.
    Disconnect {
        /// Namespace being left
        namespace: String,
    },
    /// Named event with arguments.
    Event {
        /// Namespace the event belongs to
        namespace: String,
        /// Acknowledgement id requested by the sender
        ack_id: Option<u64>,
        /// Event name
        name: String,
        /// Event arguments
        args: Vec<Value>,
    },
    /// Acknowledgement of an earlier event.
    Ack {
        /// Namespace of the acknowledged event
        namespace: String,
        /// Id being acknowledged
        ack_id: u64,
        /// Acknowledgement arguments
        args: Vec<Value>,
    },
    /// Namespace connection refused by the server.
    ConnectError {
        /// Namespace that refused
        namespace: String,
        /// Server supplied reason
        data: Value,
    },
}

/// A decoded Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Session open with timing parameters.
    Open(OpenHandshake),
    /// Session close.
    Close,
    /// Heartbeat probe (optional payload echoed in the pong).
    Ping(String),
    /// Heartbeat reply.
    Pong(String),
    /// Socket.IO payload.
    Message(SocketPacket),
    /// Transport upgrade marker.
    Upgrade,
    /// No-op.
    Noop,
}

impl Frame {
    /// Client namespace connect, optionally carrying an auth payload.
    pub fn connect(auth: Option<Value>) -> Self {
        Self::Message(SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data: auth,
        })
    }

    /// Encode to the text form sent over the WebSocket.
    pub fn encode(&self) -> String {
        match self {
            Self::Open(open) => format!(
                "0{}",
                serde_json::to_string(open).unwrap_or_else(|_| "{}".to_string())
            ),
            Self::Close => "1".to_string(),
            Self::Ping(payload) => format!("2{payload}"),
            Self::Pong(payload) => format!("3{payload}"),
            Self::Message(packet) => format!("4{}", packet.encode()),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }

    /// Decode one WebSocket text message.
    pub fn decode(text: &str) -> TransportResult<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Protocol("empty frame".to_string()))?;
        let body = chars.as_str();

        match kind {
            '0' => serde_json::from_str(body)
                .map(Self::Open)
                .map_err(|e| TransportError::Handshake(format!("bad open packet: {e}"))),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(body.to_string())),
            '3' => Ok(Self::Pong(body.to_string())),
            '4' => SocketPacket::decode(body).map(Self::Message),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(TransportError::Protocol(format!(
                "unknown engine packet type '{other}'"
            ))),
        }
    }
}

impl SocketPacket {
    /// Namespace this packet is addressed to.
    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Decode the Socket.IO part of an Engine.IO message.
    pub fn decode(text: &str) -> TransportResult<Self> {
        let mut rest = text;
        let kind = take_char(&mut rest)
            .ok_or_else(|| TransportError::Protocol("empty socket packet".to_string()))?;

        let namespace = if rest.starts_with('/') {
            let (ns, tail) = rest.split_once(',').unwrap_or((rest, ""));
            rest = tail;
            ns.to_string()
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let (id, tail) = rest.split_at(digits);
            rest = tail;
            Some(
                id.parse::<u64>()
                    .map_err(|e| TransportError::Protocol(format!("bad ack id: {e}")))?,
            )
        } else {
            None
        };

        let payload = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<Value>(rest)
                    .map_err(|e| TransportError::Protocol(format!("bad packet payload: {e}")))?,
            )
        };

        match kind {
            '0' => Ok(Self::Connect {
                namespace,
                data: payload,
            }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let mut args = into_array(payload)?;
                if args.is_empty() {
                    return Err(TransportError::Protocol("event without a name".to_string()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(TransportError::Protocol(format!(
                            "event name must be a string, got {other}"
                        )))
                    }
                };
                Ok(Self::Event {
                    namespace,
                    ack_id,
                    name,
                    args,
                })
            }
            '3' => Ok(Self::Ack {
                namespace,
                ack_id: ack_id
                    .ok_or_else(|| TransportError::Protocol("ack without id".to_string()))?,
                args: into_array(payload)?,
            }),
            '4' => Ok(Self::ConnectError {
                namespace,
                data: payload.unwrap_or(Value::Null),
            }),
            '5' | '6' => Err(TransportError::Protocol(
                "binary packets are not supported".to_string(),
            )),
            other => Err(TransportError::Protocol(format!(
                "unknown socket packet type '{other}'"
            ))),
        }
    }

    /// Encode to the text that follows the Engine.IO `4`.
    pub fn encode(&self) -> String {
        let (kind, namespace, ack_id, payload) = match self {
            Self::Connect { namespace, data } => ('0', namespace, None, data.clone()),
            Self::Disconnect { namespace } => ('1', namespace, None, None),
            Self::Event {
                namespace,
                ack_id,
                name,
                args,
            } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                ('2', namespace, *ack_id, Some(Value::Array(items)))
            }
            Self::Ack {
                namespace,
                ack_id,
                args,
            } => ('3', namespace, Some(*ack_id), Some(Value::Array(args.clone()))),
            Self::ConnectError { namespace, data } => ('4', namespace, None, Some(data.clone())),
        };

        let mut out = String::new();
        out.push(kind);
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(payload) = payload {
            out.push_str(&payload.to_string());
        }
        out
    }

    /// Deserialize the first argument of a named event on the default namespace.
    ///
    /// Returns `None` for any other packet.
    pub fn event_arg<T: serde::de::DeserializeOwned>(
        &self,
        event: &str,
    ) -> Option<TransportResult<T>> {
        match self {
            Self::Event {
                namespace,
                name,
                args,
                ..
            } if namespace == DEFAULT_NAMESPACE && name == event => {
                let first = args.first().cloned().unwrap_or(Value::Null);
                Some(
                    serde_json::from_value(first)
                        .map_err(|e| TransportError::Decode(format!("{event}: {e}"))),
                )
            }
            _ => None,
        }
    }
}

fn take_char(rest: &mut &str) -> Option<char> {
    let mut chars = rest.chars();
    let c = chars.next()?;
    *rest = chars.as_str();
    Some(c)
}

fn into_array(payload: Option<Value>) -> TransportResult<Vec<Value>> {
    match payload {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(TransportError::Protocol(format!(
            "expected array payload, got {other}"
        ))),
    }
}
