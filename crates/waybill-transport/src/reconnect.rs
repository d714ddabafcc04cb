//! Reconnect policy and connection state for the push channel
//!
//! Reconnection uses a fixed delay and a bounded number of attempts. Once
//! the budget is spent the channel settles in [`ConnectionState::GaveUp`]
//! and stays there until the hub is restarted by a fresh first attach.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use waybill_core::LiveConfig;

/// Fixed-delay, bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Reconnection attempts after a lost or failed connection
    pub max_attempts: u32,
    /// Wait before each attempt
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&LiveConfig::default())
    }
}

impl ReconnectPolicy {
    /// Policy described by the live channel settings.
    pub fn from_config(config: &LiveConfig) -> Self {
        Self {
            max_attempts: config.reconnection_attempts,
            delay: config.reconnection_delay(),
        }
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            delay: Duration::ZERO,
        }
    }

    /// Delay before the 1-based `attempt`, or `None` once the budget is spent.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        (attempt >= 1 && attempt <= self.max_attempts).then_some(self.delay)
    }
}

/// Observable state of the shared push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// No listener has attached, or the channel was released
    Idle,
    /// First connection attempt in flight
    Connecting,
    /// Connected and receiving events
    Connected,
    /// Waiting for or running a reconnection attempt
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
    },
    /// The retry budget is exhausted
    GaveUp,
}

impl ConnectionState {
    /// Whether events can currently arrive.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Short label for status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting { .. } => "reconnecting",
            Self::GaveUp => "gave up",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Counters for push channel activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectStats {
    /// Connections opened successfully
    pub connections: u64,
    /// Reconnection attempts made
    pub reconnect_attempts: u64,
    /// Reconnections that succeeded
    pub successful_reconnects: u64,
    /// Times the retry budget ran out
    pub gave_up: u64,
    /// Notification events delivered to listeners
    pub events_delivered: u64,
    /// Events dropped because they failed to decode
    pub events_dropped: u64,
}
