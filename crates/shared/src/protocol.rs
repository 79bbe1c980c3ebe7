//! Wire protocol for the real-time metrics channel.
//!
//! Both directions carry flat JSON objects tagged by a `type` field:
//! `{"type":"ping"}`, `{"type":"subscribe","channel":"metrics"}`,
//! `{"type":"metrics","payload":{...}}` and so on.

use serde::{Deserialize, Serialize};

use crate::models::{Anomaly, Experiment, MetricsSnapshot, RemediationAction};

/// Default WebSocket endpoint served by the dashboard API.
pub const DEFAULT_WS_URL: &str = "ws://localhost:3001/metrics";

/// Close code sent when the client disconnects deliberately. Lets the server
/// (and our own logs) tell a manual disconnect apart from a dropped link.
pub const MANUAL_DISCONNECT_CODE: u16 = 4000;
pub const MANUAL_DISCONNECT_REASON: &str = "manual disconnect";

/// Messages sent from the client to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Heartbeat keep-alive.
    Ping,
    Subscribe { channel: String },
    /// Ask the server to push a fresh snapshot for a channel.
    Refresh { channel: String },
}

/// Messages pushed from the server to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Heartbeat acknowledgment. Consumed by the connection layer and never
    /// forwarded to subscribers.
    Pong,
    Metrics { payload: MetricsSnapshot },
    Anomalies { items: Vec<Anomaly> },
    Experiments { items: Vec<Experiment> },
    Remediations { items: Vec<RemediationAction> },
}

impl ServerEvent {
    /// True for heartbeat acks, which the transport layer swallows.
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, ServerEvent::Pong)
    }
}
