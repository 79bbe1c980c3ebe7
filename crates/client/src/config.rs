//! Connection configuration.

use std::time::Duration;

use opspulse_shared::DEFAULT_WS_URL;

/// Backoff delays never exceed this, regardless of attempt count.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Configuration for a real-time connection.
///
/// Supplied once at construction and immutable for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Optional WebSocket sub-protocols.
    pub protocols: Vec<String>,
    /// Base delay between reconnect attempts; doubles per attempt.
    pub reconnect_interval: Duration,
    /// Failed reconnects tolerated before giving up on the socket path.
    pub max_reconnect_attempts: u32,
    /// How often to send a heartbeat ping while connected.
    pub heartbeat_interval: Duration,
    /// How long a connect attempt may take before it is aborted.
    pub connect_timeout: Duration,
    /// Polling cadence once the fallback poller takes over.
    pub fallback_interval: Duration,
    /// REST endpoint serving the same logical snapshot as the socket.
    /// `None` disables fallback polling entirely.
    pub fallback_endpoint: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            protocols: Vec::new(),
            reconnect_interval: Duration::from_millis(1000),
            max_reconnect_attempts: 5,
            heartbeat_interval: Duration::from_millis(30_000),
            connect_timeout: Duration::from_millis(10_000),
            fallback_interval: Duration::from_millis(5_000),
            fallback_endpoint: None,
        }
    }
}

impl ConnectionConfig {
    /// Defaults used by the metrics feed: a tighter retry budget so the
    /// dashboard falls back to polling sooner, and fallback enabled.
    pub fn metrics_feed() -> Self {
        Self {
            max_reconnect_attempts: 3,
            fallback_endpoint: Some("http://localhost:3001/api/metrics/snapshot".to_string()),
            ..Self::default()
        }
    }

    /// Read endpoint overrides from the environment.
    ///
    /// `OPSPULSE_WS_URL` overrides the socket endpoint and
    /// `OPSPULSE_FALLBACK_URL` the REST snapshot endpoint.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("OPSPULSE_WS_URL") {
            config.url = url;
        }
        if let Ok(url) = std::env::var("OPSPULSE_FALLBACK_URL") {
            config.fallback_endpoint = Some(url);
        }
        config
    }

    /// Delay before reconnect attempt number `attempt` (zero-based),
    /// exponential with a 30s cap: `min(reconnect_interval * 2^attempt, 30s)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.reconnect_interval.as_millis() as u64;
        let delay = base.saturating_mul(1u64 << attempt.min(20));
        Duration::from_millis(delay.min(MAX_BACKOFF_MS))
    }
}
