//! Connection state types and the read-only status projection.

/// Lifecycle state of a real-time connection.
///
/// Exactly one state is active at a time; transitions are driven only by the
/// controller task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The retry budget is exhausted and the poller is substituting for the
    /// socket.
    Fallback,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }
}

/// Read-only projection of the controller's state, published over a watch
/// channel. Consumers display it; they never mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Last connection-level error, cleared on successful (re)connect.
    pub error: Option<String>,
    /// Reconnect attempt currently in flight (0 outside of retries).
    pub reconnect_attempts: u32,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            error: None,
            reconnect_attempts: 0,
        }
    }
}
