//! Reconnection controller.
//!
//! A single task owns the connection lifecycle; consumers talk to it through
//! a command channel and read the status projection from a watch channel.
//! Because every timer (retry delay, heartbeat, poll interval, connect
//! timeout) lives in a `select!` arm alongside the command channel, a manual
//! `disconnect()` always cancels whatever the controller is waiting on.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use opspulse_shared::{
    ClientCommand, ServerEvent, MANUAL_DISCONNECT_CODE, MANUAL_DISCONNECT_REASON,
};

use crate::config::ConnectionConfig;

use super::connection::{ConnectionState, ConnectionStatus};
use super::fallback::{RestSnapshotSource, SnapshotSource};
use super::subscriptions::{HandlerGuard, HandlerRegistry};
use super::transport::{LinkCommand, LinkEvent, SocketConnector, SocketLink, TransportError, WsConnector};

const CONNECTION_LOST: &str = "Connection lost";

enum Command {
    Connect,
    Disconnect,
    Send(ClientCommand),
}

/// Handle to a managed real-time connection.
///
/// Cloning is cheap; all clones talk to the same controller task. The task
/// shuts down when the last clone is dropped.
#[derive(Clone)]
pub struct RealtimeClient {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    handlers: HandlerRegistry,
}

impl RealtimeClient {
    /// Spawn a controller for `config` using the tokio-tungstenite transport.
    ///
    /// Must be called from within a tokio runtime. The client starts out
    /// disconnected; call [`RealtimeClient::connect`] to open the channel.
    pub fn new(config: ConnectionConfig) -> Self {
        let fallback: Option<Arc<dyn SnapshotSource>> = config
            .fallback_endpoint
            .as_deref()
            .map(|endpoint| Arc::new(RestSnapshotSource::new(endpoint)) as Arc<dyn SnapshotSource>);
        Self::with_connector(config, Arc::new(WsConnector), fallback)
    }

    /// Construction seam for alternative transports and tests.
    pub fn with_connector(
        config: ConnectionConfig,
        connector: Arc<dyn SocketConnector>,
        fallback: Option<Arc<dyn SnapshotSource>>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let handlers = HandlerRegistry::new();

        let controller = Controller {
            config,
            connector,
            fallback,
            handlers: handlers.clone(),
            commands: command_rx,
            status: status_tx,
            error: None,
        };
        tokio::spawn(controller.run());

        Self {
            commands: command_tx,
            status: status_rx,
            handlers,
        }
    }

    /// Request a connection. A no-op while already connecting or connected;
    /// from fallback it retries the socket path with a fresh budget.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Tear the connection down from any state: cancels pending retries,
    /// stops heartbeat and polling, and closes a live socket with the manual
    /// disconnect code.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Send a command to the server. Silently dropped unless connected;
    /// consumers are expected to re-issue subscriptions after a reconnect.
    pub fn send(&self, command: ClientCommand) {
        let _ = self.commands.send(Command::Send(command));
    }

    /// Register a handler for every non-heartbeat event, from socket or poll.
    pub fn add_message_handler(
        &self,
        handler: impl Fn(&ServerEvent) + Send + Sync + 'static,
    ) -> HandlerGuard {
        self.handlers.add(handler)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Watch channel mirroring the status projection.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().state.is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.status.borrow().state.is_connecting()
    }

    pub fn error(&self) -> Option<String> {
        self.status.borrow().error.clone()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.status.borrow().reconnect_attempts
    }
}

enum Attempt {
    Open(SocketLink),
    Failed(TransportError),
    Cancelled,
    Shutdown,
}

enum SessionEnd {
    /// Explicit `disconnect()`.
    Manual,
    /// Peer sent a close frame; not an error, no retry.
    Clean,
    /// Link dropped without a close frame; retry path.
    Lost,
    /// All client handles dropped.
    Shutdown,
}

enum FallbackEnd {
    Reconnect,
    Manual,
    Shutdown,
}

enum Wait {
    Elapsed,
    Cancelled,
    Shutdown,
}

struct Controller {
    config: ConnectionConfig,
    connector: Arc<dyn SocketConnector>,
    fallback: Option<Arc<dyn SnapshotSource>>,
    handlers: HandlerRegistry,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<ConnectionStatus>,
    error: Option<String>,
}

impl Controller {
    async fn run(mut self) {
        'idle: loop {
            // Disconnected: wait for an explicit connect. The last error is
            // kept visible until the next successful connection.
            loop {
                match self.commands.recv().await {
                    None => return,
                    Some(Command::Connect) => break,
                    Some(Command::Disconnect) => {}
                    Some(Command::Send(command)) => {
                        tracing::debug!("dropping {command:?}: not connected");
                    }
                }
            }

            let mut attempts: u32 = 0;
            self.publish(ConnectionState::Connecting, self.error.clone(), 0);

            'attempt: loop {
                match self.try_connect().await {
                    Attempt::Open(link) => {
                        attempts = 0;
                        self.error = None;
                        self.publish(ConnectionState::Connected, None, 0);
                        match self.run_session(link).await {
                            SessionEnd::Manual => {
                                self.error = None;
                                self.publish(ConnectionState::Disconnected, None, 0);
                                continue 'idle;
                            }
                            SessionEnd::Clean => {
                                tracing::info!("connection closed by server");
                                self.publish(ConnectionState::Disconnected, None, 0);
                                continue 'idle;
                            }
                            SessionEnd::Shutdown => return,
                            SessionEnd::Lost => {
                                tracing::warn!("connection lost, entering retry");
                                self.error = Some(CONNECTION_LOST.to_string());
                            }
                        }
                    }
                    Attempt::Failed(e) => {
                        tracing::warn!("connect attempt failed: {e}");
                        self.error = Some(e.to_string());
                    }
                    Attempt::Cancelled => {
                        self.error = None;
                        self.publish(ConnectionState::Disconnected, None, 0);
                        continue 'idle;
                    }
                    Attempt::Shutdown => return,
                }

                // Retry path: budget first, then backoff.
                if attempts >= self.config.max_reconnect_attempts {
                    let Some(source) = self.fallback.clone() else {
                        tracing::error!(
                            "giving up after {} reconnect attempts, no fallback configured",
                            self.config.max_reconnect_attempts
                        );
                        self.publish(ConnectionState::Disconnected, self.error.clone(), 0);
                        continue 'idle;
                    };
                    match self.run_fallback(source).await {
                        FallbackEnd::Reconnect => {
                            attempts = 0;
                            self.publish(ConnectionState::Connecting, self.error.clone(), 0);
                            continue 'attempt;
                        }
                        FallbackEnd::Manual => {
                            self.error = None;
                            self.publish(ConnectionState::Disconnected, None, 0);
                            continue 'idle;
                        }
                        FallbackEnd::Shutdown => return,
                    }
                }

                let delay = self.config.backoff_delay(attempts);
                attempts += 1;
                tracing::info!(
                    "reconnecting in {}ms (attempt {attempts}/{})",
                    delay.as_millis(),
                    self.config.max_reconnect_attempts
                );
                self.publish(ConnectionState::Connecting, self.error.clone(), attempts);
                match self.wait_retry(delay).await {
                    Wait::Elapsed => {}
                    Wait::Cancelled => {
                        self.error = None;
                        self.publish(ConnectionState::Disconnected, None, 0);
                        continue 'idle;
                    }
                    Wait::Shutdown => return,
                }
            }
        }
    }

    /// One connect attempt, bounded by the connect timeout and cancellable by
    /// `disconnect()`.
    async fn try_connect(&mut self) -> Attempt {
        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        let protocols = self.config.protocols.clone();
        let timeout = self.config.connect_timeout;
        let attempt = async move {
            tokio::time::timeout(timeout, connector.connect(&url, &protocols)).await
        };
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return match result {
                        Ok(Ok(link)) => Attempt::Open(link),
                        Ok(Err(e)) => Attempt::Failed(e),
                        Err(_) => Attempt::Failed(TransportError::Timeout),
                    };
                }
                command = self.commands.recv() => match command {
                    None => return Attempt::Shutdown,
                    Some(Command::Disconnect) => return Attempt::Cancelled,
                    Some(Command::Connect) => {}
                    Some(Command::Send(command)) => {
                        tracing::debug!("dropping {command:?}: not connected");
                    }
                }
            }
        }
    }

    /// Runs a live connection: heartbeat, inbound dispatch, outbound sends.
    async fn run_session(&mut self, mut link: SocketLink) -> SessionEnd {
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    match serde_json::to_string(&ClientCommand::Ping) {
                        Ok(json) => {
                            let _ = link.commands.send(LinkCommand::Text(json));
                        }
                        Err(e) => tracing::error!("failed to serialize ping: {e}"),
                    }
                }
                event = link.events.recv() => match event {
                    None => return SessionEnd::Lost,
                    Some(LinkEvent::Event(event)) => {
                        if event.is_heartbeat() {
                            tracing::trace!("heartbeat ack");
                        } else {
                            self.handlers.dispatch(&event);
                        }
                    }
                    Some(LinkEvent::Closed { clean: true }) => return SessionEnd::Clean,
                    Some(LinkEvent::Closed { clean: false }) => return SessionEnd::Lost,
                },
                command = self.commands.recv() => match command {
                    None => {
                        close_link(&link);
                        return SessionEnd::Shutdown;
                    }
                    Some(Command::Disconnect) => {
                        close_link(&link);
                        return SessionEnd::Manual;
                    }
                    Some(Command::Connect) => {}
                    Some(Command::Send(command)) => match serde_json::to_string(&command) {
                        Ok(json) => {
                            let _ = link.commands.send(LinkCommand::Text(json));
                        }
                        Err(e) => tracing::error!("failed to serialize {command:?}: {e}"),
                    },
                }
            }
        }
    }

    /// Polls the REST snapshot endpoint until a reconnect is requested or the
    /// client disconnects. Poll failures are logged and change nothing.
    async fn run_fallback(&mut self, source: Arc<dyn SnapshotSource>) -> FallbackEnd {
        tracing::warn!(
            "retry budget exhausted, polling fallback every {}ms",
            self.config.fallback_interval.as_millis()
        );
        self.publish(
            ConnectionState::Fallback,
            self.error.clone(),
            self.config.max_reconnect_attempts,
        );

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.fallback_interval,
            self.config.fallback_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => match source.fetch().await {
                    Ok(payload) => self.handlers.dispatch(&ServerEvent::Metrics { payload }),
                    Err(e) => tracing::warn!("fallback refresh failed: {e}"),
                },
                command = self.commands.recv() => match command {
                    None => return FallbackEnd::Shutdown,
                    Some(Command::Connect) => return FallbackEnd::Reconnect,
                    Some(Command::Disconnect) => return FallbackEnd::Manual,
                    Some(Command::Send(command)) => {
                        tracing::debug!("dropping {command:?}: not connected");
                    }
                }
            }
        }
    }

    /// Backoff sleep that `disconnect()` can cancel.
    async fn wait_retry(&mut self, delay: std::time::Duration) -> Wait {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Wait::Elapsed,
                command = self.commands.recv() => match command {
                    None => return Wait::Shutdown,
                    Some(Command::Disconnect) => return Wait::Cancelled,
                    Some(Command::Connect) => {}
                    Some(Command::Send(command)) => {
                        tracing::debug!("dropping {command:?}: not connected");
                    }
                }
            }
        }
    }

    fn publish(&self, state: ConnectionState, error: Option<String>, reconnect_attempts: u32) {
        self.status.send_replace(ConnectionStatus {
            state,
            error,
            reconnect_attempts,
        });
    }
}

fn close_link(link: &SocketLink) {
    let _ = link.commands.send(LinkCommand::Close {
        code: MANUAL_DISCONNECT_CODE,
        reason: MANUAL_DISCONNECT_REASON.to_string(),
    });
}
