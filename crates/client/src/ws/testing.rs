//! Scripted transport and fallback doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use opspulse_shared::{ApiError, MetricsSnapshot};

use super::connection::{ConnectionState, ConnectionStatus};
use super::controller::RealtimeClient;
use super::fallback::SnapshotSource;
use super::transport::{LinkCommand, LinkEvent, SocketConnector, SocketLink, TransportError};

/// What the next connect attempt should do.
pub(crate) enum Script {
    Fail,
    Open,
    Hang,
}

/// Server side of a scripted [`SocketLink`].
pub(crate) struct TestLink {
    pub events: mpsc::UnboundedSender<LinkEvent>,
    pub commands: mpsc::UnboundedReceiver<LinkCommand>,
}

/// Connector that follows a script and records when it was called.
/// Once the script runs out, every further attempt fails.
pub(crate) struct ScriptedConnector {
    script: Mutex<VecDeque<Script>>,
    connects: Mutex<Vec<Instant>>,
    links: mpsc::UnboundedSender<TestLink>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Script>) -> (Arc<Self>, mpsc::UnboundedReceiver<TestLink>) {
        let (links, links_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(script.into()),
            connects: Mutex::new(Vec::new()),
            links,
        });
        (connector, links_rx)
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl SocketConnector for ScriptedConnector {
    async fn connect(&self, _url: &str, _protocols: &[String]) -> Result<SocketLink, TransportError> {
        self.connects.lock().unwrap().push(Instant::now());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Fail);
        // Yield so status watchers observe the Connecting publish before the
        // attempt resolves.
        tokio::task::yield_now().await;
        match step {
            Script::Fail => Err(TransportError::Connect("connection refused".to_string())),
            Script::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Script::Open => {
                let (event_tx, event_rx) = mpsc::unbounded_channel();
                let (command_tx, command_rx) = mpsc::unbounded_channel();
                let _ = self.links.send(TestLink {
                    events: event_tx,
                    commands: command_rx,
                });
                Ok(SocketLink {
                    events: event_rx,
                    commands: command_tx,
                })
            }
        }
    }
}

/// Snapshot source that always succeeds and records fetch times.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    fetches: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fetch_times(&self) -> Vec<Instant> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch(&self) -> Result<MetricsSnapshot, ApiError> {
        self.fetches.lock().unwrap().push(Instant::now());
        Ok(MetricsSnapshot::default())
    }
}

/// Snapshot source that always fails.
#[derive(Default)]
pub(crate) struct FailingSource {
    fetches: Mutex<Vec<Instant>>,
}

impl FailingSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl SnapshotSource for FailingSource {
    async fn fetch(&self) -> Result<MetricsSnapshot, ApiError> {
        self.fetches.lock().unwrap().push(Instant::now());
        Err(ApiError::Network("connection refused".to_string()))
    }
}

/// Record every status change published after this call.
pub(crate) fn collect_statuses(client: &RealtimeClient) -> Arc<Mutex<Vec<ConnectionStatus>>> {
    let mut rx = client.watch_status();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let out = seen.clone();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            out.lock().unwrap().push(rx.borrow().clone());
        }
    });
    seen
}

/// Block until the client reports `state`.
pub(crate) async fn wait_for_state(client: &RealtimeClient, state: ConnectionState) {
    let mut rx = client.watch_status();
    loop {
        if rx.borrow().state == state {
            return;
        }
        rx.changed().await.expect("controller task ended");
    }
}
