//! The metrics feed: wires a realtime client into the data stores.
//!
//! One feed serves one dashboard. It owns the [`MetricsStore`] and the
//! [`NotificationCenter`], keeps the channel subscription alive across
//! reconnects, and absorbs events the same way whether they arrived over the
//! socket or from the fallback poller.

use std::sync::Arc;

use opspulse_shared::{ClientCommand, MetricsSnapshot, ServerEvent};

use crate::config::ConnectionConfig;
use crate::stores::{Category, MetricsStore, NotificationCenter, NotificationPolicy};
use crate::ws::{ConnectionStatus, HandlerGuard, RealtimeClient};

pub struct MetricsFeed {
    client: RealtimeClient,
    store: MetricsStore,
    notifications: Arc<NotificationCenter>,
    resubscribe: tokio::task::JoinHandle<()>,
    _handler: HandlerGuard,
}

impl MetricsFeed {
    /// Spawn a client for `config` and feed `channel` into the stores.
    pub fn new(config: ConnectionConfig, channel: impl Into<String>) -> Self {
        Self::with_client(RealtimeClient::new(config), channel)
    }

    /// Attach to an existing client, e.g. one shared with other feeds.
    pub fn with_client(client: RealtimeClient, channel: impl Into<String>) -> Self {
        let channel = channel.into();
        let store = MetricsStore::new();
        let notifications = Arc::new(NotificationCenter::new(NotificationPolicy::new()));

        let handler_store = store.clone();
        let handler_notifications = notifications.clone();
        let handler = client.add_message_handler(move |event| match event {
            ServerEvent::Metrics { payload } => handler_store.replace(payload.clone()),
            ServerEvent::Anomalies { items } => {
                handler_notifications.observe(Category::Anomalies, items.len());
            }
            ServerEvent::Experiments { items } => {
                handler_notifications.observe(Category::Experiments, items.len());
            }
            ServerEvent::Remediations { items } => {
                handler_notifications.observe(Category::Remediations, items.len());
            }
            // Swallowed by the connection layer already.
            ServerEvent::Pong => {}
        });

        // Subscriptions do not survive a reconnect server-side, so re-issue
        // ours every time the connection comes up.
        let subscriber = client.clone();
        let subscribe_channel = channel;
        let resubscribe = tokio::spawn(async move {
            let mut status = subscriber.watch_status();
            loop {
                let connected = status.borrow().state.is_connected();
                if connected {
                    tracing::debug!("subscribing to {subscribe_channel}");
                    subscriber.send(ClientCommand::Subscribe {
                        channel: subscribe_channel.clone(),
                    });
                }
                if status.changed().await.is_err() {
                    return;
                }
            }
        });

        Self {
            client,
            store,
            notifications,
            resubscribe,
            _handler: handler,
        }
    }

    pub fn connect(&self) {
        self.client.connect();
    }

    pub fn disconnect(&self) {
        self.client.disconnect();
    }

    /// Ask the server to push a fresh snapshot. Dropped unless connected.
    pub fn refresh(&self, channel: impl Into<String>) {
        self.client.send(ClientCommand::Refresh {
            channel: channel.into(),
        });
    }

    pub fn latest(&self) -> Option<MetricsSnapshot> {
        self.store.latest()
    }

    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn status(&self) -> ConnectionStatus {
        self.client.status()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn client(&self) -> &RealtimeClient {
        &self.client
    }
}

impl Drop for MetricsFeed {
    fn drop(&mut self) {
        // The resubscribe task holds a client clone; reap it so the
        // controller can shut down once every other handle is gone.
        self.resubscribe.abort();
    }
}
