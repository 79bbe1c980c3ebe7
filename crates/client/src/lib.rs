//! OpsPulse client - the real-time data layer behind the CloudOps dashboard.
//!
//! This crate owns everything between the dashboard UI and the backend API:
//! the reconnecting WebSocket client, the REST fallback poller, the
//! subscription/notification layer, and the session store. It is deliberately
//! UI-framework agnostic; whatever renders the dashboard only ever reads the
//! derived status projection and the data stores.

pub mod api_client;
pub mod config;
pub mod feed;
pub mod session;
pub mod stores;
pub mod ws;

pub use api_client::ApiClient;
pub use config::ConnectionConfig;
pub use feed::MetricsFeed;
pub use session::{Session, SessionStore};
pub use stores::{Category, MetricsStore, Notification, NotificationCenter, NotificationPolicy};
pub use ws::{ConnectionState, ConnectionStatus, HandlerGuard, RealtimeClient};
