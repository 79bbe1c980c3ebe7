//! Real-time connection management.
//!
//! This module provides:
//! - Connection lifecycle with auto-reconnect and exponential backoff
//! - Heartbeat keep-alive over the socket
//! - REST fallback polling once the retry budget is exhausted
//! - A handler registry that delivers events regardless of their source
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 RealtimeClient                   │
//! │  (public surface: connect/disconnect/send/       │
//! │   add_message_handler/status)                    │
//! └──────────────────────────────────────────────────┘
//!                        │ commands / watch
//!                        ▼
//! ┌──────────────────────────────────────────────────┐
//! │               controller task                    │
//! │  disconnected → connecting → connected           │
//! │        ▲             │  budget exhausted         │
//! │        └─────────────┴──────────► fallback       │
//! └──────────────────────────────────────────────────┘
//!          │                             │
//!          ▼                             ▼
//!   ┌──────────────┐            ┌────────────────┐
//!   │ SocketLink   │            │ SnapshotSource │
//!   │ (tungstenite)│            │ (REST polling) │
//!   └──────────────┘            └────────────────┘
//!          │                             │
//!          └──────────────┬──────────────┘
//!                         ▼
//!               ┌──────────────────┐
//!               │ HandlerRegistry  │
//!               │ (UI subscribers) │
//!               └──────────────────┘
//! ```
//!
//! Consumers never see the socket or the poller; they register handlers and
//! read the [`ConnectionStatus`] projection.

mod connection;
mod controller;
mod fallback;
mod subscriptions;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use connection::{ConnectionState, ConnectionStatus};
pub use controller::RealtimeClient;
pub use fallback::{RestSnapshotSource, SnapshotSource};
pub use subscriptions::{HandlerGuard, HandlerRegistry};
pub use transport::{LinkCommand, LinkEvent, SocketConnector, SocketLink, TransportError, WsConnector};
