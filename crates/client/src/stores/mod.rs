//! Client-side data stores.
//!
//! Stores are the single source of truth for dashboard data. The real-time
//! layer writes into them (from socket events or fallback polls alike) and UI
//! consumers read from them; consumers never subscribe to raw socket traffic.

pub mod metrics;
pub mod notifications;

pub use metrics::MetricsStore;
pub use notifications::{Category, Notification, NotificationCenter, NotificationPolicy};
