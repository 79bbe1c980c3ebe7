//! Fallback data source: the REST endpoint the poller hits when the socket
//! path is exhausted.
//!
//! The polling schedule itself lives in the controller so that the poller and
//! the transport can never run concurrently; this module only supplies the
//! fetch seam and its production implementation.

use async_trait::async_trait;

use opspulse_shared::{ApiError, MetricsSnapshot};

use crate::api_client::ApiClient;

/// Anything that can produce the logical snapshot the socket would have
/// pushed.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<MetricsSnapshot, ApiError>;
}

/// Production source: GET the configured snapshot endpoint.
pub struct RestSnapshotSource {
    api: ApiClient,
    endpoint: String,
}

impl RestSnapshotSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            api: ApiClient::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for RestSnapshotSource {
    async fn fetch(&self) -> Result<MetricsSnapshot, ApiError> {
        self.api.get_json(&self.endpoint).await
    }
}
