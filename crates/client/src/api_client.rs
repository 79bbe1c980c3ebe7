//! HTTP client for the dashboard REST API.
//!
//! The socket path is primary; this client serves the fallback poller and the
//! initial page loads (anomaly lists, experiment tables).

use opspulse_shared::{Anomaly, ApiError, Experiment, MetricsSnapshot, RemediationAction};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for making requests against a dashboard API host.
#[derive(Debug, Clone, Default)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL for API requests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Attach a bearer token to every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    /// Make a GET request and decode the JSON response.
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let url = self.url(path);
        let mut rb = self.client.get(&url);
        if let Some(token) = &self.token {
            rb = rb.bearer_auth(token);
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    // --- Dashboard endpoints ---

    /// The REST rendition of the snapshot the socket pushes.
    pub async fn metrics_snapshot(&self) -> Result<MetricsSnapshot, ApiError> {
        self.get_json("/api/metrics/snapshot").await
    }

    pub async fn anomalies(&self) -> Result<Vec<Anomaly>, ApiError> {
        self.get_json("/api/anomalies").await
    }

    pub async fn experiments(&self) -> Result<Vec<Experiment>, ApiError> {
        self.get_json("/api/mlops/experiments").await
    }

    pub async fn remediations(&self) -> Result<Vec<RemediationAction>, ApiError> {
        self.get_json("/api/remediations").await
    }
}
