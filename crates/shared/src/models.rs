//! Data models for the OpsPulse dashboard.
//!
//! Everything here crosses the wire as JSON, so the field casing matches what
//! the dashboard API serves (`camelCase`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Metrics ---

/// Qualitative health rating attached to a measurement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MetricStatus {
    Healthy,
    Warning,
    Critical,
}

/// A single named measurement at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub status: MetricStatus,
}

/// Full set of dashboard measurements, keyed by metric name.
///
/// Consumers replace the whole snapshot on every update; individual points are
/// never patched in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub metrics: HashMap<String, MetricPoint>,
}

impl MetricsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MetricPoint> {
        self.metrics.get(name)
    }
}

// --- Anomaly management ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub id: String,
    /// Name of the metric the anomaly was detected on.
    pub metric: String,
    pub severity: AnomalySeverity,
    pub description: String,
    pub detected_at: DateTime<Utc>,
}

// --- ML experiment tracking ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ExperimentStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub status: ExperimentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

// --- Automated remediation ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RemediationStatus {
    Pending,
    Approved,
    Executed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemediationAction {
    pub id: String,
    /// The anomaly this action was raised for.
    pub anomaly_id: String,
    /// Human-readable description of the remediation, e.g. "restart pod".
    pub action: String,
    pub status: RemediationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}
