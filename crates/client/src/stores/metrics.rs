//! Store holding the latest metrics snapshot.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use opspulse_shared::MetricsSnapshot;

#[derive(Default)]
struct MetricsState {
    snapshot: Option<MetricsSnapshot>,
    updated_at: Option<DateTime<Utc>>,
}

/// Latest snapshot of dashboard measurements.
///
/// The snapshot is replaced wholesale on every update; a failed fallback fetch
/// leaves the last-known snapshot in place.
#[derive(Clone, Default)]
pub struct MetricsStore {
    inner: Arc<RwLock<MetricsState>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole snapshot.
    pub fn replace(&self, snapshot: MetricsSnapshot) {
        let mut state = self.inner.write().expect("metrics store poisoned");
        state.snapshot = Some(snapshot);
        state.updated_at = Some(Utc::now());
    }

    pub fn latest(&self) -> Option<MetricsSnapshot> {
        self.inner
            .read()
            .expect("metrics store poisoned")
            .snapshot
            .clone()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().expect("metrics store poisoned").updated_at
    }

    /// Drop all data, e.g. on logout.
    pub fn clear(&self) {
        let mut state = self.inner.write().expect("metrics store poisoned");
        state.snapshot = None;
        state.updated_at = None;
    }
}
