//! User-facing notifications derived from collection growth.
//!
//! After each refresh the center compares the new item count of a tracked
//! collection against the previous one and raises a notification only when the
//! delta meets that collection's threshold. The first observation of a
//! collection only seeds the baseline.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Tracked dashboard collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Anomalies,
    Experiments,
    Remediations,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Anomalies => write!(f, "anomalies"),
            Category::Experiments => write!(f, "experiments"),
            Category::Remediations => write!(f, "remediation actions"),
        }
    }
}

/// Per-category minimum delta required to raise a notification.
#[derive(Debug, Clone, Default)]
pub struct NotificationPolicy {
    thresholds: HashMap<Category, usize>,
}

impl NotificationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, category: Category, min_delta: usize) -> Self {
        self.thresholds.insert(category, min_delta);
        self
    }

    /// Threshold for a category; any growth notifies unless configured higher.
    pub fn threshold(&self, category: Category) -> usize {
        self.thresholds.get(&category).copied().unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub category: Category,
    /// How many items appeared since the previous observation.
    pub delta: usize,
    /// Current item count for the category.
    pub total: usize,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Default)]
struct CenterState {
    counts: HashMap<Category, usize>,
    pending: Vec<Notification>,
}

/// Tracks collection counts and queues notifications for the UI to drain.
pub struct NotificationCenter {
    policy: NotificationPolicy,
    state: Mutex<CenterState>,
}

impl NotificationCenter {
    pub fn new(policy: NotificationPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(CenterState::default()),
        }
    }

    /// Record the current item count for a category. Returns the notification
    /// raised, if any; it is also queued for [`NotificationCenter::drain`].
    pub fn observe(&self, category: Category, count: usize) -> Option<Notification> {
        let mut state = self.state.lock().expect("notification center poisoned");
        let previous = state.counts.insert(category, count)?;
        let delta = count.saturating_sub(previous);
        if delta == 0 || delta < self.policy.threshold(category) {
            return None;
        }
        let notification = Notification {
            id: Uuid::new_v4(),
            category,
            delta,
            total: count,
            message: format!("{delta} new {category}"),
            raised_at: Utc::now(),
        };
        state.pending.push(notification.clone());
        Some(notification)
    }

    /// Take all queued notifications.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(
            &mut self
                .state
                .lock()
                .expect("notification center poisoned")
                .pending,
        )
    }

    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .expect("notification center poisoned")
            .pending
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_seeds_baseline() {
        let center = NotificationCenter::new(NotificationPolicy::new());
        assert!(center.observe(Category::Anomalies, 5).is_none());
        assert_eq!(center.pending(), 0);
    }

    #[test]
    fn growth_meeting_threshold_notifies() {
        let center = NotificationCenter::new(NotificationPolicy::new());
        center.observe(Category::Anomalies, 2);
        let notification = center.observe(Category::Anomalies, 3).unwrap();
        assert_eq!(notification.delta, 1);
        assert_eq!(notification.total, 3);
        assert_eq!(center.drain().len(), 1);
        assert_eq!(center.pending(), 0);
    }

    #[test]
    fn growth_below_threshold_is_silent() {
        let policy = NotificationPolicy::new().with_threshold(Category::Experiments, 3);
        let center = NotificationCenter::new(policy);
        center.observe(Category::Experiments, 0);
        assert!(center.observe(Category::Experiments, 2).is_none());
        // Delta is measured against the latest observation, not the last
        // notification.
        assert!(center.observe(Category::Experiments, 4).is_none());
        assert!(center.observe(Category::Experiments, 7).is_some());
    }

    #[test]
    fn shrinking_collection_never_notifies() {
        let center = NotificationCenter::new(NotificationPolicy::new());
        center.observe(Category::Remediations, 4);
        assert!(center.observe(Category::Remediations, 1).is_none());
        // Baseline moved down, so modest regrowth notifies again.
        assert!(center.observe(Category::Remediations, 2).is_some());
    }

    #[test]
    fn categories_are_independent() {
        let policy = NotificationPolicy::new()
            .with_threshold(Category::Anomalies, 1)
            .with_threshold(Category::Experiments, 5);
        let center = NotificationCenter::new(policy);
        center.observe(Category::Anomalies, 0);
        center.observe(Category::Experiments, 0);

        assert!(center.observe(Category::Anomalies, 1).is_some());
        assert!(center.observe(Category::Experiments, 1).is_none());
    }
}
