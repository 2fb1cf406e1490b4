//! Labeled interval events.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::duration::Duration;
use crate::interval::Interval;

/// A labeled span of activity read from a bucket.
///
/// Events are values: filters that change an event build a new one rather
/// than editing the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// When the activity started.
    pub timestamp: DateTime<Utc>,
    /// How long the activity lasted.
    pub duration: Duration,
    /// Labels in their original order.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Opaque payload.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Event {
    /// Creates an unlabeled event with an empty payload.
    pub fn new(timestamp: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            timestamp,
            duration,
            labels: Vec::new(),
            data: Map::new(),
        }
    }

    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// The effective interval `[timestamp, timestamp + duration)`.
    pub fn interval(&self) -> Interval {
        Interval::starting_at(self.timestamp, self.duration)
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.interval().end()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn has_any_label(&self, labels: &BTreeSet<String>) -> bool {
        self.labels.iter().any(|l| labels.contains(l))
    }

    /// A copy of this event restricted to `interval`.
    ///
    /// Labels and payload are kept; timing comes from `interval`.
    #[must_use]
    pub fn restricted_to(&self, interval: Interval) -> Self {
        Self {
            timestamp: interval.start(),
            duration: interval.duration(),
            labels: self.labels.clone(),
            data: self.data.clone(),
        }
    }
}
