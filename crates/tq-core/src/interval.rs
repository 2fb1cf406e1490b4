//! Half-open time intervals.

use chrono::{DateTime, Utc};

use crate::duration::Duration;
use crate::types::ValidationError;

/// A half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvertedInterval);
        }
        Ok(Self { start, end })
    }

    /// The interval starting at `start` and lasting `duration`.
    ///
    /// Ends that would overflow the calendar are clamped to the latest
    /// representable instant.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Self {
        let end = start
            .checked_add_signed(duration.as_time_delta())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        Duration::saturating_from_time_delta(self.end - self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the overlap of two intervals, if any.
    ///
    /// Intervals that only touch at an endpoint do not overlap, and an empty
    /// interval overlaps nothing.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Self { start, end })
    }

    /// Whether the interval falls inside a scan window `[start, end)`.
    ///
    /// Missing bounds are unbounded. An empty interval counts as the point at
    /// its start, so it is kept when `start <= point < end`.
    pub fn overlaps_window(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
        if end.is_some_and(|end| self.start >= end) {
            return false;
        }
        match start {
            Some(start) => self.end > start || self.start >= start,
            None => true,
        }
    }
}
