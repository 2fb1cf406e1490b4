//! Query results: plain event lists and per-label chunk reports.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::duration::Duration;
use crate::event::Event;

/// The outcome of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    EventList(EventList),
    Chunked(ChunkReport),
}

impl QueryResult {
    /// Total duration of the events behind the result.
    pub const fn duration(&self) -> Duration {
        match self {
            Self::EventList(list) => list.duration,
            Self::Chunked(report) => report.duration,
        }
    }
}

/// Events in chronological order with their summed duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventList {
    pub eventlist: Vec<Event>,
    pub duration: Duration,
}

/// Durations summed per label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReport {
    pub chunks: BTreeMap<String, Chunk>,
    /// Sum over events, each counted once however many labels it has.
    pub duration: Duration,
    pub eventcount: usize,
}

/// Totals for one label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Labels that appeared on the same events as this one.
    pub other_labels: BTreeSet<String>,
    pub duration: Duration,
}

pub fn event_list(events: Vec<Event>) -> EventList {
    let duration = events.iter().map(|event| event.duration).sum();
    EventList {
        eventlist: events,
        duration,
    }
}

/// Groups events by label.
///
/// A label repeated on one event is counted once for that event.
pub fn chunk(events: &[Event]) -> ChunkReport {
    let mut chunks: BTreeMap<String, Chunk> = BTreeMap::new();
    for event in events {
        let labels: BTreeSet<&str> = event.labels.iter().map(String::as_str).collect();
        for &label in &labels {
            let entry = chunks.entry(label.to_string()).or_default();
            entry.duration = entry.duration + event.duration;
            entry.other_labels.extend(
                labels
                    .iter()
                    .filter(|&&other| other != label)
                    .map(ToString::to_string),
            );
        }
    }
    ChunkReport {
        chunks,
        duration: events.iter().map(|event| event.duration).sum(),
        eventcount: events.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};
    use serde_json::json;

    fn event(offset_secs: i64, secs: u32, labels: &[&str]) -> Event {
        let t0 = Utc.with_ymd_and_hms(2025, 4, 7, 9, 0, 0).unwrap();
        Event::new(t0 + TimeDelta::seconds(offset_secs), Duration::from_secs(secs))
            .with_labels(labels.iter().copied())
    }

    #[test]
    fn chunk_sums_per_label() {
        let report = chunk(&[
            event(0, 1, &["a"]),
            event(1, 2, &["b"]),
            event(3, 3, &["a"]),
        ]);
        assert_eq!(report.chunks["a"].duration, Duration::from_secs(4));
        assert_eq!(report.chunks["b"].duration, Duration::from_secs(2));
        assert_eq!(report.duration, Duration::from_secs(6));
        assert_eq!(report.eventcount, 3);
    }

    #[test]
    fn multi_label_events_record_other_labels_and_count_once_in_total() {
        let report = chunk(&[event(0, 5, &["work", "rust"]), event(5, 1, &["work", "email"])]);

        let work = &report.chunks["work"];
        assert_eq!(work.duration, Duration::from_secs(6));
        assert_eq!(
            work.other_labels,
            BTreeSet::from(["email".to_string(), "rust".to_string()])
        );

        let rust = &report.chunks["rust"];
        assert_eq!(rust.duration, Duration::from_secs(5));
        assert_eq!(rust.other_labels, BTreeSet::from(["work".to_string()]));

        assert_eq!(report.duration, Duration::from_secs(6));
    }

    #[test]
    fn repeated_label_counts_once_per_event() {
        let report = chunk(&[event(0, 2, &["a", "a"])]);
        assert_eq!(report.chunks["a"].duration, Duration::from_secs(2));
        assert!(report.chunks["a"].other_labels.is_empty());
    }

    #[test]
    fn unlabeled_events_count_toward_total_only() {
        let report = chunk(&[event(0, 2, &[])]);
        assert!(report.chunks.is_empty());
        assert_eq!(report.duration, Duration::from_secs(2));
        assert_eq!(report.eventcount, 1);
    }

    #[test]
    fn chunk_report_wire_format() {
        let report = chunk(&[event(0, 10, &["test1"])]);
        let json = serde_json::to_value(QueryResult::Chunked(report)).unwrap();
        assert_eq!(
            json,
            json!({
                "chunks": {
                    "test1": {"other_labels": [], "duration": {"value": 10, "unit": "s"}}
                },
                "duration": {"value": 10, "unit": "s"},
                "eventcount": 1
            })
        );
    }

    #[test]
    fn event_list_sums_durations() {
        let list = event_list(vec![event(0, 1, &["a"]), event(2, 2, &["b"])]);
        assert_eq!(list.duration, Duration::from_secs(3));
        assert_eq!(list.eventlist.len(), 2);
    }

    #[test]
    fn query_result_deserializes_either_shape() {
        let list = QueryResult::EventList(event_list(vec![event(0, 1, &["a"])]));
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(serde_json::from_str::<QueryResult>(&json).unwrap(), list);

        let report = QueryResult::Chunked(chunk(&[event(0, 1, &["a"])]));
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(serde_json::from_str::<QueryResult>(&json).unwrap(), report);
    }
}
