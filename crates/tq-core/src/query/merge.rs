//! Merging per-transform results into one stream.

use crate::event::Event;

/// Concatenates event lists and orders them by timestamp.
///
/// The sort is stable, so events sharing a timestamp keep the order of the
/// lists they came from. Duplicates are kept.
pub fn merge(results: Vec<Vec<Event>>) -> Vec<Event> {
    let mut merged: Vec<Event> = results.into_iter().flatten().collect();
    merged.sort_by_key(|event| event.timestamp);
    merged
}
