//! Query evaluation over buckets.
//!
//! A query names one or more transforms. Each transform scans a bucket and
//! pipes the events through its filters; the results are merged into one
//! chronological stream and returned either as-is or chunked by label.
//!
//! # Pipeline
//!
//! ```text
//! raw JSON → Validator → bucket check → Evaluator (filters, nested transforms)
//!          → merge → limit → event list | chunk report
//! ```
//!
//! Evaluation never reads the clock: scan bounds come from [`QueryOptions`].

mod chunk;
mod error;
mod evaluate;
mod filter;
mod merge;
mod validate;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::store::Datastore;

pub use chunk::{Chunk, ChunkReport, EventList, QueryResult, chunk, event_list};
pub use error::QueryError;
pub use evaluate::Evaluator;
pub use filter::{
    ExcludeLabels, Filter, FilterParser, FilterRegistry, IncludeLabels, TimeperiodIntersect,
};
pub use merge::merge;
pub use validate::{
    FilterArgs, FilterNode, MAX_NESTING_DEPTH, Query, QueryTransform, Validator,
};

/// Scan window and result limit for one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Keep events whose interval ends after this instant.
    pub start: Option<DateTime<Utc>>,
    /// Keep events that start before this instant.
    pub end: Option<DateTime<Utc>>,
    /// Keep at most this many events of the merged stream, oldest first.
    pub limit: Option<usize>,
}

/// Evaluates a raw query with the built-in filters.
pub fn query(
    raw: &Value,
    datastore: &dyn Datastore,
    options: &QueryOptions,
) -> Result<QueryResult, QueryError> {
    query_with(raw, datastore, options, FilterRegistry::builtin())
}

/// Evaluates a raw query with a caller-supplied filter registry.
pub fn query_with(
    raw: &Value,
    datastore: &dyn Datastore,
    options: &QueryOptions,
    registry: &FilterRegistry,
) -> Result<QueryResult, QueryError> {
    let query = Validator::new(registry).parse_query(raw)?;
    run(&query, datastore, options)
}

/// Evaluates an already validated query.
pub fn run(
    query: &Query,
    datastore: &dyn Datastore,
    options: &QueryOptions,
) -> Result<QueryResult, QueryError> {
    let evaluator = Evaluator::new(datastore, options.start, options.end);
    evaluator.check_buckets(&query.transforms)?;

    let mut events = evaluator.evaluate_all(&query.transforms)?;
    if let Some(limit) = options.limit {
        events.truncate(limit);
    }
    tracing::debug!(
        transforms = query.transforms.len(),
        events = events.len(),
        chunk = query.chunk,
        "evaluated query"
    );

    Ok(if query.chunk {
        QueryResult::Chunked(chunk(&events))
    } else {
        QueryResult::EventList(event_list(events))
    })
}
