//! Core domain logic for tq.
//!
//! This crate contains the fundamental types and logic for:
//! - Events and durations: labeled intervals and their wire format
//! - Storage: the bucket interface queries read from, plus an in-memory store
//! - Queries: validation, filter pipelines, merging and chunking

pub mod duration;
pub mod event;
pub mod interval;
pub mod query;
pub mod store;
pub mod types;

pub use duration::{Duration, WireDuration};
pub use event::Event;
pub use interval::Interval;
pub use query::{QueryError, QueryOptions, QueryResult, query};
pub use store::{BucketHandle, BucketMetadata, Datastore, MemoryDatastore, StorageError};
pub use types::{BucketId, ValidationError};
