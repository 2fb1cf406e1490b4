//! Bucket storage interface and an in-memory implementation.
//!
//! The query engine only reads buckets: it checks that a bucket exists, opens a
//! handle to it and range-scans its events. Everything else (creating buckets,
//! inserting events) belongs to the concrete store.

use std::collections::BTreeMap;
use std::error::Error as StdError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;
use crate::types::BucketId;

/// Errors reported by a bucket store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A bucket with this ID already exists.
    #[error("bucket already exists: {0}")]
    BucketExists(String),

    /// No bucket with this ID exists.
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn StdError + Send + Sync + 'static>),
}

/// Descriptive metadata for a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketMetadata {
    pub id: BucketId,
    /// The kind of data the bucket holds (e.g. "afkstatus", "currentwindow").
    #[serde(rename = "type")]
    pub bucket_type: String,
    /// The client that writes to the bucket.
    pub client: String,
    pub hostname: String,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created: DateTime<Utc>,
}

/// Read access to a set of buckets.
pub trait Datastore {
    fn bucket_exists(&self, id: &str) -> Result<bool, StorageError>;

    /// Opens a bucket for reading.
    ///
    /// Returns [`StorageError::NoSuchBucket`] when the bucket does not exist.
    fn get_bucket(&self, id: &str) -> Result<Box<dyn BucketHandle + '_>, StorageError>;
}

/// Read access to a single bucket.
pub trait BucketHandle {
    fn metadata(&self) -> &BucketMetadata;

    /// Returns events whose interval intersects `[start, end)`, oldest first.
    ///
    /// Missing bounds are unbounded. Events sharing a timestamp come back in
    /// insertion order.
    fn scan(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, StorageError>;
}

impl<T: BucketHandle + ?Sized> BucketHandle for &T {
    fn metadata(&self) -> &BucketMetadata {
        (**self).metadata()
    }

    fn scan(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, StorageError> {
        (**self).scan(start, end)
    }
}

/// A bucket held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryBucket {
    metadata: BucketMetadata,
    /// Sorted by timestamp; equal timestamps keep insertion order.
    events: Vec<Event>,
}

impl MemoryBucket {
    /// Appends events and restores timestamp order.
    ///
    /// The sort is stable, so new events land after existing ones sharing
    /// their timestamp.
    fn append<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = Event>,
    {
        let before = self.events.len();
        self.events.extend(events);
        self.events.sort_by_key(|event| event.timestamp);
        self.events.len() - before
    }
}

impl BucketHandle for MemoryBucket {
    fn metadata(&self) -> &BucketMetadata {
        &self.metadata
    }

    fn scan(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, StorageError> {
        Ok(self
            .events
            .iter()
            .filter(|event| event.interval().overlaps_window(start, end))
            .cloned()
            .collect())
    }
}

/// An in-memory datastore, used in tests and for ad-hoc evaluation.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    buckets: BTreeMap<String, MemoryBucket>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_bucket(&mut self, metadata: BucketMetadata) -> Result<(), StorageError> {
        let id = metadata.id.as_str().to_string();
        if self.buckets.contains_key(&id) {
            return Err(StorageError::BucketExists(id));
        }
        self.buckets.insert(
            id,
            MemoryBucket {
                metadata,
                events: Vec::new(),
            },
        );
        Ok(())
    }

    /// Deletes a bucket and all of its events.
    pub fn delete_bucket(&mut self, id: &str) -> Result<(), StorageError> {
        self.buckets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NoSuchBucket(id.to_string()))
    }

    pub fn insert(&mut self, id: &str, event: Event) -> Result<(), StorageError> {
        self.bucket_mut(id)?.append([event]);
        Ok(())
    }

    /// Inserts a batch of events, returning how many were stored.
    pub fn insert_many<I>(&mut self, id: &str, events: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = Event>,
    {
        Ok(self.bucket_mut(id)?.append(events))
    }

    /// Lists bucket metadata ordered by ID.
    pub fn buckets(&self) -> impl Iterator<Item = &BucketMetadata> {
        self.buckets.values().map(|bucket| &bucket.metadata)
    }

    fn bucket_mut(&mut self, id: &str) -> Result<&mut MemoryBucket, StorageError> {
        self.buckets
            .get_mut(id)
            .ok_or_else(|| StorageError::NoSuchBucket(id.to_string()))
    }
}

impl Datastore for MemoryDatastore {
    fn bucket_exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.buckets.contains_key(id))
    }

    fn get_bucket(&self, id: &str) -> Result<Box<dyn BucketHandle + '_>, StorageError> {
        let bucket = self
            .buckets
            .get(id)
            .ok_or_else(|| StorageError::NoSuchBucket(id.to_string()))?;
        Ok(Box::new(bucket))
    }
}
