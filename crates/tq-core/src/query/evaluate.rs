//! Recursive evaluation of transforms.

use chrono::{DateTime, Utc};

use crate::event::Event;
use crate::store::{BucketHandle, Datastore, StorageError};

use super::error::QueryError;
use super::merge::merge;
use super::validate::QueryTransform;

/// Evaluates transforms against a datastore within a fixed scan window.
///
/// The window applies to every bucket scan, nested ones included. Result
/// limits are the caller's business and are never applied here.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    datastore: &'a dyn Datastore,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        datastore: &'a dyn Datastore,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            datastore,
            start,
            end,
        }
    }

    /// Checks that every bucket referenced by `transforms`, at any depth,
    /// exists.
    pub fn check_buckets(&self, transforms: &[QueryTransform]) -> Result<(), QueryError> {
        for transform in transforms {
            if !self.datastore.bucket_exists(&transform.bucket)? {
                return Err(unknown_bucket(transform));
            }
            for filter in &transform.filters {
                self.check_buckets(filter.filter().nested_transforms())?;
            }
        }
        Ok(())
    }

    /// Scans the transform's bucket and runs its filters in order.
    pub fn evaluate(&self, transform: &QueryTransform) -> Result<Vec<Event>, QueryError> {
        let bucket = self.open(transform)?;
        let mut events = bucket.scan(self.start, self.end)?;
        tracing::debug!(
            bucket = %transform.bucket,
            scanned = events.len(),
            "scanned bucket"
        );

        for filter in &transform.filters {
            let before = events.len();
            events = filter.filter().apply(events, self)?;
            tracing::debug!(
                filter = %filter.name,
                before,
                after = events.len(),
                "applied filter"
            );
        }
        Ok(events)
    }

    /// Evaluates each transform and merges the results chronologically.
    pub fn evaluate_all(&self, transforms: &[QueryTransform]) -> Result<Vec<Event>, QueryError> {
        let results = transforms
            .iter()
            .map(|transform| self.evaluate(transform))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(merge(results))
    }

    fn open(&self, transform: &QueryTransform) -> Result<Box<dyn BucketHandle + 'a>, QueryError> {
        match self.datastore.get_bucket(&transform.bucket) {
            Ok(bucket) => Ok(bucket),
            Err(StorageError::NoSuchBucket(_)) => Err(unknown_bucket(transform)),
            Err(err) => Err(err.into()),
        }
    }
}

fn unknown_bucket(transform: &QueryTransform) -> QueryError {
    QueryError::UnknownBucket {
        at: transform.at.clone(),
        bucket: transform.bucket.clone(),
    }
}
