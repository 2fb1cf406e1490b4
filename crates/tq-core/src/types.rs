//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A duration was negative.
    #[error("duration cannot be negative, got {nanos}ns")]
    NegativeDuration { nanos: i64 },

    /// A duration does not fit in 64-bit nanoseconds.
    #[error("duration out of range")]
    DurationOutOfRange,

    /// A wire duration used a unit other than seconds.
    #[error("unsupported duration unit: {unit}")]
    UnsupportedUnit { unit: String },

    /// An interval ended before it started.
    #[error("interval end precedes its start")]
    InvertedInterval,
}

/// A validated bucket identifier.
///
/// Bucket IDs must be non-empty strings. They are unique within a datastore,
/// though uniqueness is enforced by the store itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketId(String);

impl BucketId {
    /// Creates a new ID after validation.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::Empty { field: "bucket ID" });
        }
        Ok(Self(id))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BucketId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BucketId> for String {
    fn from(id: BucketId) -> Self {
        id.0
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BucketId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
