//! Query error types.

use serde_json::Value;
use thiserror::Error;

use crate::store::StorageError;

/// Errors raised while validating or evaluating a query.
///
/// `at` fields locate the offending node, e.g. `query.transforms[1].filters[0]`.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A transform has no `bucket` field.
    #[error("{at}: transform does not specify a bucket")]
    MissingBucket { at: String },

    /// `bucket` is present but not a string.
    #[error("{at}: bucket must be a string, got {found}")]
    InvalidBucketReference { at: String, found: &'static str },

    /// `bucket` names a bucket the datastore does not have.
    #[error("{at}: no such bucket: {bucket}")]
    UnknownBucket { at: String, bucket: String },

    /// A filter has no `name` field.
    #[error("{at}: filter does not specify a name")]
    MissingFilterName { at: String },

    /// `name` is present but not a string.
    #[error("{at}: filter name must be a string, got {found}")]
    InvalidFilterName { at: String, found: &'static str },

    /// `name` does not match a registered filter.
    #[error("{at}: no such filter: {name}")]
    UnknownFilter { at: String, name: String },

    /// Any other structural problem.
    #[error("{at}: {message}")]
    MalformedQuery { at: String, message: String },

    /// Transforms nest deeper than the engine will follow.
    #[error("{at}: transforms nest deeper than {max} levels")]
    CyclicQuery { at: String, max: usize },

    /// The datastore failed while resolving or scanning a bucket.
    #[error("storage error while evaluating query")]
    Storage(#[from] StorageError),
}

impl QueryError {
    pub(crate) fn malformed(at: &str, message: impl Into<String>) -> Self {
        Self::MalformedQuery {
            at: at.to_string(),
            message: message.into(),
        }
    }
}

/// Short JSON type name for error messages.
pub(crate) const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
