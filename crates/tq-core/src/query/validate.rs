//! Turning a raw JSON query into a checked query tree.
//!
//! Structural checks run here, before any bucket is touched. Each filter's
//! own parameters are checked by the parser registered for its name, which
//! calls back into the [`Validator`] for nested transforms.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use super::error::{QueryError, json_type};
use super::filter::{Filter, FilterRegistry};

/// Deepest transform nesting the engine will follow.
pub const MAX_NESTING_DEPTH: usize = 16;

const ROOT: &str = "query";

/// A validated query.
#[derive(Debug)]
pub struct Query {
    /// Aggregate into per-label chunks instead of returning events.
    pub chunk: bool,
    /// Top-level transforms, never empty.
    pub transforms: Vec<QueryTransform>,
}

/// A bucket reference followed by a filter pipeline.
#[derive(Debug)]
pub struct QueryTransform {
    pub bucket: String,
    pub filters: Vec<FilterNode>,
    pub(crate) at: String,
}

impl QueryTransform {
    /// Location of this transform inside the query.
    pub fn location(&self) -> &str {
        &self.at
    }
}

/// A named filter with its parameters already parsed.
#[derive(Debug)]
pub struct FilterNode {
    pub name: String,
    pub(crate) op: Box<dyn Filter>,
}

impl FilterNode {
    pub fn filter(&self) -> &dyn Filter {
        self.op.as_ref()
    }
}

/// Parses raw queries against a filter registry.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'r> {
    registry: &'r FilterRegistry,
}

impl<'r> Validator<'r> {
    pub const fn new(registry: &'r FilterRegistry) -> Self {
        Self { registry }
    }

    pub fn parse_query(&self, raw: &Value) -> Result<Query, QueryError> {
        let Value::Object(fields) = raw else {
            return Err(QueryError::malformed(
                ROOT,
                format!("query must be an object, got {}", json_type(raw)),
            ));
        };
        let chunk = match fields.get("chunk") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(chunk)) => *chunk,
            Some(other) => {
                return Err(QueryError::malformed(
                    ROOT,
                    format!("chunk must be a boolean, got {}", json_type(other)),
                ));
            }
        };
        let transforms = self.parse_transforms(fields.get("transforms"), ROOT, 0)?;
        Ok(Query { chunk, transforms })
    }

    /// Parses a non-empty `transforms` list found under the node at `at`.
    pub(crate) fn parse_transforms(
        &self,
        raw: Option<&Value>,
        at: &str,
        depth: usize,
    ) -> Result<Vec<QueryTransform>, QueryError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(QueryError::CyclicQuery {
                at: at.to_string(),
                max: MAX_NESTING_DEPTH,
            });
        }
        let items = match raw {
            None => return Err(QueryError::malformed(at, "missing transforms list")),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(QueryError::malformed(
                    at,
                    format!("transforms must be a list, got {}", json_type(other)),
                ));
            }
        };
        if items.is_empty() {
            return Err(QueryError::malformed(at, "transforms must not be empty"));
        }
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.parse_transform(item, format!("{at}.transforms[{i}]"), depth))
            .collect()
    }

    fn parse_transform(
        &self,
        raw: &Value,
        at: String,
        depth: usize,
    ) -> Result<QueryTransform, QueryError> {
        let Value::Object(fields) = raw else {
            return Err(QueryError::malformed(
                &at,
                format!("transform must be an object, got {}", json_type(raw)),
            ));
        };
        let bucket = match fields.get("bucket") {
            None => return Err(QueryError::MissingBucket { at }),
            Some(Value::String(bucket)) => bucket.clone(),
            Some(other) => {
                return Err(QueryError::InvalidBucketReference {
                    at,
                    found: json_type(other),
                });
            }
        };
        let filters = match fields.get("filters") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.parse_filter(item, &format!("{at}.filters[{i}]"), depth))
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(QueryError::malformed(
                    &at,
                    format!("filters must be a list, got {}", json_type(other)),
                ));
            }
        };
        Ok(QueryTransform {
            bucket,
            filters,
            at,
        })
    }

    fn parse_filter(&self, raw: &Value, at: &str, depth: usize) -> Result<FilterNode, QueryError> {
        let Value::Object(params) = raw else {
            return Err(QueryError::malformed(
                at,
                format!("filter must be an object, got {}", json_type(raw)),
            ));
        };
        let name = match params.get("name") {
            None => return Err(QueryError::MissingFilterName { at: at.to_string() }),
            Some(Value::String(name)) => name.as_str(),
            Some(other) => {
                return Err(QueryError::InvalidFilterName {
                    at: at.to_string(),
                    found: json_type(other),
                });
            }
        };
        let parser = self
            .registry
            .get(name)
            .ok_or_else(|| QueryError::UnknownFilter {
                at: at.to_string(),
                name: name.to_string(),
            })?;
        let op = parser(&FilterArgs {
            params,
            at,
            depth,
            validator: self,
        })?;
        Ok(FilterNode {
            name: name.to_string(),
            op,
        })
    }
}

/// Parameters of one filter, handed to its parser.
pub struct FilterArgs<'a> {
    params: &'a Map<String, Value>,
    at: &'a str,
    depth: usize,
    validator: &'a Validator<'a>,
}

impl FilterArgs<'_> {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// A required list of strings, deduplicated.
    pub fn string_set(&self, key: &str) -> Result<BTreeSet<String>, QueryError> {
        let items = match self.params.get(key) {
            None => return Err(self.malformed(format!("missing {key} list"))),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(self.malformed(format!(
                    "{key} must be a list of strings, got {}",
                    json_type(other)
                )));
            }
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(self.malformed(format!(
                    "{key} must be a list of strings, found {}",
                    json_type(other)
                ))),
            })
            .collect()
    }

    /// The filter's required, non-empty `transforms` list.
    pub fn nested_transforms(&self) -> Result<Vec<QueryTransform>, QueryError> {
        self.validator
            .parse_transforms(self.params.get("transforms"), self.at, self.depth + 1)
    }

    pub fn malformed(&self, message: impl Into<String>) -> QueryError {
        QueryError::malformed(self.at, message)
    }
}
