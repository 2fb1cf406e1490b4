//! Named event filters.
//!
//! A filter name maps to a parser that checks the filter's parameters and
//! returns a ready-to-apply [`Filter`]. The built-in table is created once per
//! process; callers can start from [`FilterRegistry::with_builtins`] and
//! register their own operators.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use crate::event::Event;

use super::error::QueryError;
use super::evaluate::Evaluator;
use super::validate::{FilterArgs, QueryTransform};

/// An operator in a transform's filter pipeline.
pub trait Filter: fmt::Debug + Send + Sync {
    /// Maps the incoming events to new ones.
    ///
    /// `ctx` evaluates nested transforms against the same datastore and
    /// window as the enclosing query.
    fn apply(&self, events: Vec<Event>, ctx: &Evaluator<'_>) -> Result<Vec<Event>, QueryError>;

    /// Transforms this filter evaluates on its own.
    fn nested_transforms(&self) -> &[QueryTransform] {
        &[]
    }
}

/// Builds a filter from its parameters.
pub type FilterParser = fn(&FilterArgs<'_>) -> Result<Box<dyn Filter>, QueryError>;

static BUILTIN: LazyLock<FilterRegistry> = LazyLock::new(FilterRegistry::with_builtins);

/// Lookup table from filter name to parser.
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    parsers: BTreeMap<String, FilterParser>,
}

impl FilterRegistry {
    /// A registry with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(IncludeLabels::NAME, IncludeLabels::parse);
        registry.register(ExcludeLabels::NAME, ExcludeLabels::parse);
        registry.register(TimeperiodIntersect::NAME, TimeperiodIntersect::parse);
        registry
    }

    /// The shared built-in registry.
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Registers a parser, returning the one it replaced.
    pub fn register(&mut self, name: impl Into<String>, parser: FilterParser) -> Option<FilterParser> {
        self.parsers.insert(name.into(), parser)
    }

    pub fn get(&self, name: &str) -> Option<FilterParser> {
        self.parsers.get(name).copied()
    }

    /// Registered filter names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }
}

/// Keeps events carrying at least one of the given labels.
#[derive(Debug, Clone)]
pub struct IncludeLabels {
    labels: BTreeSet<String>,
}

impl IncludeLabels {
    pub const NAME: &'static str = "include_labels";

    fn parse(args: &FilterArgs<'_>) -> Result<Box<dyn Filter>, QueryError> {
        Ok(Box::new(Self {
            labels: args.string_set("labels")?,
        }))
    }
}

impl Filter for IncludeLabels {
    fn apply(&self, events: Vec<Event>, _ctx: &Evaluator<'_>) -> Result<Vec<Event>, QueryError> {
        Ok(events
            .into_iter()
            .filter(|event| event.has_any_label(&self.labels))
            .collect())
    }
}

/// Keeps events carrying none of the given labels.
#[derive(Debug, Clone)]
pub struct ExcludeLabels {
    labels: BTreeSet<String>,
}

impl ExcludeLabels {
    pub const NAME: &'static str = "exclude_labels";

    fn parse(args: &FilterArgs<'_>) -> Result<Box<dyn Filter>, QueryError> {
        Ok(Box::new(Self {
            labels: args.string_set("labels")?,
        }))
    }
}

impl Filter for ExcludeLabels {
    fn apply(&self, events: Vec<Event>, _ctx: &Evaluator<'_>) -> Result<Vec<Event>, QueryError> {
        Ok(events
            .into_iter()
            .filter(|event| !event.has_any_label(&self.labels))
            .collect())
    }
}

/// Restricts events to the periods covered by another event set.
///
/// Every overlap between an input event and an event of the nested
/// transforms yields one output event carrying the input's labels and data.
/// An input overlapping several periods appears once per overlap; an input
/// overlapping nothing is dropped.
#[derive(Debug)]
pub struct TimeperiodIntersect {
    transforms: Vec<QueryTransform>,
}

impl TimeperiodIntersect {
    pub const NAME: &'static str = "timeperiod_intersect";

    fn parse(args: &FilterArgs<'_>) -> Result<Box<dyn Filter>, QueryError> {
        Ok(Box::new(Self {
            transforms: args.nested_transforms()?,
        }))
    }
}

impl Filter for TimeperiodIntersect {
    fn apply(&self, events: Vec<Event>, ctx: &Evaluator<'_>) -> Result<Vec<Event>, QueryError> {
        let periods: Vec<_> = ctx
            .evaluate_all(&self.transforms)?
            .iter()
            .map(Event::interval)
            .collect();

        let mut intersected = Vec::new();
        for event in &events {
            let interval = event.interval();
            intersected.extend(
                periods
                    .iter()
                    .filter_map(|period| interval.intersect(period))
                    .map(|overlap| event.restricted_to(overlap)),
            );
        }
        Ok(intersected)
    }

    fn nested_transforms(&self) -> &[QueryTransform] {
        &self.transforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::Duration;
    use crate::store::MemoryDatastore;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()
    }

    fn event(offset_secs: i64, secs: u32, labels: &[&str]) -> Event {
        Event::new(t0() + TimeDelta::seconds(offset_secs), Duration::from_secs(secs))
            .with_labels(labels.iter().copied())
    }

    fn labels(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn builtin_registry_names() {
        let names: Vec<_> = FilterRegistry::builtin().names().collect();
        assert_eq!(
            names,
            vec!["exclude_labels", "include_labels", "timeperiod_intersect"]
        );
    }

    #[test]
    fn register_replaces_existing_parser() {
        let mut registry = FilterRegistry::new();
        assert!(registry.register("include_labels", IncludeLabels::parse).is_none());
        assert!(registry.register("include_labels", ExcludeLabels::parse).is_some());
        assert!(registry.get("include_labels").is_some());
        assert!(registry.get("exclude_labels").is_none());
    }

    #[test]
    fn include_labels_keeps_any_match() {
        let store = MemoryDatastore::new();
        let ctx = Evaluator::new(&store, None, None);
        let filter = IncludeLabels {
            labels: labels(&["a", "b"]),
        };

        let out = filter
            .apply(
                vec![event(0, 1, &["a"]), event(1, 1, &["c"]), event(2, 1, &["c", "b"])],
                &ctx,
            )
            .unwrap();
        assert_eq!(out, vec![event(0, 1, &["a"]), event(2, 1, &["c", "b"])]);
    }

    #[test]
    fn exclude_labels_drops_any_match() {
        let store = MemoryDatastore::new();
        let ctx = Evaluator::new(&store, None, None);
        let filter = ExcludeLabels {
            labels: labels(&["a"]),
        };

        let out = filter
            .apply(
                vec![event(0, 1, &["a", "x"]), event(1, 1, &["x"]), event(2, 1, &[])],
                &ctx,
            )
            .unwrap();
        assert_eq!(out, vec![event(1, 1, &["x"]), event(2, 1, &[])]);
    }

    #[test]
    fn label_filters_with_empty_set() {
        let store = MemoryDatastore::new();
        let ctx = Evaluator::new(&store, None, None);
        let input = vec![event(0, 1, &["a"])];

        let include = IncludeLabels {
            labels: BTreeSet::new(),
        };
        assert!(include.apply(input.clone(), &ctx).unwrap().is_empty());

        let exclude = ExcludeLabels {
            labels: BTreeSet::new(),
        };
        assert_eq!(exclude.apply(input.clone(), &ctx).unwrap(), input);
    }
}
