//! CLI subcommand implementations.

pub mod buckets;
pub mod events;
pub mod insert;
pub mod query;
pub mod util;
