//! tq CLI library.
//!
//! This crate provides the command-line interface over the bucket store and
//! query engine.

mod cli;
pub mod commands;
mod config;

pub use cli::{BucketsAction, Cli, Commands};
pub use config::Config;
