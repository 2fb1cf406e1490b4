//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Time-tracking query engine.
///
/// Stores labeled time intervals in buckets and evaluates JSON queries over
/// them: label filters, interval intersection and per-label totals.
#[derive(Debug, Parser)]
#[command(name = "tq", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage buckets.
    #[command(subcommand)]
    Buckets(BucketsAction),

    /// Insert events read as JSON lines from stdin.
    Insert {
        /// Bucket to insert into.
        bucket: String,
    },

    /// Print the events of a bucket as JSON lines.
    Events {
        /// Bucket to read.
        bucket: String,

        /// Only events ending after this time (RFC 3339).
        #[arg(long)]
        start: Option<String>,

        /// Only events starting before this time (RFC 3339).
        #[arg(long)]
        end: Option<String>,

        /// Maximum number of events to print.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Evaluate a query document.
    Query {
        /// Query file; reads stdin when omitted or `-`.
        file: Option<PathBuf>,

        /// Only events ending after this time (RFC 3339).
        #[arg(long)]
        start: Option<String>,

        /// Only events starting before this time (RFC 3339).
        #[arg(long)]
        end: Option<String>,

        /// Keep at most this many events of the merged result.
        #[arg(long)]
        limit: Option<usize>,

        /// Pretty-print the result.
        #[arg(long)]
        pretty: bool,
    },
}

/// Bucket management actions.
#[derive(Debug, Subcommand)]
pub enum BucketsAction {
    /// List all buckets.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create a new bucket.
    Create {
        /// Bucket identifier.
        id: String,

        /// Kind of data the bucket holds.
        #[arg(long = "type", default_value = "currentwindow")]
        bucket_type: String,

        /// Client writing to the bucket.
        #[arg(long, default_value = "tq")]
        client: String,

        /// Host the data comes from (defaults to this machine).
        #[arg(long)]
        hostname: Option<String>,

        /// Human-readable name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete a bucket and all of its events.
    Delete {
        /// Bucket identifier.
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_defaults_to_stdin() {
        let cli = Cli::parse_from(["tq", "query", "--limit", "3"]);
        match cli.command {
            Some(Commands::Query {
                file, limit, pretty, ..
            }) => {
                assert!(file.is_none());
                assert_eq!(limit, Some(3));
                assert!(!pretty);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn buckets_create_parses_type_flag() {
        let cli = Cli::parse_from(["tq", "-v", "buckets", "create", "aw-window", "--type", "afkstatus"]);
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Buckets(BucketsAction::Create {
                id,
                bucket_type,
                client,
                hostname,
                ..
            })) => {
                assert_eq!(id, "aw-window");
                assert_eq!(bucket_type, "afkstatus");
                assert_eq!(client, "tq");
                assert!(hostname.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
