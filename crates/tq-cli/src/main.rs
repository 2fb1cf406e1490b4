use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tq_cli::commands::buckets::{self, NewBucket};
use tq_cli::commands::util::parse_timestamp;
use tq_cli::commands::{events, insert, query};
use tq_cli::{BucketsAction, Cli, Commands, Config};
use tq_core::QueryOptions;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<tq_db::Database> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    tq_db::Database::open(&config.database_path).with_context(|| {
        format!(
            "failed to open database {}",
            config.database_path.display()
        )
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // stdout carries command output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Some(Commands::Buckets(action)) => {
            let db = open_database(cli.config.as_deref())?;
            match action {
                BucketsAction::List { json } => buckets::list(&mut out, &db, json)?,
                BucketsAction::Create {
                    id,
                    bucket_type,
                    client,
                    hostname,
                    name,
                } => buckets::create(
                    &mut out,
                    &db,
                    NewBucket {
                        id,
                        bucket_type,
                        client,
                        hostname,
                        name,
                    },
                    Utc::now(),
                )?,
                BucketsAction::Delete { id } => buckets::delete(&mut out, &db, &id)?,
            }
        }
        Some(Commands::Insert { bucket }) => {
            let mut db = open_database(cli.config.as_deref())?;
            insert::run(io::stdin().lock(), &mut out, &mut db, &bucket)?;
        }
        Some(Commands::Events {
            bucket,
            start,
            end,
            limit,
        }) => {
            let start = parse_timestamp(start.as_deref(), "start")?;
            let end = parse_timestamp(end.as_deref(), "end")?;
            let db = open_database(cli.config.as_deref())?;
            events::run(&mut out, &db, &bucket, start, end, limit)?;
        }
        Some(Commands::Query {
            file,
            start,
            end,
            limit,
            pretty,
        }) => {
            let options = QueryOptions {
                start: parse_timestamp(start.as_deref(), "start")?,
                end: parse_timestamp(end.as_deref(), "end")?,
                limit,
            };
            let document = query::read_document(file.as_deref(), io::stdin().lock())?;
            let db = open_database(cli.config.as_deref())?;
            query::run(&mut out, &db, &document, &options, pretty)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
