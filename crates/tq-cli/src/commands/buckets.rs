//! Buckets command for listing, creating and deleting buckets.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tq_core::{BucketId, BucketMetadata};
use tq_db::Database;

/// Options for a new bucket.
#[derive(Debug, Clone)]
pub struct NewBucket {
    pub id: String,
    pub bucket_type: String,
    pub client: String,
    pub hostname: Option<String>,
    pub name: Option<String>,
}

/// Lists buckets as a table, or as a JSON array with `json`.
pub fn list<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let buckets = db.list_buckets()?;

    if json {
        serde_json::to_writer_pretty(&mut *writer, &buckets)?;
        writeln!(writer)?;
        return Ok(());
    }

    if buckets.is_empty() {
        writeln!(writer, "No buckets yet. Run 'tq buckets create <id>' to add one.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<24} {:<16} {:<12} {:<16} CREATED",
        "ID", "TYPE", "CLIENT", "HOSTNAME"
    )?;
    for bucket in &buckets {
        writeln!(
            writer,
            "{:<24} {:<16} {:<12} {:<16} {}",
            bucket.id.as_str(),
            bucket.bucket_type,
            bucket.client,
            bucket.hostname,
            bucket.created.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        )?;
    }

    Ok(())
}

/// Creates a bucket, stamping it with `now`.
pub fn create<W: Write>(
    writer: &mut W,
    db: &Database,
    bucket: NewBucket,
    now: DateTime<Utc>,
) -> Result<()> {
    let hostname = match bucket.hostname {
        Some(hostname) => hostname,
        None => local_hostname()?,
    };
    let metadata = BucketMetadata {
        id: BucketId::new(bucket.id).context("invalid bucket id")?,
        bucket_type: bucket.bucket_type,
        client: bucket.client,
        hostname,
        name: bucket.name,
        created: now,
    };
    db.create_bucket(&metadata)
        .with_context(|| format!("failed to create bucket {}", metadata.id))?;
    tracing::debug!(bucket = %metadata.id, "created bucket");

    writeln!(writer, "Created bucket {}", metadata.id)?;
    Ok(())
}

/// Deletes a bucket and its events.
pub fn delete<W: Write>(writer: &mut W, db: &Database, id: &str) -> Result<()> {
    db.delete_bucket(id)
        .with_context(|| format!("failed to delete bucket {id}"))?;
    writeln!(writer, "Deleted bucket {id}")?;
    Ok(())
}

fn local_hostname() -> Result<String> {
    let hostname = hostname::get().context("failed to read hostname")?;
    Ok(hostname.to_string_lossy().into_owned())
}
