//! Events command for dumping a bucket as JSON lines.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tq_db::Database;

/// Writes the events of `bucket` overlapping `[start, end)`, oldest first.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    bucket: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    limit: Option<usize>,
) -> Result<usize> {
    if !db.bucket_exists(bucket)? {
        anyhow::bail!("no such bucket: {bucket}");
    }
    let events = db
        .scan_events(bucket, start, end)
        .with_context(|| format!("failed to read bucket {bucket}"))?;

    let mut written = 0;
    for event in events.iter().take(limit.unwrap_or(usize::MAX)) {
        let json = serde_json::to_string(event)?;
        writeln!(writer, "{json}")?;
        written += 1;
    }
    Ok(written)
}
