//! Insert command for appending events to a bucket.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tq_core::Event;
use tq_db::Database;

/// Reads events as JSON lines from `reader` and appends them to `bucket`.
///
/// Nothing is written if any line fails to parse.
pub fn run<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    db: &mut Database,
    bucket: &str,
) -> Result<usize> {
    let events = parse_events(reader)?;
    let inserted = db
        .insert_events(bucket, &events)
        .with_context(|| format!("failed to insert into bucket {bucket}"))?;
    writeln!(writer, "Inserted {inserted} events into {bucket}")?;
    Ok(inserted)
}

fn parse_events<R: BufRead>(reader: R) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid event on line {}", idx + 1))?;
        events.push(event);
    }
    Ok(events)
}
