//! SQLite bucket storage for tq.
//!
//! Provides persistence for buckets and their events using `rusqlite`, and
//! implements the [`Datastore`] interface queries read from.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! This means a `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! For concurrent queries, either:
//! - Use a `Mutex<Database>` to serialize access
//! - Use separate `Database` instances per thread
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in fixed-width RFC 3339 format with nanosecond
//! precision (e.g., `2024-01-15T10:30:00.000000000Z`). This ensures:
//! - Lexicographic ordering matches chronological ordering
//! - Human-readable values in the database
//! - Timezone-aware (always UTC)
//!
//! The text only stays fixed-width for four-digit years, so instants outside
//! 0000-9999 are rejected on write and window bounds outside that range are
//! resolved before they reach SQL.
//!
//! Each event also stores its end time so that a window scan, which keeps
//! events overlapping `[start, end)`, is a single indexed query.
//!
//! ## Event Payload Storage
//!
//! `labels` holds a JSON array and `data` a JSON object. Row IDs preserve
//! insertion order among events sharing a timestamp.

use std::path::Path;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use thiserror::Error;
use tq_core::{BucketHandle, BucketId, BucketMetadata, Datastore, Duration, Event, StorageError};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A bucket with this ID already exists.
    #[error("bucket already exists: {0}")]
    BucketExists(String),
    /// No bucket with this ID exists.
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in bucket {bucket}: {timestamp}")]
    TimestampParse {
        bucket: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row does not describe a valid event or bucket.
    #[error("invalid stored data in bucket {bucket}: {message}")]
    InvalidData { bucket: String, message: String },
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::BucketExists(id) => Self::BucketExists(id),
            DbError::NoSuchBucket(id) => Self::NoSuchBucket(id),
            other => Self::Backend(Box::new(other)),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS buckets (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                client TEXT NOT NULL,
                hostname TEXT NOT NULL,
                name TEXT,
                created TEXT NOT NULL
            );

            -- Events table: append-only interval events per bucket
            -- timestamp/endtime: fixed-width RFC 3339 (e.g., '2024-01-15T10:30:00.000000000Z')
            -- labels: JSON array of strings
            -- data: JSON object payload
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bucket_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                endtime TEXT NOT NULL,
                duration_ns INTEGER NOT NULL,
                labels TEXT NOT NULL,
                data TEXT NOT NULL,
                FOREIGN KEY (bucket_id) REFERENCES buckets(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_events_bucket_timestamp ON events(bucket_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_bucket_endtime ON events(bucket_id, endtime);
            ",
        )?;
        Ok(())
    }

    /// Creates an empty bucket.
    pub fn create_bucket(&self, metadata: &BucketMetadata) -> Result<(), DbError> {
        check_storable(metadata.id.as_str(), metadata.created)?;
        let inserted = self.conn.execute(
            "
            INSERT OR IGNORE INTO buckets (id, type, client, hostname, name, created)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                metadata.id.as_str(),
                metadata.bucket_type,
                metadata.client,
                metadata.hostname,
                metadata.name,
                format_timestamp(metadata.created),
            ],
        )?;
        if inserted == 0 {
            return Err(DbError::BucketExists(metadata.id.to_string()));
        }
        tracing::debug!(bucket = %metadata.id, "created bucket");
        Ok(())
    }

    /// Deletes a bucket together with its events.
    pub fn delete_bucket(&self, id: &str) -> Result<(), DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM buckets WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(DbError::NoSuchBucket(id.to_string()));
        }
        tracing::debug!(bucket = id, "deleted bucket");
        Ok(())
    }

    pub fn bucket_exists(&self, id: &str) -> Result<bool, DbError> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM buckets WHERE id = ?", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Lists buckets ordered by ID.
    pub fn list_buckets(&self) -> Result<Vec<BucketMetadata>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, type, client, hostname, name, created FROM buckets ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], BucketRow::from_row)?;
        let mut buckets = Vec::new();
        for row in rows {
            buckets.push(row?.into_metadata()?);
        }
        Ok(buckets)
    }

    /// Returns a bucket's metadata, if it exists.
    pub fn bucket_metadata(&self, id: &str) -> Result<Option<BucketMetadata>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, type, client, hostname, name, created FROM buckets WHERE id = ?",
                params![id],
                BucketRow::from_row,
            )
            .optional()?;
        row.map(BucketRow::into_metadata).transpose()
    }

    /// Appends a batch of events to a bucket.
    pub fn insert_events(&mut self, bucket_id: &str, events: &[Event]) -> Result<usize, DbError> {
        if !self.bucket_exists(bucket_id)? {
            return Err(DbError::NoSuchBucket(bucket_id.to_string()));
        }
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO events (bucket_id, timestamp, endtime, duration_ns, labels, data)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                check_storable(bucket_id, event.timestamp)?;
                check_storable(bucket_id, event.end())?;
                let labels = Value::from(event.labels.clone()).to_string();
                let data = Value::Object(event.data.clone()).to_string();
                inserted += stmt.execute(params![
                    bucket_id,
                    format_timestamp(event.timestamp),
                    format_timestamp(event.end()),
                    event.duration.as_nanos(),
                    labels,
                    data,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(bucket = bucket_id, inserted, "inserted events");
        Ok(inserted)
    }

    /// Lists a bucket's events overlapping `[start, end)`, oldest first.
    ///
    /// Missing bounds are unbounded. A zero-length event is kept when
    /// `start <= timestamp < end`.
    pub fn scan_events(
        &self,
        bucket_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, DbError> {
        // Every stored instant lies within the storable years, so a bound
        // beyond them either matches nothing or constrains nothing.
        if start.is_some_and(|s| s.year() > MAX_STORED_YEAR)
            || end.is_some_and(|e| e.year() < MIN_STORED_YEAR)
        {
            return Ok(Vec::new());
        }
        let start = start.filter(|s| s.year() >= MIN_STORED_YEAR);
        let end = end.filter(|e| e.year() <= MAX_STORED_YEAR);

        let mut stmt = self.conn.prepare(
            "
            SELECT timestamp, duration_ns, labels, data
            FROM events
            WHERE bucket_id = ?1
              AND (?2 IS NULL OR endtime > ?2 OR timestamp >= ?2)
              AND (?3 IS NULL OR timestamp < ?3)
            ORDER BY timestamp ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![
                bucket_id,
                start.map(format_timestamp),
                end.map(format_timestamp)
            ],
            |row| {
                Ok(EventRow {
                    timestamp: row.get(0)?,
                    duration_ns: row.get(1)?,
                    labels: row.get(2)?,
                    data: row.get(3)?,
                })
            },
        )?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event(bucket_id)?);
        }
        Ok(events)
    }
}

impl Datastore for Database {
    fn bucket_exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(Self::bucket_exists(self, id)?)
    }

    fn get_bucket(&self, id: &str) -> Result<Box<dyn BucketHandle + '_>, StorageError> {
        let metadata = self
            .bucket_metadata(id)?
            .ok_or_else(|| StorageError::NoSuchBucket(id.to_string()))?;
        Ok(Box::new(SqliteBucket { db: self, metadata }))
    }
}

/// A bucket opened for reading.
struct SqliteBucket<'a> {
    db: &'a Database,
    metadata: BucketMetadata,
}

impl BucketHandle for SqliteBucket<'_> {
    fn metadata(&self) -> &BucketMetadata {
        &self.metadata
    }

    fn scan(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, StorageError> {
        Ok(self.db.scan_events(self.metadata.id.as_str(), start, end)?)
    }
}

struct BucketRow {
    id: String,
    bucket_type: String,
    client: String,
    hostname: String,
    name: Option<String>,
    created: String,
}

impl BucketRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            bucket_type: row.get(1)?,
            client: row.get(2)?,
            hostname: row.get(3)?,
            name: row.get(4)?,
            created: row.get(5)?,
        })
    }

    fn into_metadata(self) -> Result<BucketMetadata, DbError> {
        let created = parse_timestamp(&self.created, &self.id)?;
        let id = BucketId::new(self.id.clone()).map_err(|e| invalid(&self.id, &e))?;
        Ok(BucketMetadata {
            id,
            bucket_type: self.bucket_type,
            client: self.client,
            hostname: self.hostname,
            name: self.name,
            created,
        })
    }
}

struct EventRow {
    timestamp: String,
    duration_ns: i64,
    labels: String,
    data: String,
}

impl EventRow {
    fn into_event(self, bucket: &str) -> Result<Event, DbError> {
        let timestamp = parse_timestamp(&self.timestamp, bucket)?;
        let duration = Duration::from_nanos(self.duration_ns).map_err(|e| invalid(bucket, &e))?;
        let labels: Vec<String> = serde_json::from_str(&self.labels).map_err(|e| invalid(bucket, &e))?;
        let data: Map<String, Value> =
            serde_json::from_str(&self.data).map_err(|e| invalid(bucket, &e))?;
        Ok(Event {
            timestamp,
            duration,
            labels,
            data,
        })
    }
}

fn invalid(bucket: &str, err: &dyn std::fmt::Display) -> DbError {
    DbError::InvalidData {
        bucket: bucket.to_string(),
        message: err.to_string(),
    }
}

fn parse_timestamp(timestamp: &str, bucket: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            bucket: bucket.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

const MIN_STORED_YEAR: i32 = 0;
const MAX_STORED_YEAR: i32 = 9999;

fn check_storable(bucket: &str, timestamp: DateTime<Utc>) -> Result<(), DbError> {
    if (MIN_STORED_YEAR..=MAX_STORED_YEAR).contains(&timestamp.year()) {
        return Ok(());
    }
    Err(DbError::InvalidData {
        bucket: bucket.to_string(),
        message: format!(
            "{timestamp} is outside the storable years {MIN_STORED_YEAR:04}-{MAX_STORED_YEAR}"
        ),
    })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
