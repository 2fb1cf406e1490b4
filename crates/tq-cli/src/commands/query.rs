//! Query command for evaluating a query document against the store.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tq_core::{QueryOptions, QueryResult};
use tq_db::Database;

/// Reads a query document from `file`, or from `stdin` when the path is
/// missing or `-`.
pub fn read_document<R: Read>(file: Option<&Path>, mut stdin: R) -> Result<Value> {
    match file {
        Some(path) if path != Path::new("-") => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))
        }
        _ => {
            let mut text = String::new();
            stdin
                .read_to_string(&mut text)
                .context("failed to read query from stdin")?;
            serde_json::from_str(&text).context("query on stdin is not valid JSON")
        }
    }
}

/// Evaluates `document` and writes the result as JSON.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    document: &Value,
    options: &QueryOptions,
    pretty: bool,
) -> Result<QueryResult> {
    let result = tq_core::query(document, db, options).context("query failed")?;

    if pretty {
        serde_json::to_writer_pretty(&mut *writer, &result)?;
    } else {
        serde_json::to_writer(&mut *writer, &result)?;
    }
    writeln!(writer)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use insta::assert_snapshot;
    use serde_json::json;
    use tq_core::{BucketId, BucketMetadata, Duration, Event, QueryError};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        for id in ["window", "afk"] {
            db.create_bucket(&BucketMetadata {
                id: BucketId::new(id).unwrap(),
                bucket_type: "test".to_string(),
                client: "test".to_string(),
                hostname: "laptop".to_string(),
                name: None,
                created: t0(),
            })
            .unwrap();
        }
        db.insert_events(
            "window",
            &[
                Event::new(t0(), Duration::from_secs(60)).with_labels(["editor", "rust"]),
                Event::new(t0() + TimeDelta::minutes(1), Duration::from_secs(30))
                    .with_labels(["browser"]),
            ],
        )
        .unwrap();
        db.insert_events(
            "afk",
            &[Event::new(t0(), Duration::from_secs(75)).with_labels(["not-afk"])],
        )
        .unwrap();
        db
    }

    fn document() -> Value {
        json!({
            "chunk": true,
            "transforms": [{
                "bucket": "window",
                "filters": [{
                    "name": "timeperiod_intersect",
                    "transforms": [{
                        "bucket": "afk",
                        "filters": [{"name": "include_labels", "labels": ["not-afk"]}]
                    }]
                }]
            }]
        })
    }

    #[test]
    fn chunked_result_is_written_as_json() {
        let db = seeded();
        let mut out = Vec::new();
        let result = run(&mut out, &db, &document(), &QueryOptions::default(), false).unwrap();
        assert_eq!(result.duration(), Duration::from_secs(75));
        assert_snapshot!(String::from_utf8(out).unwrap(), @r#"{"chunks":{"browser":{"other_labels":[],"duration":{"value":15,"unit":"s"}},"editor":{"other_labels":["rust"],"duration":{"value":60,"unit":"s"}},"rust":{"other_labels":["editor"],"duration":{"value":60,"unit":"s"}}},"duration":{"value":75,"unit":"s"},"eventcount":2}"#);
    }

    #[test]
    fn pretty_event_list() {
        let db = seeded();
        let document = json!({"chunk": false, "transforms": [{"bucket": "afk"}]});
        let mut out = Vec::new();
        run(&mut out, &db, &document, &QueryOptions::default(), true).unwrap();
        assert_snapshot!(String::from_utf8(out).unwrap(), @r#"
        {
          "eventlist": [
            {
              "timestamp": "2025-01-01T09:00:00Z",
              "duration": {
                "value": 75,
                "unit": "s"
              },
              "labels": [
                "not-afk"
              ],
              "data": {}
            }
          ],
          "duration": {
            "value": 75,
            "unit": "s"
          }
        }
        "#);
    }

    #[test]
    fn options_are_passed_through() {
        let db = seeded();
        let options = QueryOptions {
            start: Some(t0() + TimeDelta::seconds(90)),
            ..QueryOptions::default()
        };
        let document = json!({"chunk": false, "transforms": [{"bucket": "window"}]});
        let result = run(&mut Vec::new(), &db, &document, &options, false).unwrap();
        assert_eq!(result.duration(), Duration::ZERO);
    }

    #[test]
    fn query_errors_keep_their_kind() {
        let db = seeded();
        let document = json!({"chunk": true, "transforms": [{"bucket": "missing"}]});
        let err = run(&mut Vec::new(), &db, &document, &QueryOptions::default(), false).unwrap_err();
        assert_eq!(err.to_string(), "query failed");
        assert!(matches!(
            err.downcast_ref::<QueryError>(),
            Some(QueryError::UnknownBucket { .. })
        ));
    }

    #[test]
    fn reads_document_from_file_or_stdin() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("query.json");
        std::fs::write(&path, r#"{"chunk": false, "transforms": []}"#).unwrap();

        let from_file = read_document(Some(path.as_path()), std::io::empty()).unwrap();
        assert_eq!(from_file["chunk"], false);

        let stdin = r#"{"chunk": true}"#.as_bytes();
        let from_stdin = read_document(Some(Path::new("-")), stdin).unwrap();
        assert_eq!(from_stdin["chunk"], true);

        let err = read_document(None, "not json".as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "query on stdin is not valid JSON");
    }
}
