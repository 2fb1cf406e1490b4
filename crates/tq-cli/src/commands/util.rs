//! Shared utilities for CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Parses an optional `--{name}` flag as an RFC 3339 timestamp.
pub fn parse_timestamp(s: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>> {
    let Some(s) = s else {
        return Ok(None);
    };
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| {
        format!("invalid --{name} timestamp, expected RFC 3339 (e.g., 2025-01-29T12:00:00Z)")
    })?;
    Ok(Some(dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    #[test]
    fn missing_flag_is_unbounded() {
        assert_eq!(parse_timestamp(None, "start").unwrap(), None);
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        let parsed = parse_timestamp(Some("2025-01-29T14:00:00+02:00"), "start").unwrap();
        assert_eq!(
            parsed,
            Some(Utc.with_ymd_and_hms(2025, 1, 29, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn invalid_timestamp_names_the_flag() {
        let err = parse_timestamp(Some("yesterday"), "end").unwrap_err();
        assert!(err.to_string().contains("--end"));
    }
}
