use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a snapshot timestamp into a `DateTime<Utc>`.
///
/// Accepts RFC 3339 with a `Z` suffix or an explicit offset, and naive
/// `YYYY-MM-DDTHH:MM:SS[.f]` which is taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    anyhow::bail!("Failed to parse timestamp: {}", value)
}

/// Parse a `YYYY-MM-DD` calendar date as used by daily rollups.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")?)
}
