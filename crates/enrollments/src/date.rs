use chrono::{DateTime, NaiveDate};

use crate::error::ModelError;

/// Parse a date-only value from an ISO-8601 string.
///
/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp, in which case the
/// calendar date as written (before any offset conversion) is kept.
pub fn parse_iso_date(input: &str) -> Result<NaiveDate, ModelError> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|ts| ts.date_naive())
        .map_err(|_| ModelError::InvalidDate(input.to_string()))
}
