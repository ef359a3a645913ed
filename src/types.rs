/// Shared types used across the codebase

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Result of a record write, carrying the id of the row that was touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "id", rename_all = "snake_case")]
pub enum WriteOutcome {
    Inserted(String),
    Updated(String),
    Duplicated(String),
}

impl WriteOutcome {
    pub fn id(&self) -> &str {
        match self {
            WriteOutcome::Inserted(id) | WriteOutcome::Updated(id) | WriteOutcome::Duplicated(id) => id,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            WriteOutcome::Inserted(_) => "Record inserted",
            WriteOutcome::Updated(_) => "Record updated",
            WriteOutcome::Duplicated(_) => "Record duplicated",
        }
    }
}

/// Parse a registration timestamp.
///
/// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS` form older clients send
/// (interpreted as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Parse a grant expiry.
///
/// A bare date (`YYYY-MM-DD` or `DD/MM/YYYY`) covers the whole day, so it maps
/// to 23:59:59 UTC of that day. Anything else goes through [`parse_timestamp`].
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)?;
            return Some(Utc.from_utc_datetime(&date.and_time(end_of_day)));
        }
    }
    parse_timestamp(raw)
}

/// Deserialize an optional string field that clients sometimes send as a number.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Deserialize an optional integer that may arrive as a numeric string.
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected integer, got '{}'", s))),
        Some(other) => Err(serde::de::Error::custom(format!("expected integer, got {}", other))),
    }
}

/// Deserialize an optional timestamp using [`parse_timestamp`].
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", s))),
    }
}
