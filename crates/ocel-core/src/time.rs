//! ISO-8601 timestamp parsing.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Layouts tried for timestamps that carry a UTC offset RFC 3339 rejects:
/// basic (`+0100`) or hour-only (`+01`) offsets, or no seconds.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
];

/// Layouts tried for timestamps that carry no UTC offset.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse an ISO-8601 timestamp.
///
/// Accepts what Neo4j's `datetime()` accepts for event logs: RFC 3339,
/// `+HHMM` and `+HH` offsets, minute precision and date-only values.
/// Offset-less timestamps are read as UTC and a bare date as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }

    let expanded = expand_hour_offset(raw);
    let with_offset = expanded.as_deref().unwrap_or(raw);
    if let Some(ts) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(with_offset, fmt).ok())
    {
        return Some(ts);
    }

    let naive = raw.strip_suffix(['Z', 'z']).unwrap_or(raw);
    if let Some(ts) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
    {
        return Some(ts.and_utc().fixed_offset());
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().fixed_offset())
}

/// `2023-03-01T09:00:00+01` becomes `2023-03-01T09:00:00+0100`.
fn expand_hour_offset(raw: &str) -> Option<String> {
    let split = raw.len().checked_sub(3)?;
    if !raw.is_char_boundary(split) {
        return None;
    }
    let (head, offset) = raw.split_at(split);
    let mut chars = offset.chars();
    let sign = chars.next()?;
    let is_hour_offset = matches!(sign, '+' | '-') && chars.all(|c| c.is_ascii_digit());
    // The time part must be present, or `2023-03-01` would lose its day.
    let has_time = head.contains(['T', ' ']) && head.contains(':');
    (is_hour_offset && has_time).then(|| format!("{}00", raw))
}

/// Render a timestamp in the form handed to Cypher's `datetime()`.
pub fn to_cypher_datetime(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Current wall-clock time as an ISO-8601 string.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
