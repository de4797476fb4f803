//! Timestamp resolution and date-window helpers.
//!
//! Message timestamps arrive in several shapes: an epoch-seconds delivery
//! stamp, a naive local `YYYY-MM-DD HH:mm[:ss]` string, or some ISO/RFC
//! date. Everything here is total: unparseable input resolves to 0 so it
//! sorts first instead of failing.

use crate::types::{DateRange, Message};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use regex::Regex;
use std::sync::OnceLock;

fn naive_local_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[ T](\d{2}):(\d{2})(?::(\d{2}))?$")
            .expect("static timestamp pattern")
    })
}

/// Resolve a message to epoch milliseconds, reading naive timestamps in `zone`.
///
/// A positive `latestTimestamp` wins over the `timestamp` string.
pub fn resolve_time_ms<Tz: TimeZone>(message: &Message, zone: &Tz) -> i64 {
    if let Some(secs) = message.latest_timestamp {
        if secs.is_finite() && secs > 0.0 {
            return (secs * 1000.0).round() as i64;
        }
    }
    parse_timestamp_ms(&message.timestamp, zone)
}

/// [`resolve_time_ms`] in the host's local zone.
pub fn resolve_local_time_ms(message: &Message) -> i64 {
    resolve_time_ms(message, &Local)
}

/// Parse a raw timestamp string to epoch milliseconds, 0 on failure.
pub fn parse_timestamp_ms<Tz: TimeZone>(raw: &str, zone: &Tz) -> i64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }

    if let Some(caps) = naive_local_pattern().captures(trimmed) {
        let field = |i: usize| -> Option<u32> { caps.get(i).and_then(|m| m.as_str().parse().ok()) };
        let year = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok());
        let seconds = if caps.get(6).is_some() { field(6) } else { Some(0) };
        let resolved = match (year, field(2), field(3), field(4), field(5), seconds) {
            (Some(y), Some(mo), Some(d), Some(h), Some(mi), Some(s)) => zone
                .with_ymd_and_hms(y, mo, d, h, mi, s)
                .earliest()
                .map(|dt| dt.timestamp_millis()),
            _ => None,
        };
        return resolved.unwrap_or(0).max(0);
    }

    parse_generic_ms(trimmed, zone).unwrap_or(0).max(0)
}

fn parse_generic_ms<Tz: TimeZone>(s: &str, zone: &Tz) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp_millis());
    }
    // Date-only ISO strings are UTC midnight.
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
    }
    const LOCAL_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
    ];
    for fmt in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return zone
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.timestamp_millis());
        }
    }
    None
}

/// Keep messages whose resolved time falls inside `range` (inclusive).
///
/// An unbounded range returns every message.
pub fn filter_by_range<Tz: TimeZone>(
    messages: &[Message],
    range: &DateRange,
    zone: &Tz,
) -> Vec<Message> {
    match range.bounds() {
        None => messages.to_vec(),
        Some((from, to)) => messages
            .iter()
            .filter(|m| {
                let t = resolve_time_ms(m, zone);
                t >= from && t <= to
            })
            .cloned()
            .collect(),
    }
}

/// The window of equal length ending 1 ms before `range.from`.
///
/// `None` when the range is unbounded or the earlier window falls outside
/// the representable millisecond range.
pub fn previous_period(range: &DateRange) -> Option<DateRange> {
    let (from, to) = range.bounds()?;
    let duration = to.checked_sub(from)?;
    Some(DateRange::new(from.checked_sub(duration)?, from.checked_sub(1)?))
}

/// Parse a command-line date bound.
///
/// Accepts RFC 3339 or a bare `YYYY-MM-DD`, which expands to the start of
/// the day (or its last millisecond when `end_of_day` is set) in `zone`.
pub fn parse_range_bound<Tz: TimeZone>(raw: &str, end_of_day: bool, zone: &Tz) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let start = zone
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()?
        .timestamp_millis();
    if end_of_day {
        let next = date.succ_opt()?;
        let next_start = zone
            .from_local_datetime(&next.and_time(NaiveTime::MIN))
            .earliest()?
            .timestamp_millis();
        Some(next_start - 1)
    } else {
        Some(start)
    }
}
