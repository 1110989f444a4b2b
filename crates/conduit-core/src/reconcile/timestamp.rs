//! Heuristic timestamp normalization.
//!
//! Vendors report timestamps as epoch seconds, epoch milliseconds, RFC3339,
//! RFC1123 (with zone name or numeric offset), or the Unix `date` layout
//! (`Mon Jan 2 15:04:05 MST 2006`). Everything is normalized to epoch
//! milliseconds; `0` means "no usable timestamp".

use chrono::{DateTime, NaiveDateTime};

/// Integers below this are epoch seconds, at or above it epoch milliseconds.
const SECONDS_THRESHOLD: i64 = 1_000_000_000_000;

/// Normalize a raw timestamp to epoch milliseconds.
///
/// Integer parse is tried first; textual layouts are tried in order and the
/// first successful parse wins. Empty or unparseable input returns `0`.
pub fn normalize_timestamp(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }

    if let Ok(n) = trimmed.parse::<i64>() {
        return match n {
            n if n <= 0 => 0,
            n if n < SECONDS_THRESHOLD => n * 1000,
            n => n,
        };
    }

    parse_rfc3339(trimmed)
        .or_else(|| parse_rfc1123(trimmed))
        .or_else(|| parse_unix_date(trimmed))
        .filter(|ms| *ms > 0)
        .unwrap_or(0)
}

fn parse_rfc3339(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// RFC1123 and RFC1123Z are both accepted by the RFC2822 parser, including
/// the obsolete North American zone names.
fn parse_rfc1123(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// `Mon Jan 2 15:04:05 MST 2006`. The weekday is ignored.
fn parse_unix_date(s: &str) -> Option<i64> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    let [_weekday, month, day, time, zone, year] = parts.as_slice() else {
        return None;
    };

    let naive = NaiveDateTime::parse_from_str(
        &format!("{month} {day} {time} {year}"),
        "%b %d %H:%M:%S %Y",
    )
    .ok()?;

    let offset_secs = zone_offset_secs(zone)?;
    Some(naive.and_utc().timestamp_millis() - offset_secs * 1000)
}

/// Offset east of UTC in seconds for a zone abbreviation or `+hhmm` offset.
///
/// Unknown abbreviations are treated as UTC.
fn zone_offset_secs(zone: &str) -> Option<i64> {
    let hours = match zone.to_ascii_uppercase().as_str() {
        "UTC" | "GMT" | "UT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => {
            return match zone.as_bytes().first() {
                Some(b'+') | Some(b'-') => parse_numeric_offset(zone),
                _ => Some(0),
            };
        }
    };
    Some(hours * 3600)
}

fn parse_numeric_offset(zone: &str) -> Option<i64> {
    let (sign, digits) = zone.split_at(1);
    let digits = digits.replace(':', "");
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i64 = digits[..2].parse().ok()?;
    let minutes: i64 = digits[2..].parse().ok()?;
    let secs = hours * 3600 + minutes * 60;
    Some(if sign == "-" { -secs } else { secs })
}
