use anyhow::{anyhow, Result};
use cadence_core::models::Occurrence;
use cadence_core::parser::parse_date_time_value;
use cadence_core::timezone::localize;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;

/// Parses a date argument given on the command line.
///
/// Accepted forms, tried in order:
/// - RFC 5545 values: `20250101`, `20250101T090000`, `20250101T090000Z`
/// - RFC 3339: `2025-01-01T09:00:00+01:00`
/// - Plain ISO dates and date-times: `2025-01-01`, `2025-01-01 09:00`
/// - Natural language: `tomorrow`, `next monday`, `3 days`
///
/// Floating values are read in `tz`.
pub fn parse_date_arg(input: &str, tz: Tz) -> Result<Occurrence> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("Empty date"));
    }

    if looks_like_rfc5545(input) {
        let (dt, _) = parse_date_time_value(input, None, tz)?;
        return Ok(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&tz));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return localize(tz, naive).ok_or_else(|| anyhow!("'{}' does not exist in {}", input, tz));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return localize(tz, date.and_hms_opt(0, 0, 0).unwrap_or_default())
            .ok_or_else(|| anyhow!("'{}' does not exist in {}", input, tz));
    }

    let now = Utc::now().with_timezone(&tz);
    parse_date_string(input, now, Dialect::Us)
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

fn looks_like_rfc5545(input: &str) -> bool {
    let body = input.strip_suffix(['Z', 'z']).unwrap_or(input);
    match body.len() {
        8 => body.bytes().all(|b| b.is_ascii_digit()),
        15 => {
            let bytes = body.as_bytes();
            (bytes[8] == b'T' || bytes[8] == b't')
                && bytes[..8].iter().chain(&bytes[9..]).all(u8::is_ascii_digit)
        }
        _ => false,
    }
}
