use crate::error::CoreError;
use crate::models::Occurrence;
use chrono::{Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Resolve an IANA timezone name
pub fn resolve_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone.trim())
        .map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// Validate IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<(), CoreError> {
    resolve_timezone(timezone).map(|_| ())
}

/// Attach a zone to a wall-clock time, handling DST transitions.
///
/// # Behavior
/// - Ambiguous times (fall back) resolve to the earlier instant
/// - Nonexistent times (spring forward) are pushed one hour later
/// - Returns `None` only if the shifted time is still unrepresentable
pub fn localize(tz: Tz, naive: NaiveDateTime) -> Option<Occurrence> {
    match tz.from_local_datetime(&naive).earliest() {
        Some(local_dt) => Some(local_dt),
        None => {
            let shifted = naive + Duration::hours(1);
            tz.from_local_datetime(&shifted).earliest()
        }
    }
}

/// Attach a zone to a wall-clock time, skipping times that do not exist.
///
/// Ambiguous times resolve to the earlier instant.
pub fn localize_existing(tz: Tz, naive: NaiveDateTime) -> Option<Occurrence> {
    tz.from_local_datetime(&naive).earliest()
}

/// Drop sub-second precision.
pub fn truncate_to_seconds(dt: Occurrence) -> Occurrence {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Canonical all-day form: UTC midnight of the value's calendar date in its own zone.
pub fn floor_to_date(dt: Occurrence) -> Occurrence {
    let date = dt.date_naive();
    Tz::UTC.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Apply the normalization every stored value goes through.
pub fn normalize(dt: Occurrence, all_day: bool) -> Occurrence {
    if all_day {
        floor_to_date(dt)
    } else {
        truncate_to_seconds(dt)
    }
}

/// Current instant in UTC, truncated to whole seconds.
pub fn utc_now() -> Occurrence {
    truncate_to_seconds(Utc::now().with_timezone(&Tz::UTC))
}

/// Whether a value carries the UTC zone (and serializes with a `Z` suffix).
pub fn is_utc(dt: &Occurrence) -> bool {
    matches!(dt.timezone(), Tz::UTC | Tz::Etc__UTC | Tz::Etc__Universal | Tz::Etc__Zulu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Offset};

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_validate_timezone() {
        assert!(validate_timezone("UTC").is_ok());
        assert!(validate_timezone("America/New_York").is_ok());
        assert!(validate_timezone("Invalid/Timezone").is_err());
    }

    #[test]
    fn test_localize_spring_forward_gap() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 02:30 does not exist on 2024-03-10
        let dt = localize(tz, naive(2024, 3, 10, 2, 30)).unwrap();
        assert_eq!(dt.naive_local(), naive(2024, 3, 10, 3, 30));
    }

    #[test]
    fn test_localize_fall_back_ambiguity() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 01:30 happens twice on 2024-11-03; the EDT reading comes first
        let dt = localize(tz, naive(2024, 11, 3, 1, 30)).unwrap();
        assert_eq!(dt.offset().fix().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn test_localize_existing_skips_gap() {
        let tz: Tz = "America/New_York".parse().unwrap();
        assert_eq!(localize_existing(tz, naive(2024, 3, 10, 2, 30)), None);
        let ambiguous = localize_existing(tz, naive(2024, 11, 3, 1, 30)).unwrap();
        assert_eq!(ambiguous.offset().fix().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn test_floor_uses_local_date_late_in_day() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 23:59:59 EDT is already 2024-06-02 in UTC
        let late = localize(tz, naive(2024, 6, 1, 23, 59) + Duration::seconds(59)).unwrap();
        assert_eq!(late.naive_utc().date(), naive(2024, 6, 2, 0, 0).date());

        let floored = floor_to_date(late);
        assert_eq!(floored.timezone(), Tz::UTC);
        assert_eq!(floored.naive_utc(), naive(2024, 6, 1, 0, 0));
    }

    #[test]
    fn test_normalize_all_day() {
        let tz: Tz = "Asia/Tokyo".parse().unwrap();
        let dt = localize(tz, naive(2024, 5, 1, 7, 15)).unwrap();
        let floored = normalize(dt, true);
        assert_eq!(floored.timezone(), Tz::UTC);
        assert_eq!(floored.naive_utc(), naive(2024, 5, 1, 0, 0));
    }

    #[test]
    fn test_truncate_to_seconds() {
        let dt = Tz::UTC
            .from_utc_datetime(&naive(2024, 1, 1, 9, 0))
            .with_nanosecond(123_456_789)
            .unwrap();
        assert_eq!(truncate_to_seconds(dt).nanosecond(), 0);
        assert!(is_utc(&dt));
    }
}
