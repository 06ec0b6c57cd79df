use cadence_core::models::Occurrence;
use chrono_tz::Tz;

/// Formats an occurrence for display, with the zone abbreviation.
///
/// All-day occurrences are shown as bare dates. Otherwise the instant is
/// converted to `display_tz` when given, and shown in its own zone if not.
pub fn format_occurrence(dt: Occurrence, display_tz: Option<Tz>, all_day: bool) -> String {
    if all_day {
        return dt.format("%Y-%m-%d").to_string();
    }
    let local = match display_tz {
        Some(tz) => dt.with_timezone(&tz),
        None => dt,
    };
    format!("{} ({})", local.format("%Y-%m-%d %H:%M:%S"), local.format("%Z"))
}

/// Offset string for an occurrence as displayed (e.g., "-05:00")
pub fn format_offset(dt: Occurrence, display_tz: Option<Tz>) -> String {
    let local = match display_tz {
        Some(tz) => dt.with_timezone(&tz),
        None => dt,
    };
    local.format("%:z").to_string()
}
