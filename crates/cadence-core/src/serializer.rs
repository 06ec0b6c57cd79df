//! Serialization of rules and recurrence sets back to RFC 5545 lines.

use chrono::Weekday;

use crate::models::{weekday_code, Occurrence, RuleOptions};
use crate::timezone;

/// Renders rule options as an RRULE value (without the `RRULE:` prefix).
///
/// Parts appear in a fixed order and defaults (`INTERVAL=1`, `WKST=MO`)
/// are omitted. DTSTART is not part of the output.
pub fn rrule_to_string(options: &RuleOptions) -> String {
    let mut parts = vec![format!("FREQ={}", options.freq)];

    if options.effective_interval() != 1 {
        parts.push(format!("INTERVAL={}", options.interval));
    }
    if options.wkst != Weekday::Mon {
        parts.push(format!("WKST={}", weekday_code(options.wkst)));
    }
    if options.count > 0 {
        parts.push(format!("COUNT={}", options.count));
    }
    if let Some(until) = options.until {
        let value = if options.all_day {
            until.format("%Y%m%d").to_string()
        } else {
            until.naive_utc().format("%Y%m%dT%H%M%SZ").to_string()
        };
        parts.push(format!("UNTIL={}", value));
    }

    push_list(&mut parts, "BYSETPOS", &options.bysetpos);
    push_list(&mut parts, "BYMONTH", &options.bymonth);
    push_list(&mut parts, "BYMONTHDAY", &options.bymonthday);
    push_list(&mut parts, "BYYEARDAY", &options.byyearday);
    push_list(&mut parts, "BYWEEKNO", &options.byweekno);
    push_list(&mut parts, "BYDAY", &options.byweekday);
    push_list(&mut parts, "BYHOUR", &options.byhour);
    push_list(&mut parts, "BYMINUTE", &options.byminute);
    push_list(&mut parts, "BYSECOND", &options.bysecond);
    push_list(&mut parts, "BYEASTER", &options.byeaster);

    parts.join(";")
}

/// Renders a whole recurrence set: DTSTART, RRULE, then one line per RDATE and EXDATE.
pub fn to_lines(
    dtstart: Option<Occurrence>,
    all_day: bool,
    rule: Option<&RuleOptions>,
    rdates: &[Occurrence],
    exdates: &[Occurrence],
) -> Vec<String> {
    let mut lines = Vec::with_capacity(2 + rdates.len() + exdates.len());
    if let Some(dtstart) = dtstart {
        lines.push(format!("DTSTART{}", format_value(dtstart, all_day)));
    }
    if let Some(rule) = rule {
        lines.push(format!("RRULE:{}", rrule_to_string(rule)));
    }
    for rdate in rdates {
        lines.push(format!("RDATE{}", format_value(*rdate, all_day)));
    }
    for exdate in exdates {
        lines.push(format!("EXDATE{}", format_value(*exdate, all_day)));
    }
    lines
}

/// Parameters and value of a date property, starting with `;` or `:`.
///
/// All-day values use `;VALUE=DATE`, UTC values the `Z` form and anything
/// else `;TZID=`.
pub fn format_value(dt: Occurrence, all_day: bool) -> String {
    if all_day {
        format!(";VALUE=DATE:{}", dt.format("%Y%m%d"))
    } else if timezone::is_utc(&dt) {
        format!(":{}", dt.format("%Y%m%dT%H%M%SZ"))
    } else {
        format!(";TZID={}:{}", dt.timezone().name(), dt.format("%Y%m%dT%H%M%S"))
    }
}

fn push_list<T: ToString>(parts: &mut Vec<String>, name: &str, values: &[T]) {
    if values.is_empty() {
        return;
    }
    let joined = values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    parts.push(format!("{}={}", name, joined));
}
