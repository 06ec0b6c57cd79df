//! Parsing of RFC 5545 recurrence lines.
//!
//! Accepted lines are `DTSTART`, `RRULE`, `RDATE` and `EXDATE`, with the
//! `TZID` and `VALUE=DATE` parameters. A line without a property name is
//! read as an RRULE value.

use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use tracing::trace;

use crate::error::CoreError;
use crate::models::{parse_weekday_code, Frequency, Occurrence, RuleOptions, WeekdayRef};
use crate::timezone;

const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// The pieces of a recurrence set as read from text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedRecurrence {
    pub rule: Option<RuleOptions>,
    pub dtstart: Option<Occurrence>,
    pub all_day: bool,
    pub rdates: Vec<Occurrence>,
    pub exdates: Vec<Occurrence>,
}

impl ParsedRecurrence {
    /// Replaces DTSTART, keeping the rule's copy in step.
    pub fn with_dtstart(mut self, dtstart: Occurrence) -> Self {
        self.dtstart = Some(dtstart);
        if let Some(rule) = self.rule.as_mut() {
            rule.dtstart = Some(dtstart);
        }
        self
    }
}

/// Parses a whole recurrence definition, one property per line.
///
/// # Arguments
/// * `lines` - Property lines; blank lines are ignored
/// * `default_tz` - Zone for floating date-times without `TZID`
///
/// # Returns
/// * `Result<ParsedRecurrence, CoreError>` - The parsed set, or `CoreError::Parse`
///   (`CoreError::InvalidTimezone` for an unknown `TZID`)
///
/// # Behavior
/// - At most one DTSTART and one RRULE are allowed
/// - RDATE/EXDATE values may be comma separated
/// - `DTSTART;VALUE=DATE` makes the set all-day
/// - EXRULE and unknown properties are rejected
pub fn parse_lines<S: AsRef<str>>(lines: &[S], default_tz: Tz) -> Result<ParsedRecurrence, CoreError> {
    let properties = lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| !line.is_empty())
        .map(Property::parse)
        .collect::<Result<Vec<_>, _>>()?;

    let mut parsed = ParsedRecurrence::default();

    // DTSTART first: its zone is the default for everything else
    for property in properties.iter().filter(|p| p.name == "DTSTART") {
        if parsed.dtstart.is_some() {
            return Err(CoreError::Parse("multiple DTSTART lines".to_string()));
        }
        let (dtstart, is_date) = parse_date_time(property.value, &property.params, default_tz)?;
        parsed.dtstart = Some(dtstart);
        parsed.all_day = is_date;
    }
    let value_tz = parsed.dtstart.map(|dt| dt.timezone()).unwrap_or(default_tz);

    for property in &properties {
        match property.name.as_str() {
            "DTSTART" => {}
            "RRULE" => {
                if parsed.rule.is_some() {
                    return Err(CoreError::Parse("multiple RRULE lines".to_string()));
                }
                parsed.rule = Some(parse_rrule(property.value, value_tz)?);
            }
            "RDATE" => parsed
                .rdates
                .extend(parse_date_list(property.value, &property.params, value_tz)?),
            "EXDATE" => parsed
                .exdates
                .extend(parse_date_list(property.value, &property.params, value_tz)?),
            "EXRULE" => {
                return Err(CoreError::Parse("EXRULE is not supported".to_string()));
            }
            other => {
                return Err(CoreError::Parse(format!("unsupported property: {}", other)));
            }
        }
    }

    if let Some(rule) = parsed.rule.as_mut() {
        if let Some(dtstart) = parsed.dtstart {
            rule.dtstart = Some(dtstart);
        } else if let Some(inline) = rule.dtstart {
            parsed.dtstart = Some(inline);
        }
        rule.all_day = parsed.all_day;
    }

    trace!(
        has_rule = parsed.rule.is_some(),
        rdates = parsed.rdates.len(),
        exdates = parsed.exdates.len(),
        "parsed recurrence lines"
    );
    Ok(parsed)
}

/// Splits free text on newlines and parses it with [`parse_lines`].
pub fn parse_text(text: &str, default_tz: Tz) -> Result<ParsedRecurrence, CoreError> {
    let lines: Vec<&str> = text.lines().collect();
    parse_lines(&lines, default_tz)
}

/// Parses an RRULE value such as `FREQ=WEEKLY;BYDAY=MO,WE;COUNT=10`.
///
/// A leading `RRULE:` is accepted and ignored.
pub fn parse_rrule(value: &str, default_tz: Tz) -> Result<RuleOptions, CoreError> {
    let value = value.trim();
    let value = strip_prefix_ignore_case(value, "RRULE:").unwrap_or(value);

    let mut freq = None;
    let mut options = RuleOptions::default();

    for part in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, raw) = part
            .split_once('=')
            .ok_or_else(|| CoreError::Parse(format!("expected KEY=VALUE, got '{}'", part)))?;
        let raw = raw.trim();
        match key.trim().to_uppercase().as_str() {
            "FREQ" => {
                freq = Some(
                    raw.parse::<Frequency>()
                        .map_err(|e| CoreError::Parse(e.to_string()))?,
                )
            }
            "DTSTART" => options.dtstart = Some(parse_date_time(raw, &[], default_tz)?.0),
            "INTERVAL" => options.interval = parse_number(key, raw)?,
            "WKST" => {
                options.wkst = parse_weekday_code(raw).map_err(|e| CoreError::Parse(e.to_string()))?
            }
            "COUNT" => options.count = parse_number(key, raw)?,
            "UNTIL" => options.until = Some(parse_date_time(raw, &[], default_tz)?.0),
            "BYSETPOS" => options.bysetpos = parse_number_list(key, raw)?,
            "BYMONTH" => options.bymonth = parse_number_list(key, raw)?,
            "BYMONTHDAY" => options.bymonthday = parse_number_list(key, raw)?,
            "BYYEARDAY" => options.byyearday = parse_number_list(key, raw)?,
            "BYWEEKNO" => options.byweekno = parse_number_list(key, raw)?,
            "BYDAY" | "BYWEEKDAY" => {
                options.byweekday = raw
                    .split(',')
                    .map(|code| {
                        code.parse::<WeekdayRef>()
                            .map_err(|e| CoreError::Parse(e.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            "BYHOUR" => options.byhour = parse_number_list(key, raw)?,
            "BYMINUTE" => options.byminute = parse_number_list(key, raw)?,
            "BYSECOND" => options.bysecond = parse_number_list(key, raw)?,
            "BYEASTER" => options.byeaster = parse_number_list(key, raw)?,
            other => {
                return Err(CoreError::Parse(format!("unknown RRULE part: {}", other)));
            }
        }
    }

    options.freq = freq.ok_or_else(|| CoreError::Parse("RRULE is missing FREQ".to_string()))?;
    if options.count > 0 && options.until.is_some() {
        return Err(CoreError::Parse(
            "COUNT and UNTIL must not both be present".to_string(),
        ));
    }
    Ok(options)
}

/// Parses a single date or date-time value.
///
/// # Behavior
/// - `YYYYMMDDTHHMMSSZ` is UTC
/// - `YYYYMMDDTHHMMSS` is floating, attached to `tzid` or `default_tz`
/// - `YYYYMMDD` is a date, returned as UTC midnight with the flag set
pub fn parse_date_time_value(
    value: &str,
    tzid: Option<&str>,
    default_tz: Tz,
) -> Result<(Occurrence, bool), CoreError> {
    let value = value.trim();
    if value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d")
            .map_err(|_| CoreError::Parse(format!("invalid date: {}", value)))?;
        let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        return Ok((Tz::UTC.from_utc_datetime(&midnight), true));
    }

    if let Some(utc_value) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        let naive = NaiveDateTime::parse_from_str(utc_value, DATE_TIME_FORMAT)
            .map_err(|_| CoreError::Parse(format!("invalid date-time: {}", value)))?;
        return Ok((Tz::UTC.from_utc_datetime(&naive), false));
    }

    let naive = NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT)
        .map_err(|_| CoreError::Parse(format!("invalid date-time: {}", value)))?;
    let tz = match tzid {
        Some(name) => timezone::resolve_timezone(name)?,
        None => default_tz,
    };
    let dt = timezone::localize(tz, naive)
        .ok_or_else(|| CoreError::Parse(format!("{} does not exist in {}", value, tz)))?;
    Ok((dt, false))
}

// ============================================================================
// Line structure
// ============================================================================

struct Property<'a> {
    name: String,
    params: Vec<(String, &'a str)>,
    value: &'a str,
}

impl<'a> Property<'a> {
    fn parse(line: &'a str) -> Result<Self, CoreError> {
        let Some((head, value)) = line.split_once(':') else {
            // bare RRULE value
            return Ok(Self {
                name: "RRULE".to_string(),
                params: Vec::new(),
                value: line,
            });
        };

        if head.contains('=') && !head.contains(';') {
            // "FREQ=DAILY;UNTIL=..." style values never have a colon before the first '='
            return Ok(Self {
                name: "RRULE".to_string(),
                params: Vec::new(),
                value: line,
            });
        }

        let mut parts = head.split(';');
        let name = parts.next().unwrap_or_default().trim().to_uppercase();
        let params = parts
            .map(|param| {
                param
                    .split_once('=')
                    .map(|(k, v)| (k.trim().to_uppercase(), v.trim()))
                    .ok_or_else(|| CoreError::Parse(format!("invalid parameter '{}' in '{}'", param, line)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { name, params, value })
    }
}

fn param<'a>(params: &[(String, &'a str)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
}

fn parse_date_time(
    value: &str,
    params: &[(String, &str)],
    default_tz: Tz,
) -> Result<(Occurrence, bool), CoreError> {
    match param(params, "VALUE").map(str::to_uppercase).as_deref() {
        None | Some("DATE-TIME") | Some("DATE") => {}
        Some(other) => {
            return Err(CoreError::Parse(format!("unsupported VALUE type: {}", other)));
        }
    }
    parse_date_time_value(value, param(params, "TZID"), default_tz)
}

fn parse_date_list(
    value: &str,
    params: &[(String, &str)],
    default_tz: Tz,
) -> Result<Vec<Occurrence>, CoreError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| parse_date_time(v, params, default_tz).map(|(dt, _)| dt))
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, CoreError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| CoreError::Parse(format!("invalid {} value: {}", key.to_uppercase(), raw)))
}

fn parse_number_list<T: std::str::FromStr>(key: &str, raw: &str) -> Result<Vec<T>, CoreError> {
    raw.split(',').map(|item| parse_number(key, item)).collect()
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if value.len() >= prefix.len()
        && value.is_char_boundary(prefix.len())
        && value[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}
