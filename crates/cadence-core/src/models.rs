use chrono::{DateTime, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A concrete occurrence instant. All-day occurrences are UTC midnights.
pub type Occurrence = DateTime<Tz>;

/// Recurrence frequency, ordered from coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Yearly => "YEARLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Daily => "DAILY",
            Frequency::Hourly => "HOURLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Secondly => "SECONDLY",
        }
    }

    /// True for HOURLY, MINUTELY and SECONDLY.
    #[inline]
    pub fn is_sub_daily(&self) -> bool {
        *self >= Frequency::Hourly
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid frequency: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "YEARLY" => Ok(Frequency::Yearly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "WEEKLY" => Ok(Frequency::Weekly),
            "DAILY" => Ok(Frequency::Daily),
            "HOURLY" => Ok(Frequency::Hourly),
            "MINUTELY" => Ok(Frequency::Minutely),
            "SECONDLY" => Ok(Frequency::Secondly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid weekday: {0}")]
pub struct ParseWeekdayError(String);

/// Two-letter RFC 5545 weekday code.
pub fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

pub fn parse_weekday_code(code: &str) -> Result<Weekday, ParseWeekdayError> {
    match code.to_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        _ => Err(ParseWeekdayError(code.to_string())),
    }
}

/// A BYDAY entry: a weekday with an optional signed ordinal ("2MO", "-1FR").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WeekdayRef {
    pub weekday: Weekday,
    pub ordinal: Option<i16>,
}

impl WeekdayRef {
    /// Every such weekday in the period.
    pub fn every(weekday: Weekday) -> Self {
        Self { weekday, ordinal: None }
    }

    /// The n-th such weekday in the period; negative counts from the end.
    pub fn nth(weekday: Weekday, ordinal: i16) -> Self {
        Self { weekday, ordinal: Some(ordinal) }
    }
}

impl fmt::Display for WeekdayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ordinal {
            Some(n) => write!(f, "{:+}{}", n, weekday_code(self.weekday)),
            None => f.write_str(weekday_code(self.weekday)),
        }
    }
}

impl FromStr for WeekdayRef {
    type Err = ParseWeekdayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() < 2 || !s.is_char_boundary(s.len() - 2) {
            return Err(ParseWeekdayError(s.to_string()));
        }
        let (prefix, code) = s.split_at(s.len() - 2);
        let weekday = parse_weekday_code(code).map_err(|_| ParseWeekdayError(s.to_string()))?;
        if prefix.is_empty() {
            return Ok(WeekdayRef::every(weekday));
        }
        let ordinal = prefix
            .parse::<i16>()
            .map_err(|_| ParseWeekdayError(s.to_string()))?;
        Ok(WeekdayRef::nth(weekday, ordinal))
    }
}

/// Rule parameters, as produced by the line parser or built by hand.
///
/// `count == 0` means unbounded. `interval == 0` is treated as 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOptions {
    pub freq: Frequency,
    pub dtstart: Option<Occurrence>,
    pub all_day: bool,
    pub interval: i32,
    pub wkst: Weekday,
    pub count: u32,
    pub until: Option<Occurrence>,
    pub bysetpos: Vec<i32>,
    pub bymonth: Vec<u32>,
    pub bymonthday: Vec<i32>,
    pub byyearday: Vec<i32>,
    pub byweekno: Vec<i32>,
    pub byweekday: Vec<WeekdayRef>,
    pub byhour: Vec<u32>,
    pub byminute: Vec<u32>,
    pub bysecond: Vec<u32>,
    pub byeaster: Vec<i32>,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            freq: Frequency::Yearly,
            dtstart: None,
            all_day: false,
            interval: 1,
            wkst: Weekday::Mon,
            count: 0,
            until: None,
            bysetpos: Vec::new(),
            bymonth: Vec::new(),
            bymonthday: Vec::new(),
            byyearday: Vec::new(),
            byweekno: Vec::new(),
            byweekday: Vec::new(),
            byhour: Vec::new(),
            byminute: Vec::new(),
            bysecond: Vec::new(),
            byeaster: Vec::new(),
        }
    }
}

impl RuleOptions {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            ..Default::default()
        }
    }

    /// Interval with the implicit default applied.
    #[inline]
    pub fn effective_interval(&self) -> i32 {
        if self.interval == 0 {
            1
        } else {
            self.interval
        }
    }
}

// ============================================================================
// Change analysis
// ============================================================================

/// How a dependent materialized schedule must react to a recurrence edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeType {
    NoChange,
    FullRebuild,
    PartialUpdate,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::NoChange => write!(f, "no change"),
            ChangeType::FullRebuild => write!(f, "full rebuild"),
            ChangeType::PartialUpdate => write!(f, "partial update"),
        }
    }
}

/// Result of comparing two recurrence definitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeAnalysis {
    pub change_type: ChangeType,
    /// Materialized occurrences strictly after this instant must be deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_after: Option<Occurrence>,
    /// Start (inclusive) of the generation window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_from: Option<Occurrence>,
    /// End (exclusive) of the generation window; `None` means open-ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_until: Option<Occurrence>,
    pub new_exdates: Vec<Occurrence>,
    pub removed_exdates: Vec<Occurrence>,
    pub description: String,
}

impl ChangeAnalysis {
    /// Whether `dt` falls in the half-open window `[generate_from, generate_until)`.
    pub fn in_generation_window(&self, dt: Occurrence) -> bool {
        match (self.generate_from, self.generate_until) {
            (Some(from), Some(until)) => dt >= from && dt < until,
            (Some(from), None) => dt >= from,
            _ => false,
        }
    }

    pub(crate) fn no_change() -> Self {
        Self::with_type(ChangeType::NoChange, "no changes detected".to_string())
    }

    pub(crate) fn full_rebuild(reason: &str) -> Self {
        Self::with_type(
            ChangeType::FullRebuild,
            format!("{} - full rebuild required", reason),
        )
    }

    pub(crate) fn with_type(change_type: ChangeType, description: String) -> Self {
        Self {
            change_type,
            delete_after: None,
            generate_from: None,
            generate_until: None,
            new_exdates: Vec::new(),
            removed_exdates: Vec::new(),
            description,
        }
    }

    pub fn is_no_change(&self) -> bool {
        self.change_type == ChangeType::NoChange
    }

    pub fn requires_full_rebuild(&self) -> bool {
        self.change_type == ChangeType::FullRebuild
    }
}
