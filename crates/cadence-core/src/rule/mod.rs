//! Compiled recurrence rules.
//!
//! [`Rule::new`] validates [`RuleOptions`], fills in the defaults RFC 5545
//! derives from DTSTART, and precomputes the per-day time set. Expansion
//! itself is lazy: [`Rule::iter`] yields occurrences in ascending order.

mod iter;
mod masks;

pub use iter::RuleIter;
pub(crate) use masks::PeriodMasks;

use chrono::{Datelike, NaiveTime, Timelike};
use chrono_tz::Tz;
use tracing::debug;

use crate::error::CoreError;
use crate::models::{Frequency, Occurrence, RuleOptions};
use crate::timezone;

/// An n-th weekday constraint, e.g. the second Monday (`n == 2`) of a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NthWeekday {
    /// 0 = Monday .. 6 = Sunday
    pub weekday: u32,
    pub n: i32,
}

/// A validated rule ready for expansion.
#[derive(Debug, Clone)]
pub struct Rule {
    options: RuleOptions,
    pub(crate) freq: Frequency,
    pub(crate) dtstart: Occurrence,
    pub(crate) tz: Tz,
    pub(crate) interval: i32,
    pub(crate) count: u32,
    pub(crate) until: Option<Occurrence>,
    pub(crate) wkst: u32,
    pub(crate) bysetpos: Vec<i32>,
    pub(crate) bymonth: Vec<u32>,
    pub(crate) bymonthday: Vec<i32>,
    pub(crate) bynmonthday: Vec<i32>,
    pub(crate) byyearday: Vec<i32>,
    pub(crate) byweekno: Vec<i32>,
    pub(crate) byweekday: Vec<u32>,
    pub(crate) bynweekday: Vec<NthWeekday>,
    pub(crate) byhour: Vec<u32>,
    pub(crate) byminute: Vec<u32>,
    pub(crate) bysecond: Vec<u32>,
    pub(crate) byeaster: Vec<i32>,
    pub(crate) timeset: Vec<NaiveTime>,
}

impl Rule {
    /// Compiles rule options into an expandable rule.
    ///
    /// # Arguments
    /// * `options` - Rule parameters; a missing DTSTART defaults to now
    ///
    /// # Returns
    /// * `Result<Self, CoreError>` - The compiled rule, or `CoreError::Validation`
    ///
    /// # Behavior
    /// - Rejects BY* values outside their RFC 5545 ranges and negative intervals
    /// - Truncates DTSTART to whole seconds, or to UTC midnight for all-day rules
    /// - Without any day filter, YEARLY/MONTHLY/WEEKLY anchor on DTSTART's
    ///   month, day-of-month or weekday
    /// - BYDAY ordinals only count for MONTHLY and YEARLY; finer frequencies
    ///   treat "2MO" as plain "MO"
    pub fn new(options: RuleOptions) -> Result<Self, CoreError> {
        validate_options(&options)?;

        let all_day = options.all_day;
        let dtstart = timezone::normalize(
            options.dtstart.unwrap_or_else(timezone::utc_now),
            all_day,
        );
        let until = options.until.map(timezone::truncate_to_seconds);
        let freq = options.freq;

        let mut bymonth = options.bymonth.clone();
        let mut byweekday = Vec::new();
        let mut bynweekday = Vec::new();
        let mut bymonthday = Vec::new();
        let mut bynmonthday = Vec::new();

        for day in &options.bymonthday {
            if *day > 0 {
                bymonthday.push(*day);
            } else {
                bynmonthday.push(*day);
            }
        }

        for weekday_ref in &options.byweekday {
            let weekday = weekday_ref.weekday.num_days_from_monday();
            match weekday_ref.ordinal {
                Some(n) if freq <= Frequency::Monthly => bynweekday.push(NthWeekday {
                    weekday,
                    n: i32::from(n),
                }),
                _ => byweekday.push(weekday),
            }
        }

        let has_day_filter = !options.byweekno.is_empty()
            || !options.byyearday.is_empty()
            || !options.bymonthday.is_empty()
            || !options.byweekday.is_empty()
            || !options.byeaster.is_empty();

        if !has_day_filter {
            match freq {
                Frequency::Yearly => {
                    if bymonth.is_empty() {
                        bymonth.push(dtstart.month());
                    }
                    bymonthday.push(dtstart.day() as i32);
                }
                Frequency::Monthly => bymonthday.push(dtstart.day() as i32),
                Frequency::Weekly => byweekday.push(dtstart.weekday().num_days_from_monday()),
                _ => {}
            }
        }

        let (byhour, byminute, bysecond) = if all_day {
            (vec![0], vec![0], vec![0])
        } else {
            (
                default_from_dtstart(&options.byhour, freq < Frequency::Hourly, dtstart.hour()),
                default_from_dtstart(&options.byminute, freq < Frequency::Minutely, dtstart.minute()),
                default_from_dtstart(&options.bysecond, freq < Frequency::Secondly, dtstart.second()),
            )
        };

        let timeset = if freq < Frequency::Hourly {
            let mut times = Vec::with_capacity(byhour.len() * byminute.len() * bysecond.len());
            for hour in &byhour {
                for minute in &byminute {
                    for second in &bysecond {
                        if let Some(t) = NaiveTime::from_hms_opt(*hour, *minute, *second) {
                            times.push(t);
                        }
                    }
                }
            }
            times.sort();
            times
        } else {
            Vec::new()
        };

        let options = RuleOptions {
            dtstart: Some(dtstart),
            until,
            ..options
        };

        debug!(freq = %freq, dtstart = %dtstart, all_day, "compiled recurrence rule");

        Ok(Self {
            freq,
            tz: dtstart.timezone(),
            dtstart,
            interval: options.effective_interval(),
            count: options.count,
            until,
            wkst: options.wkst.num_days_from_monday(),
            bysetpos: options.bysetpos.clone(),
            bymonth,
            bymonthday,
            bynmonthday,
            byyearday: options.byyearday.clone(),
            byweekno: options.byweekno.clone(),
            byweekday,
            bynweekday,
            byhour,
            byminute,
            bysecond,
            byeaster: options.byeaster.clone(),
            timeset,
            options,
        })
    }

    /// The options this rule was built from, with DTSTART resolved.
    pub fn options(&self) -> &RuleOptions {
        &self.options
    }

    pub fn dtstart(&self) -> Occurrence {
        self.dtstart
    }

    pub fn frequency(&self) -> Frequency {
        self.freq
    }

    pub fn is_all_day(&self) -> bool {
        self.options.all_day
    }

    /// Lazily expands the rule in ascending order.
    pub fn iter(&self) -> RuleIter<'_> {
        RuleIter::new(self)
    }

    /// Every occurrence, stopping after `limit` when given.
    ///
    /// An unbounded rule without a limit expands until year 9999.
    pub fn all(&self, limit: Option<usize>) -> Vec<Occurrence> {
        match limit {
            Some(limit) => self.iter().take(limit).collect(),
            None => self.iter().collect(),
        }
    }

    /// Occurrences within `[after, before]`, or `(after, before)` when `inclusive` is false.
    pub fn between(&self, after: Occurrence, before: Occurrence, inclusive: bool) -> Vec<Occurrence> {
        between(self.iter(), after, before, inclusive)
    }

    /// The last occurrence before `dt` (or at it, when `inclusive`).
    pub fn before(&self, dt: Occurrence, inclusive: bool) -> Option<Occurrence> {
        before(self.iter(), dt, inclusive)
    }

    /// The first occurrence after `dt` (or at it, when `inclusive`).
    pub fn after(&self, dt: Occurrence, inclusive: bool) -> Option<Occurrence> {
        after(self.iter(), dt, inclusive)
    }
}

impl<'a> IntoIterator for &'a Rule {
    type Item = Occurrence;
    type IntoIter = RuleIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// Queries over any ascending occurrence stream
// ============================================================================

pub(crate) fn between<I>(iter: I, after: Occurrence, before: Occurrence, inclusive: bool) -> Vec<Occurrence>
where
    I: Iterator<Item = Occurrence>,
{
    iter.skip_while(|dt| if inclusive { *dt < after } else { *dt <= after })
        .take_while(|dt| if inclusive { *dt <= before } else { *dt < before })
        .collect()
}

pub(crate) fn before<I>(iter: I, dt: Occurrence, inclusive: bool) -> Option<Occurrence>
where
    I: Iterator<Item = Occurrence>,
{
    iter.take_while(|candidate| if inclusive { *candidate <= dt } else { *candidate < dt })
        .last()
}

pub(crate) fn after<I>(mut iter: I, dt: Occurrence, inclusive: bool) -> Option<Occurrence>
where
    I: Iterator<Item = Occurrence>,
{
    iter.find(|candidate| if inclusive { *candidate >= dt } else { *candidate > dt })
}

// ============================================================================
// Validation
// ============================================================================

fn default_from_dtstart(values: &[u32], applies: bool, component: u32) -> Vec<u32> {
    if values.is_empty() && applies {
        vec![component]
    } else {
        values.to_vec()
    }
}

fn check_unsigned(name: &str, values: &[u32], min: u32, max: u32) -> Result<(), CoreError> {
    match values.iter().find(|v| **v < min || **v > max) {
        Some(v) => Err(CoreError::Validation(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, v
        ))),
        None => Ok(()),
    }
}

fn check_signed(name: &str, values: &[i32], max: i32) -> Result<(), CoreError> {
    match values.iter().find(|v| **v == 0 || v.abs() > max) {
        Some(v) => Err(CoreError::Validation(format!(
            "{} must be between -{max} and -1 or 1 and {max}, got {}",
            name, v
        ))),
        None => Ok(()),
    }
}

fn validate_options(options: &RuleOptions) -> Result<(), CoreError> {
    if options.interval < 0 {
        return Err(CoreError::Validation(format!(
            "INTERVAL must not be negative, got {}",
            options.interval
        )));
    }
    if options.count > 0 && options.until.is_some() {
        return Err(CoreError::Validation(
            "COUNT and UNTIL are mutually exclusive".to_string(),
        ));
    }

    check_unsigned("BYSECOND", &options.bysecond, 0, 59)?;
    check_unsigned("BYMINUTE", &options.byminute, 0, 59)?;
    check_unsigned("BYHOUR", &options.byhour, 0, 23)?;
    check_unsigned("BYMONTH", &options.bymonth, 1, 12)?;
    check_signed("BYMONTHDAY", &options.bymonthday, 31)?;
    check_signed("BYYEARDAY", &options.byyearday, 366)?;
    check_signed("BYWEEKNO", &options.byweekno, 53)?;
    check_signed("BYSETPOS", &options.bysetpos, 366)?;

    if let Some(weekday_ref) = options
        .byweekday
        .iter()
        .find(|w| matches!(w.ordinal, Some(n) if n == 0 || n.abs() > 53))
    {
        return Err(CoreError::Validation(format!(
            "BYDAY ordinal must be between -53 and -1 or 1 and 53, got {}",
            weekday_ref
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeekdayRef;
    use chrono::{NaiveDate, TimeZone, Weekday};
    use proptest::prelude::*;
    use rstest::rstest;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Occurrence {
        Tz::UTC.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn ny(y: i32, m: u32, d: u32, h: u32, min: u32) -> Occurrence {
        chrono_tz::America::New_York
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    fn options(freq: Frequency, dtstart: Occurrence) -> RuleOptions {
        RuleOptions {
            dtstart: Some(dtstart),
            ..RuleOptions::new(freq)
        }
    }

    fn dates(occurrences: &[Occurrence]) -> Vec<NaiveDate> {
        occurrences.iter().map(|dt| dt.date_naive()).collect()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod validation_tests {
        use super::*;

        #[rstest]
        #[case(RuleOptions { bysecond: vec![60], ..Default::default() })]
        #[case(RuleOptions { byminute: vec![75], ..Default::default() })]
        #[case(RuleOptions { byhour: vec![24], ..Default::default() })]
        #[case(RuleOptions { bymonth: vec![0], ..Default::default() })]
        #[case(RuleOptions { bymonth: vec![13], ..Default::default() })]
        #[case(RuleOptions { bymonthday: vec![0], ..Default::default() })]
        #[case(RuleOptions { bymonthday: vec![32], ..Default::default() })]
        #[case(RuleOptions { byyearday: vec![-367], ..Default::default() })]
        #[case(RuleOptions { byweekno: vec![54], ..Default::default() })]
        #[case(RuleOptions { bysetpos: vec![0], ..Default::default() })]
        #[case(RuleOptions { interval: -1, ..Default::default() })]
        #[case(RuleOptions { byweekday: vec![WeekdayRef::nth(Weekday::Mon, 54)], ..Default::default() })]
        #[case(RuleOptions { byweekday: vec![WeekdayRef::nth(Weekday::Mon, 0)], ..Default::default() })]
        fn test_out_of_range_rejected(#[case] options: RuleOptions) {
            let result = Rule::new(options);
            assert!(matches!(result, Err(CoreError::Validation(_))));
        }

        #[test]
        fn test_count_and_until_exclusive() {
            let options = RuleOptions {
                count: 3,
                until: Some(utc(2024, 1, 1, 0, 0, 0)),
                ..RuleOptions::new(Frequency::Daily)
            };
            assert!(matches!(Rule::new(options), Err(CoreError::Validation(_))));
        }

        #[test]
        fn test_boundary_values_accepted() {
            let options = RuleOptions {
                bymonthday: vec![-31, 31],
                byyearday: vec![-366, 366],
                byweekno: vec![-53, 53],
                bysecond: vec![0, 59],
                ..options(Frequency::Yearly, utc(2024, 1, 1, 0, 0, 0))
            };
            assert!(Rule::new(options).is_ok());
        }

        #[test]
        fn test_missing_dtstart_defaults_to_now() {
            let rule = Rule::new(RuleOptions::new(Frequency::Daily)).unwrap();
            assert_eq!(rule.dtstart().timestamp_subsec_nanos(), 0);
            assert!(rule.options().dtstart.is_some());
        }
    }

    mod expansion_tests {
        use super::*;

        #[test]
        fn test_daily_count() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                ..options(Frequency::Daily, utc(1997, 9, 2, 9, 0, 0))
            })
            .unwrap();
            assert_eq!(
                rule.all(None),
                vec![
                    utc(1997, 9, 2, 9, 0, 0),
                    utc(1997, 9, 3, 9, 0, 0),
                    utc(1997, 9, 4, 9, 0, 0),
                ]
            );
        }

        #[test]
        fn test_daily_until_inclusive() {
            let rule = Rule::new(RuleOptions {
                until: Some(utc(2024, 1, 5, 9, 0, 0)),
                ..options(Frequency::Daily, utc(2024, 1, 1, 9, 0, 0))
            })
            .unwrap();
            let all = rule.all(None);
            assert_eq!(all.len(), 5);
            assert_eq!(all.last(), Some(&utc(2024, 1, 5, 9, 0, 0)));
        }

        #[test]
        fn test_hourly_skips_spring_forward_gap() {
            let rule = Rule::new(RuleOptions {
                count: 5,
                ..options(Frequency::Hourly, ny(2024, 3, 10, 0, 0))
            })
            .unwrap();
            assert_eq!(
                rule.all(None),
                vec![
                    ny(2024, 3, 10, 0, 0),
                    ny(2024, 3, 10, 1, 0),
                    ny(2024, 3, 10, 3, 0),
                    ny(2024, 3, 10, 4, 0),
                    ny(2024, 3, 10, 5, 0),
                ]
            );
        }

        #[test]
        fn test_minutely_skips_spring_forward_gap() {
            let rule = Rule::new(RuleOptions {
                count: 4,
                ..options(Frequency::Minutely, ny(2024, 3, 10, 1, 58))
            })
            .unwrap();
            let all = rule.all(None);
            assert_eq!(
                all,
                vec![
                    ny(2024, 3, 10, 1, 58),
                    ny(2024, 3, 10, 1, 59),
                    ny(2024, 3, 10, 3, 0),
                    ny(2024, 3, 10, 3, 1),
                ]
            );
            assert!(all.windows(2).all(|pair| pair[0] < pair[1]));
        }

        #[test]
        fn test_hourly_across_fall_back_stays_increasing() {
            let rule = Rule::new(RuleOptions {
                count: 4,
                ..options(Frequency::Hourly, ny(2024, 11, 3, 0, 0))
            })
            .unwrap();
            // 01:00 resolves to EDT, so the repeated hour is not emitted twice
            assert_eq!(
                rule.all(None),
                vec![
                    utc(2024, 11, 3, 4, 0, 0),
                    utc(2024, 11, 3, 5, 0, 0),
                    utc(2024, 11, 3, 7, 0, 0),
                    utc(2024, 11, 3, 8, 0, 0),
                ]
            );
        }

        #[test]
        fn test_weekly_interval_with_byday() {
            // Every other week on Tuesday and Thursday
            let rule = Rule::new(RuleOptions {
                interval: 2,
                count: 6,
                wkst: Weekday::Sun,
                byweekday: vec![WeekdayRef::every(Weekday::Tue), WeekdayRef::every(Weekday::Thu)],
                ..options(Frequency::Weekly, utc(1997, 9, 2, 9, 0, 0))
            })
            .unwrap();
            assert_eq!(
                dates(&rule.all(None)),
                vec![
                    ymd(1997, 9, 2),
                    ymd(1997, 9, 4),
                    ymd(1997, 9, 16),
                    ymd(1997, 9, 18),
                    ymd(1997, 9, 30),
                    ymd(1997, 10, 2),
                ]
            );
        }

        #[test]
        fn test_monthly_last_friday() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                byweekday: vec![WeekdayRef::nth(Weekday::Fri, -1)],
                ..options(Frequency::Monthly, utc(2024, 1, 1, 10, 0, 0))
            })
            .unwrap();
            assert_eq!(
                dates(&rule.all(None)),
                vec![ymd(2024, 1, 26), ymd(2024, 2, 23), ymd(2024, 3, 29)]
            );
        }

        #[test]
        fn test_monthly_31st_skips_short_months() {
            let rule = Rule::new(RuleOptions {
                count: 4,
                ..options(Frequency::Monthly, utc(2024, 1, 31, 8, 0, 0))
            })
            .unwrap();
            assert_eq!(
                dates(&rule.all(None)),
                vec![ymd(2024, 1, 31), ymd(2024, 3, 31), ymd(2024, 5, 31), ymd(2024, 7, 31)]
            );
        }

        #[test]
        fn test_monthly_negative_monthday() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                bymonthday: vec![-1],
                ..options(Frequency::Monthly, utc(2023, 1, 1, 0, 0, 0))
            })
            .unwrap();
            assert_eq!(
                dates(&rule.all(None)),
                vec![ymd(2023, 1, 31), ymd(2023, 2, 28), ymd(2023, 3, 31)]
            );
        }

        #[test]
        fn test_yearly_leap_day() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                ..options(Frequency::Yearly, utc(2024, 2, 29, 12, 0, 0))
            })
            .unwrap();
            assert_eq!(
                dates(&rule.all(None)),
                vec![ymd(2024, 2, 29), ymd(2028, 2, 29), ymd(2032, 2, 29)]
            );
        }

        #[test]
        fn test_yearly_nth_weekday_of_month() {
            // US Thanksgiving: fourth Thursday of November
            let rule = Rule::new(RuleOptions {
                count: 3,
                bymonth: vec![11],
                byweekday: vec![WeekdayRef::nth(Weekday::Thu, 4)],
                ..options(Frequency::Yearly, utc(2023, 1, 1, 0, 0, 0))
            })
            .unwrap();
            assert_eq!(
                dates(&rule.all(None)),
                vec![ymd(2023, 11, 23), ymd(2024, 11, 28), ymd(2025, 11, 27)]
            );
        }

        #[test]
        fn test_yearly_byweekno() {
            // Monday of ISO week 20
            let rule = Rule::new(RuleOptions {
                count: 3,
                byweekno: vec![20],
                byweekday: vec![WeekdayRef::every(Weekday::Mon)],
                ..options(Frequency::Yearly, utc(1997, 5, 12, 9, 0, 0))
            })
            .unwrap();
            assert_eq!(
                dates(&rule.all(None)),
                vec![ymd(1997, 5, 12), ymd(1998, 5, 11), ymd(1999, 5, 17)]
            );
        }

        #[test]
        fn test_yearly_byweekno_first_week_spans_years() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                byweekno: vec![1],
                byweekday: vec![WeekdayRef::every(Weekday::Mon)],
                ..options(Frequency::Yearly, utc(1997, 9, 2, 9, 0, 0))
            })
            .unwrap();
            assert_eq!(
                dates(&rule.all(None)),
                vec![ymd(1997, 12, 29), ymd(1999, 1, 4), ymd(2000, 1, 3)]
            );
        }

        #[test]
        fn test_yearly_byyearday() {
            let rule = Rule::new(RuleOptions {
                count: 4,
                byyearday: vec![1, 100, 200],
                ..options(Frequency::Yearly, utc(1997, 1, 1, 9, 0, 0))
            })
            .unwrap();
            assert_eq!(
                dates(&rule.all(None)),
                vec![ymd(1997, 1, 1), ymd(1997, 4, 10), ymd(1997, 7, 19), ymd(1998, 1, 1)]
            );
        }

        #[test]
        fn test_byeaster() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                byeaster: vec![-2],
                ..options(Frequency::Yearly, utc(2024, 1, 1, 0, 0, 0))
            })
            .unwrap();
            // Good Friday
            assert_eq!(
                dates(&rule.all(None)),
                vec![ymd(2024, 3, 29), ymd(2025, 4, 18), ymd(2026, 4, 3)]
            );
        }

        #[test]
        fn test_bysetpos_last_workday() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                byweekday: [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
                    .into_iter()
                    .map(WeekdayRef::every)
                    .collect(),
                bysetpos: vec![-1],
                ..options(Frequency::Monthly, utc(2024, 1, 1, 17, 0, 0))
            })
            .unwrap();
            assert_eq!(
                dates(&rule.all(None)),
                vec![ymd(2024, 1, 31), ymd(2024, 2, 29), ymd(2024, 3, 29)]
            );
        }

        #[test]
        fn test_hourly_byhour_filter() {
            let rule = Rule::new(RuleOptions {
                count: 4,
                interval: 6,
                byhour: vec![0, 12],
                ..options(Frequency::Hourly, utc(2024, 1, 1, 0, 0, 0))
            })
            .unwrap();
            assert_eq!(
                rule.all(None),
                vec![
                    utc(2024, 1, 1, 0, 0, 0),
                    utc(2024, 1, 1, 12, 0, 0),
                    utc(2024, 1, 2, 0, 0, 0),
                    utc(2024, 1, 2, 12, 0, 0),
                ]
            );
        }

        #[test]
        fn test_minutely_interval() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                interval: 90,
                ..options(Frequency::Minutely, utc(2024, 1, 1, 23, 0, 0))
            })
            .unwrap();
            assert_eq!(
                rule.all(None),
                vec![
                    utc(2024, 1, 1, 23, 0, 0),
                    utc(2024, 1, 2, 0, 30, 0),
                    utc(2024, 1, 2, 2, 0, 0),
                ]
            );
        }

        #[test]
        fn test_secondly_bysecond() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                bysecond: vec![15, 45],
                ..options(Frequency::Secondly, utc(2024, 1, 1, 0, 0, 30))
            })
            .unwrap();
            assert_eq!(
                rule.all(None),
                vec![
                    utc(2024, 1, 1, 0, 0, 45),
                    utc(2024, 1, 1, 0, 1, 15),
                    utc(2024, 1, 1, 0, 1, 45),
                ]
            );
        }

        #[test]
        fn test_daily_keeps_wall_clock_across_dst() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                ..options(Frequency::Daily, ny(2024, 3, 9, 9, 0))
            })
            .unwrap();
            let all = rule.all(None);
            assert!(all.iter().all(|dt| dt.hour() == 9));
            assert_eq!(all[2].date_naive(), ymd(2024, 3, 11));
        }

        #[test]
        fn test_daily_in_gap_shifts_forward() {
            let rule = Rule::new(RuleOptions {
                count: 3,
                ..options(Frequency::Daily, ny(2024, 3, 9, 2, 30))
            })
            .unwrap();
            let all = rule.all(None);
            assert_eq!(all[1].naive_local().time(), NaiveTime::from_hms_opt(3, 30, 0).unwrap());
            assert_eq!(all[2].hour(), 2);
        }

        #[test]
        fn test_all_day_rule_emits_utc_midnights() {
            let rule = Rule::new(RuleOptions {
                all_day: true,
                count: 2,
                ..options(Frequency::Daily, ny(2024, 6, 1, 15, 45))
            })
            .unwrap();
            assert_eq!(
                rule.all(None),
                vec![utc(2024, 6, 1, 0, 0, 0), utc(2024, 6, 2, 0, 0, 0)]
            );
        }

        #[test]
        fn test_impossible_rule_terminates() {
            let rule = Rule::new(RuleOptions {
                bymonth: vec![2],
                bymonthday: vec![30],
                ..options(Frequency::Yearly, utc(2024, 1, 1, 0, 0, 0))
            })
            .unwrap();
            assert!(rule.all(None).is_empty());
        }

        #[test]
        fn test_iterators_are_independent() {
            let rule = Rule::new(RuleOptions {
                count: 5,
                ..options(Frequency::Daily, utc(2024, 1, 1, 0, 0, 0))
            })
            .unwrap();
            let mut first = rule.iter();
            first.next();
            first.next();
            assert_eq!(rule.iter().next(), Some(utc(2024, 1, 1, 0, 0, 0)));
            assert_eq!(first.next(), Some(utc(2024, 1, 3, 0, 0, 0)));
        }
    }

    mod query_tests {
        use super::*;

        fn daily() -> Rule {
            Rule::new(options(Frequency::Daily, utc(2024, 1, 1, 9, 0, 0))).unwrap()
        }

        #[test]
        fn test_between_inclusive_and_exclusive() {
            let rule = daily();
            let from = utc(2024, 1, 2, 9, 0, 0);
            let to = utc(2024, 1, 4, 9, 0, 0);
            assert_eq!(rule.between(from, to, true).len(), 3);
            assert_eq!(rule.between(from, to, false), vec![utc(2024, 1, 3, 9, 0, 0)]);
        }

        #[test]
        fn test_before_and_after() {
            let rule = daily();
            let pivot = utc(2024, 1, 3, 9, 0, 0);
            assert_eq!(rule.before(pivot, false), Some(utc(2024, 1, 2, 9, 0, 0)));
            assert_eq!(rule.before(pivot, true), Some(pivot));
            assert_eq!(rule.after(pivot, false), Some(utc(2024, 1, 4, 9, 0, 0)));
            assert_eq!(rule.after(pivot, true), Some(pivot));
            assert_eq!(rule.before(utc(2023, 12, 31, 0, 0, 0), true), None);
        }

        #[test]
        fn test_all_with_limit() {
            assert_eq!(daily().all(Some(7)).len(), 7);
        }
    }

    proptest! {
        #[test]
        fn prop_daily_output_ascending_and_bounded(
            interval in 1i32..5,
            count in 1u32..40,
            hour in 0u32..24,
        ) {
            let rule = Rule::new(RuleOptions {
                interval,
                count,
                ..options(Frequency::Daily, utc(2024, 1, 1, hour, 0, 0))
            }).unwrap();
            let all = rule.all(None);
            prop_assert_eq!(all.len(), count as usize);
            prop_assert!(all.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(all.iter().all(|dt| *dt >= rule.dtstart()));
        }

        #[test]
        fn prop_monthly_bymonthday_matches_calendar(day in 1i32..=31, count in 1u32..24) {
            let rule = Rule::new(RuleOptions {
                count,
                bymonthday: vec![day],
                ..options(Frequency::Monthly, utc(2020, 1, 1, 0, 0, 0))
            }).unwrap();
            for dt in rule.all(None) {
                prop_assert_eq!(dt.day() as i32, day);
            }
        }
    }
}
