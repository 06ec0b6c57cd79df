use std::collections::VecDeque;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use tracing::trace;

use super::{PeriodMasks, Rule};
use crate::calendar::{self, divmod, py_index, MAX_YEAR};
use crate::models::{Frequency, Occurrence};
use crate::timezone;

/// Upper bound on consecutive steps that produce nothing.
const MAX_ITER_LOOP: u32 = 100_000;

/// Lazy, ascending expansion of a [`Rule`].
///
/// Each step fills one frequency period (a year, month, week, day, hour,
/// minute or second) worth of candidates, filters them through the period
/// masks, and then advances the cursor by `interval` periods.
pub struct RuleIter<'a> {
    rule: &'a Rule,
    masks: Option<PeriodMasks>,
    year: i32,
    month: u32,
    day: i32,
    hour: i32,
    minute: i32,
    second: i32,
    timeset: Vec<NaiveTime>,
    pending: VecDeque<Occurrence>,
    last: Option<Occurrence>,
    remaining: u32,
    finished: bool,
}

impl<'a> RuleIter<'a> {
    pub(crate) fn new(rule: &'a Rule) -> Self {
        let start = rule.dtstart.naive_local();
        let (hour, minute, second) = (start.hour(), start.minute(), start.second());
        let masks = PeriodMasks::build(rule, start.year(), start.month());

        let timeset = if rule.freq < Frequency::Hourly {
            rule.timeset.clone()
        } else if (!rule.byhour.is_empty() && !rule.byhour.contains(&hour))
            || (rule.freq >= Frequency::Minutely
                && !rule.byminute.is_empty()
                && !rule.byminute.contains(&minute))
            || (rule.freq >= Frequency::Secondly
                && !rule.bysecond.is_empty()
                && !rule.bysecond.contains(&second))
        {
            Vec::new()
        } else {
            sub_daily_timeset(rule, hour as i32, minute as i32, second as i32)
        };

        Self {
            rule,
            finished: masks.is_none(),
            masks,
            year: start.year(),
            month: start.month(),
            day: start.day() as i32,
            hour: hour as i32,
            minute: minute as i32,
            second: second as i32,
            timeset,
            pending: VecDeque::new(),
            last: None,
            remaining: rule.count,
        }
    }

    /// Candidates of the current period, ascending, before DTSTART/UNTIL/COUNT.
    fn period_candidates(&self, masks: &PeriodMasks) -> (Vec<Occurrence>, bool) {
        let rule = self.rule;
        let mut days = masks.day_set(rule, self.month, self.day as u32);
        let before = days.len();
        days.retain(|&i| masks.keeps_day(rule, i));
        let filtered = days.len() != before;

        let mut candidates = Vec::new();
        if !rule.bysetpos.is_empty() && !self.timeset.is_empty() {
            let per_day = self.timeset.len() as i32;
            for &pos in &rule.bysetpos {
                let (day_pos, time_pos) = if pos < 0 {
                    divmod(pos, per_day)
                } else {
                    divmod(pos - 1, per_day)
                };
                let Some(i) = py_index(&days, day_pos) else {
                    continue;
                };
                if let Some(dt) = self.occurrence_at(masks, i, self.timeset[time_pos as usize]) {
                    candidates.push(dt);
                }
            }
        } else {
            for &i in &days {
                for &time in &self.timeset {
                    if let Some(dt) = self.occurrence_at(masks, i, time) {
                        candidates.push(dt);
                    }
                }
            }
        }

        candidates.sort();
        candidates.dedup();
        (candidates, filtered)
    }

    fn occurrence_at(&self, masks: &PeriodMasks, day_index: usize, time: NaiveTime) -> Option<Occurrence> {
        let date = NaiveDate::from_num_days_from_ce_opt(masks.year.year_ordinal + day_index as i32)?;
        if self.rule.freq >= Frequency::Hourly {
            timezone::localize_existing(self.rule.tz, date.and_time(time))
        } else {
            timezone::localize(self.rule.tz, date.and_time(time))
        }
    }

    /// Applies UNTIL, DTSTART and COUNT; returns false once expansion is over.
    fn accept(&mut self, dt: Occurrence) -> bool {
        if let Some(until) = self.rule.until {
            if dt > until {
                self.finished = true;
                return false;
            }
        }
        // output stays strictly increasing
        if self.last.is_some_and(|last| dt <= last) {
            return true;
        }
        if dt >= self.rule.dtstart {
            self.last = Some(dt);
            self.pending.push_back(dt);
            if self.rule.count > 0 {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.finished = true;
                    return false;
                }
            }
        }
        true
    }

    fn generate(&mut self) {
        let mut idle_steps = 0;
        while self.pending.is_empty() && !self.finished {
            let Some(masks) = self.masks.as_ref() else {
                self.finished = true;
                break;
            };
            let (candidates, filtered) = self.period_candidates(masks);
            for dt in candidates {
                if !self.accept(dt) {
                    break;
                }
            }
            if self.finished {
                break;
            }
            self.advance(filtered);

            idle_steps += 1;
            if idle_steps > MAX_ITER_LOOP && self.pending.is_empty() {
                trace!(year = self.year, "giving up on a rule that produces nothing");
                self.finished = true;
            }
        }
    }

    fn advance(&mut self, filtered: bool) {
        let rule = self.rule;
        let interval = rule.interval;
        let mut fixday = false;

        match rule.freq {
            Frequency::Yearly => {
                self.year += interval;
                if self.year > MAX_YEAR {
                    self.finished = true;
                    return;
                }
                self.rescope();
            }
            Frequency::Monthly => {
                let (years, month0) = divmod(self.month as i32 - 1 + interval, 12);
                self.month = month0 as u32 + 1;
                self.year += years;
                if self.year > MAX_YEAR {
                    self.finished = true;
                    return;
                }
                self.rescope();
            }
            Frequency::Weekly => {
                let weekday = NaiveDate::from_ymd_opt(self.year, self.month, self.day as u32)
                    .map(|d| calendar::weekday_index(d) as i32)
                    .unwrap_or(0);
                let wkst = rule.wkst as i32;
                // jump to the week start `interval` weeks ahead
                if wkst > weekday {
                    self.day += -(weekday + 1 + (6 - wkst)) + interval * 7;
                } else {
                    self.day += -(weekday - wkst) + interval * 7;
                }
                fixday = true;
            }
            Frequency::Daily => {
                self.day += interval;
                fixday = true;
            }
            Frequency::Hourly => {
                if filtered {
                    self.hour += ((23 - self.hour) / interval) * interval;
                }
                let mut steps = 0;
                loop {
                    self.hour += interval;
                    let (days, hour) = divmod(self.hour, 24);
                    if days != 0 {
                        self.hour = hour;
                        self.day += days;
                        fixday = true;
                    }
                    if matches_hour(rule, self.hour) {
                        break;
                    }
                    if !self.count_step(&mut steps) {
                        return;
                    }
                }
                self.timeset = sub_daily_timeset(rule, self.hour, self.minute, self.second);
            }
            Frequency::Minutely => {
                if filtered {
                    self.minute += ((1439 - (self.hour * 60 + self.minute)) / interval) * interval;
                }
                let mut steps = 0;
                loop {
                    self.minute += interval;
                    let (hours, minute) = divmod(self.minute, 60);
                    if hours != 0 {
                        self.minute = minute;
                        self.hour += hours;
                        let (days, hour) = divmod(self.hour, 24);
                        if days != 0 {
                            self.hour = hour;
                            self.day += days;
                            fixday = true;
                        }
                    }
                    if matches_hour(rule, self.hour) && matches_minute(rule, self.minute) {
                        break;
                    }
                    if !self.count_step(&mut steps) {
                        return;
                    }
                }
                self.timeset = sub_daily_timeset(rule, self.hour, self.minute, self.second);
            }
            Frequency::Secondly => {
                if filtered {
                    self.second += ((86399 - (self.hour * 3600 + self.minute * 60 + self.second))
                        / interval)
                        * interval;
                }
                let mut steps = 0;
                loop {
                    self.second += interval;
                    let (minutes, second) = divmod(self.second, 60);
                    if minutes != 0 {
                        self.second = second;
                        self.minute += minutes;
                        let (hours, minute) = divmod(self.minute, 60);
                        if hours != 0 {
                            self.minute = minute;
                            self.hour += hours;
                            let (days, hour) = divmod(self.hour, 24);
                            if days != 0 {
                                self.hour = hour;
                                self.day += days;
                                fixday = true;
                            }
                        }
                    }
                    if matches_hour(rule, self.hour)
                        && matches_minute(rule, self.minute)
                        && matches_second(rule, self.second)
                    {
                        break;
                    }
                    if !self.count_step(&mut steps) {
                        return;
                    }
                }
                self.timeset = sub_daily_timeset(rule, self.hour, self.minute, self.second);
            }
        }

        if fixday && self.day > 28 {
            let mut month_len = calendar::days_in_month(self.year, self.month) as i32;
            if self.day > month_len {
                while self.day > month_len {
                    self.day -= month_len;
                    self.month += 1;
                    if self.month == 13 {
                        self.month = 1;
                        self.year += 1;
                        if self.year > MAX_YEAR {
                            self.finished = true;
                            return;
                        }
                    }
                    month_len = calendar::days_in_month(self.year, self.month) as i32;
                }
                self.rescope();
            }
        }
    }

    fn count_step(&mut self, steps: &mut u32) -> bool {
        *steps += 1;
        if *steps > MAX_ITER_LOOP {
            trace!("no reachable time matches BYHOUR/BYMINUTE/BYSECOND");
            self.finished = true;
            return false;
        }
        true
    }

    fn rescope(&mut self) {
        self.masks = self
            .masks
            .take()
            .and_then(|masks| masks.rescope(self.rule, self.year, self.month));
        if self.masks.is_none() {
            self.finished = true;
        }
    }
}

impl Iterator for RuleIter<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(dt) = self.pending.pop_front() {
                return Some(dt);
            }
            if self.finished {
                return None;
            }
            self.generate();
        }
    }
}

fn matches_hour(rule: &Rule, hour: i32) -> bool {
    rule.byhour.is_empty() || rule.byhour.contains(&(hour as u32))
}

fn matches_minute(rule: &Rule, minute: i32) -> bool {
    rule.byminute.is_empty() || rule.byminute.contains(&(minute as u32))
}

fn matches_second(rule: &Rule, second: i32) -> bool {
    rule.bysecond.is_empty() || rule.bysecond.contains(&(second as u32))
}

/// Times within the current hour, minute or second for sub-daily rules.
fn sub_daily_timeset(rule: &Rule, hour: i32, minute: i32, second: i32) -> Vec<NaiveTime> {
    let (hour, minute, second) = (hour as u32, minute as u32, second as u32);
    let mut times: Vec<NaiveTime> = match rule.freq {
        Frequency::Hourly => rule
            .byminute
            .iter()
            .flat_map(|m| {
                rule.bysecond
                    .iter()
                    .filter_map(move |s| NaiveTime::from_hms_opt(hour, *m, *s))
            })
            .collect(),
        Frequency::Minutely => rule
            .bysecond
            .iter()
            .filter_map(|s| NaiveTime::from_hms_opt(hour, minute, *s))
            .collect(),
        _ => NaiveTime::from_hms_opt(hour, minute, second).into_iter().collect(),
    };
    times.sort();
    times
}
