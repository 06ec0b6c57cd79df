use chrono::{Datelike, NaiveDate};
use tracing::trace;

use super::Rule;
use crate::calendar::{self, mask_tables, pymod, M365_RANGE, M366_RANGE};
use crate::models::Frequency;

/// Per-year day masks. Index 0 is January 1st of `year`.
#[derive(Debug, Clone)]
pub(crate) struct YearMasks {
    pub year: i32,
    pub year_len: usize,
    pub next_year_len: usize,
    /// Days from the common era to January 1st
    pub year_ordinal: i32,
    pub mmask: &'static [u32],
    pub mdaymask: &'static [i32],
    pub nmdaymask: &'static [i32],
    /// Weekday (0 = Monday) per day, offset to this year's January 1st
    pub wdaymask: &'static [u32],
    pub mrange: &'static [usize; 13],
    pub wnomask: Option<Vec<bool>>,
    pub eastermask: Option<Vec<bool>>,
}

/// Every mask the filter stage needs for one (year, month) period.
///
/// Built by a pure function of the rule and the period, so the iterator
/// only swaps the value when the cursor leaves its scope.
#[derive(Debug, Clone)]
pub(crate) struct PeriodMasks {
    pub year: YearMasks,
    pub month: u32,
    pub nwdaymask: Option<Vec<bool>>,
}

impl PeriodMasks {
    pub fn build(rule: &Rule, year: i32, month: u32) -> Option<Self> {
        let year_masks = YearMasks::build(rule, year)?;
        let nwdaymask = build_nwdaymask(rule, &year_masks, month);
        Some(Self {
            year: year_masks,
            month,
            nwdaymask,
        })
    }

    /// Masks for a new cursor position, reusing the year part when still valid.
    pub fn rescope(self, rule: &Rule, year: i32, month: u32) -> Option<Self> {
        if self.year.year == year && self.month == month {
            return Some(self);
        }
        let year_masks = if self.year.year == year {
            self.year
        } else {
            YearMasks::build(rule, year)?
        };
        let nwdaymask = build_nwdaymask(rule, &year_masks, month);
        Some(Self {
            year: year_masks,
            month,
            nwdaymask,
        })
    }

    /// Whether day `i` (0-based from January 1st) survives every day-level filter.
    pub fn keeps_day(&self, rule: &Rule, i: usize) -> bool {
        let ym = &self.year;

        if !rule.bymonth.is_empty() && !rule.bymonth.contains(&ym.mmask[i]) {
            return false;
        }
        if let Some(wnomask) = &ym.wnomask {
            if !wnomask[i] {
                return false;
            }
        }
        if !rule.byweekday.is_empty() && !rule.byweekday.contains(&ym.wdaymask[i]) {
            return false;
        }
        if let Some(nwdaymask) = &self.nwdaymask {
            if !nwdaymask.get(i).copied().unwrap_or(false) {
                return false;
            }
        }
        if let Some(eastermask) = &ym.eastermask {
            if !eastermask[i] {
                return false;
            }
        }
        if (!rule.bymonthday.is_empty() || !rule.bynmonthday.is_empty())
            && !rule.bymonthday.contains(&ym.mdaymask[i])
            && !rule.bynmonthday.contains(&ym.nmdaymask[i])
        {
            return false;
        }
        if !rule.byyearday.is_empty() {
            let day = i as i32;
            let year_len = ym.year_len as i32;
            let next_year_len = ym.next_year_len as i32;
            let matched = if day < year_len {
                rule.byyearday.contains(&(day + 1)) || rule.byyearday.contains(&(day - year_len))
            } else {
                rule.byyearday.contains(&(day + 1 - year_len))
                    || rule.byyearday.contains(&(day - year_len - next_year_len))
            };
            if !matched {
                return false;
            }
        }
        true
    }

    /// Candidate day indices for the period containing (year, month, day).
    pub fn day_set(&self, rule: &Rule, month: u32, day: u32) -> Vec<usize> {
        let ym = &self.year;
        match rule.freq {
            Frequency::Yearly => (0..ym.year_len).collect(),
            Frequency::Monthly => {
                let idx = month as usize;
                (ym.mrange[idx - 1]..ym.mrange[idx]).collect()
            }
            Frequency::Weekly => {
                let Some(start) = day_index(ym, month, day) else {
                    return Vec::new();
                };
                let mut days = Vec::with_capacity(7);
                let mut i = start;
                for _ in 0..7 {
                    days.push(i);
                    i += 1;
                    if ym.wdaymask[i] == rule.wkst {
                        break;
                    }
                }
                days
            }
            _ => day_index(ym, month, day).into_iter().collect(),
        }
    }
}

fn day_index(ym: &YearMasks, month: u32, day: u32) -> Option<usize> {
    let date = NaiveDate::from_ymd_opt(ym.year, month, day)?;
    Some((date.num_days_from_ce() - ym.year_ordinal) as usize)
}

impl YearMasks {
    fn build(rule: &Rule, year: i32) -> Option<Self> {
        trace!(year, "building year masks");
        let tables = mask_tables();
        let first_day = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let year_len = calendar::days_in_year(year);
        let next_year_len = calendar::days_in_year(year + 1);
        let year_weekday = calendar::weekday_index(first_day) as usize;

        let (mmask, mdaymask, nmdaymask, mrange) = if year_len == 365 {
            (&tables.m365, &tables.mday365, &tables.nmday365, &M365_RANGE)
        } else {
            (&tables.m366, &tables.mday366, &tables.nmday366, &M366_RANGE)
        };

        let mut masks = Self {
            year,
            year_len,
            next_year_len,
            year_ordinal: first_day.num_days_from_ce(),
            mmask: mmask.as_slice(),
            mdaymask: mdaymask.as_slice(),
            nmdaymask: nmdaymask.as_slice(),
            wdaymask: &tables.wday[year_weekday..],
            mrange,
            wnomask: None,
            eastermask: None,
        };

        if !rule.byweekno.is_empty() {
            masks.wnomask = Some(build_wnomask(rule, &masks, year_weekday as i32));
        }
        if !rule.byeaster.is_empty() {
            masks.eastermask = Some(build_eastermask(rule, year, year_len));
        }
        Some(masks)
    }
}

/// Marks the days belonging to the requested ISO-style week numbers,
/// where week 1 is the first week with at least four days in the year.
fn build_wnomask(rule: &Rule, ym: &YearMasks, year_weekday: i32) -> Vec<bool> {
    let wkst = rule.wkst as i32;
    let year_len = ym.year_len as i32;
    let mut wnomask = vec![false; ym.year_len + 7];

    let first_wkst = pymod(7 - year_weekday + wkst, 7);
    let no1_wkst = first_wkst;
    let (no1_wkst, week_year_len) = if no1_wkst >= 4 {
        (0, year_len + pymod(year_weekday - wkst, 7))
    } else {
        (no1_wkst, year_len - no1_wkst)
    };
    let num_weeks = week_year_len / 7 + pymod(week_year_len, 7) / 4;

    for &week in &rule.byweekno {
        let n = if week < 0 { week + num_weeks + 1 } else { week };
        if !(n > 0 && n <= num_weeks) {
            continue;
        }
        let mut i = if n > 1 {
            let mut start = no1_wkst + (n - 1) * 7;
            if no1_wkst != first_wkst {
                start -= 7 - first_wkst;
            }
            start
        } else {
            no1_wkst
        };
        for _ in 0..7 {
            if i < 0 || i as usize >= wnomask.len() {
                break;
            }
            wnomask[i as usize] = true;
            i += 1;
            if ym.wdaymask[i as usize] as i32 == wkst {
                break;
            }
        }
    }

    if rule.byweekno.contains(&1) {
        // week 1 of next year may start inside this one
        let mut i = no1_wkst + num_weeks * 7;
        if no1_wkst != first_wkst {
            i -= 7 - first_wkst;
        }
        if i < year_len {
            for _ in 0..7 {
                if i < 0 || i as usize >= wnomask.len() {
                    break;
                }
                wnomask[i as usize] = true;
                i += 1;
                if ym.wdaymask[i as usize] as i32 == wkst {
                    break;
                }
            }
        }
    }

    if no1_wkst != 0 {
        // days before week 1 belong to last year's final week
        let last_year_num_weeks = if rule.byweekno.contains(&-1) {
            -1
        } else {
            let last_year = ym.year - 1;
            let last_year_weekday = NaiveDate::from_ymd_opt(last_year, 1, 1)
                .map(|d| calendar::weekday_index(d) as i32)
                .unwrap_or(0);
            let last_no1_wkst = pymod(7 - last_year_weekday + wkst, 7);
            let last_year_len = calendar::days_in_year(last_year) as i32;
            if last_no1_wkst >= 4 {
                52 + pymod(last_year_len + pymod(last_year_weekday - wkst, 7), 7) / 4
            } else {
                52 + pymod(year_len - no1_wkst, 7) / 4
            }
        };
        if rule.byweekno.contains(&last_year_num_weeks) {
            for flag in wnomask.iter_mut().take(no1_wkst as usize) {
                *flag = true;
            }
        }
    }

    wnomask
}

/// Marks the n-th weekday occurrences within each month (MONTHLY, or YEARLY
/// with BYMONTH) or within the whole year (YEARLY).
fn build_nwdaymask(rule: &Rule, ym: &YearMasks, month: u32) -> Option<Vec<bool>> {
    if rule.bynweekday.is_empty() {
        return None;
    }

    let ranges: Vec<(i32, i32)> = match rule.freq {
        Frequency::Yearly if rule.bymonth.is_empty() => vec![(0, ym.year_len as i32)],
        Frequency::Yearly => rule
            .bymonth
            .iter()
            .map(|m| (ym.mrange[*m as usize - 1] as i32, ym.mrange[*m as usize] as i32))
            .collect(),
        Frequency::Monthly => vec![(
            ym.mrange[month as usize - 1] as i32,
            ym.mrange[month as usize] as i32,
        )],
        _ => return None,
    };

    let mut nwdaymask = vec![false; ym.year_len];
    for (first, end) in ranges {
        let last = end - 1;
        for nth in &rule.bynweekday {
            let wd = nth.weekday as i32;
            let i = if nth.n < 0 {
                let i = last + (nth.n + 1) * 7;
                if i < first || i > last {
                    continue;
                }
                i - pymod(ym.wdaymask[i as usize] as i32 - wd, 7)
            } else {
                let i = first + (nth.n - 1) * 7;
                if i < first || i > last {
                    continue;
                }
                i + pymod(7 - ym.wdaymask[i as usize] as i32 + wd, 7)
            };
            if first <= i && i <= last {
                nwdaymask[i as usize] = true;
            }
        }
    }
    Some(nwdaymask)
}

fn build_eastermask(rule: &Rule, year: i32, year_len: usize) -> Vec<bool> {
    let mut eastermask = vec![false; year_len + 7];
    if let Some(easter) = calendar::easter(year) {
        let easter_day = easter.ordinal0() as i32;
        for offset in &rule.byeaster {
            let i = easter_day + offset;
            if i >= 0 && (i as usize) < eastermask.len() {
                eastermask[i as usize] = true;
            }
        }
    }
    eastermask
}
