//! Calendar primitives shared by the rule engine.
//!
//! Day-of-year masks cover a whole year plus 7 trailing days so weekly
//! periods that straddle New Year can be indexed without a second lookup.

use chrono::NaiveDate;
use std::sync::OnceLock;

/// Generation halts once the cursor passes this year.
pub const MAX_YEAR: i32 = 9999;

/// Cumulative day offsets of each month start, leap year.
pub const M366_RANGE: [usize; 13] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335, 366];
/// Cumulative day offsets of each month start, common year.
pub const M365_RANGE: [usize; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];

const LEAP_MONTH_LENGTHS: [i32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[inline]
pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

#[inline]
pub fn days_in_year(year: i32) -> usize {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Western (Gregorian) Easter Sunday for `year`.
pub fn easter(year: i32) -> Option<NaiveDate> {
    let g = year % 19;
    let c = year / 100;
    let h = (c - c / 4 - (8 * c + 13) / 25 + 19 * g + 15) % 30;
    let i = h - (h / 28) * (1 - (h / 28) * (29 / (h + 1)) * ((21 - g) / 11));
    let j = (year + year / 4 + i + 2 - c + c / 4) % 7;
    let p = i - j;
    let day = 1 + (p + 27 + (p + 6) / 40) % 31;
    let month = 3 + (p + 26) / 30;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Modulo whose result takes the sign of the divisor.
#[inline]
pub fn pymod(a: i32, b: i32) -> i32 {
    let r = a % b;
    if r != 0 && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

/// Floor division paired with [`pymod`].
#[inline]
pub fn divmod(a: i32, b: i32) -> (i32, i32) {
    let m = pymod(a, b);
    ((a - m) / b, m)
}

/// Index from the front, or from the back when negative.
pub fn py_index<T: Copy>(items: &[T], index: i32) -> Option<T> {
    let len = items.len() as i32;
    let idx = if index < 0 { index + len } else { index };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(items[idx as usize])
    }
}

/// Weekday of a date as 0 = Monday .. 6 = Sunday.
#[inline]
pub fn weekday_index(date: NaiveDate) -> u32 {
    use chrono::Datelike;
    date.weekday().num_days_from_monday()
}

pub(crate) struct MaskTables {
    pub m365: Vec<u32>,
    pub m366: Vec<u32>,
    pub mday365: Vec<i32>,
    pub mday366: Vec<i32>,
    pub nmday365: Vec<i32>,
    pub nmday366: Vec<i32>,
    pub wday: Vec<u32>,
}

static MASK_TABLES: OnceLock<MaskTables> = OnceLock::new();

pub(crate) fn mask_tables() -> &'static MaskTables {
    MASK_TABLES.get_or_init(build_mask_tables)
}

fn build_mask_tables() -> MaskTables {
    let mut m366 = Vec::with_capacity(373);
    let mut mday366 = Vec::with_capacity(373);
    let mut nmday366 = Vec::with_capacity(373);

    for (idx, &len) in LEAP_MONTH_LENGTHS.iter().enumerate() {
        for day in 1..=len {
            m366.push(idx as u32 + 1);
            mday366.push(day);
            nmday366.push(day - len - 1);
        }
    }
    // first week of the following January
    for day in 1..=7 {
        m366.push(1);
        mday366.push(day);
        nmday366.push(day - 32);
    }

    // Feb 29 sits at index 59; its negative form (-29) at index 31
    let mut m365 = m366.clone();
    m365.remove(59);
    let mut mday365 = mday366.clone();
    mday365.remove(59);
    let mut nmday365 = nmday366.clone();
    nmday365.remove(31);

    let wday = (0..55 * 7).map(|i| i % 7).collect();

    MaskTables {
        m365,
        m366,
        mday365,
        mday366,
        nmday365,
        nmday366,
        wday,
    }
}
