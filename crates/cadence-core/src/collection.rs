use std::iter::Peekable;

use tracing::debug;

use crate::error::CoreError;
use crate::models::{Occurrence, RuleOptions};
use crate::rule::{self, Rule, RuleIter};
use crate::timezone;

/// A recurrence set: an optional rule plus explicit inclusions (RDATE)
/// and exclusions (EXDATE), expanded as one sorted, de-duplicated stream.
///
/// # Behavior
/// - Rule output and RDATEs are merged in ascending order
/// - Equal instants from either source appear once
/// - EXDATEs remove matching instants (by calendar date in all-day mode)
/// - DTSTART is not an implicit member; it only anchors the rule
#[derive(Debug, Clone, Default)]
pub struct RecurrenceCollection {
    rule: Option<Rule>,
    dtstart: Option<Occurrence>,
    rdates: Vec<Occurrence>,
    exdates: Vec<Occurrence>,
    all_day: bool,
}

impl RecurrenceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection driven by `rule`, taking its DTSTART and all-day flag.
    pub fn with_rule(rule: Rule) -> Self {
        let mut collection = Self::new();
        collection.dtstart = Some(rule.dtstart());
        collection.all_day = rule.is_all_day();
        collection.rule = Some(rule);
        collection
    }

    /// Replaces the rule, taking its DTSTART and all-day flag.
    ///
    /// Switching to an all-day rule floors the stored RDATEs and EXDATEs.
    pub fn set_rule(&mut self, rule: Rule) {
        self.dtstart = Some(rule.dtstart());
        self.all_day = rule.is_all_day();
        if self.all_day {
            self.rdates = normalized_sorted(&self.rdates, true);
            self.exdates = normalized_sorted(&self.exdates, true);
        }
        self.rule = Some(rule);
    }

    /// Re-anchors the collection and recompiles its rule against the new DTSTART.
    pub fn set_dtstart(&mut self, dtstart: Occurrence) -> Result<(), CoreError> {
        let dtstart = timezone::normalize(dtstart, self.all_day);
        if let Some(rule) = &self.rule {
            let options = rule.options().clone();
            self.rule = Some(Rule::new(RuleOptions {
                dtstart: Some(dtstart),
                ..options
            })?);
        }
        self.dtstart = Some(dtstart);
        Ok(())
    }

    /// Switches all-day mode.
    ///
    /// Turning it on floors DTSTART, every RDATE and every EXDATE to UTC
    /// midnight of its calendar date and recompiles the rule as all-day.
    /// Turning it off only clears the flag; values stay at midnight.
    pub fn set_all_day(&mut self, all_day: bool) -> Result<(), CoreError> {
        if all_day == self.all_day {
            return Ok(());
        }
        self.all_day = all_day;
        if !all_day {
            return Ok(());
        }

        debug!(rdates = self.rdates.len(), exdates = self.exdates.len(), "normalizing recurrence set to all-day");
        self.dtstart = self.dtstart.map(timezone::floor_to_date);
        self.rdates = normalized_sorted(&self.rdates, true);
        self.exdates = normalized_sorted(&self.exdates, true);
        if let Some(rule) = &self.rule {
            let options = rule.options().clone();
            self.rule = Some(Rule::new(RuleOptions {
                all_day: true,
                dtstart: self.dtstart,
                ..options
            })?);
        }
        Ok(())
    }

    pub fn add_rdate(&mut self, dt: Occurrence) {
        insert_sorted(&mut self.rdates, timezone::normalize(dt, self.all_day));
    }

    pub fn add_exdate(&mut self, dt: Occurrence) {
        insert_sorted(&mut self.exdates, timezone::normalize(dt, self.all_day));
    }

    pub fn rule(&self) -> Option<&Rule> {
        self.rule.as_ref()
    }

    pub fn dtstart(&self) -> Option<Occurrence> {
        self.dtstart
    }

    pub fn rdates(&self) -> &[Occurrence] {
        &self.rdates
    }

    pub fn exdates(&self) -> &[Occurrence] {
        &self.exdates
    }

    pub fn is_all_day(&self) -> bool {
        self.all_day
    }

    /// Lazily expands the whole set in ascending order.
    pub fn iter(&self) -> CollectionIter<'_> {
        CollectionIter {
            rule_iter: self.rule.as_ref().map(|r| r.iter().peekable()),
            rdates: &self.rdates,
            rdate_pos: 0,
            exdates: &self.exdates,
            exdate_pos: 0,
            all_day: self.all_day,
            last: None,
        }
    }

    pub fn all(&self, limit: Option<usize>) -> Vec<Occurrence> {
        match limit {
            Some(limit) => self.iter().take(limit).collect(),
            None => self.iter().collect(),
        }
    }

    pub fn between(&self, after: Occurrence, before: Occurrence, inclusive: bool) -> Vec<Occurrence> {
        rule::between(self.iter(), after, before, inclusive)
    }

    pub fn before(&self, dt: Occurrence, inclusive: bool) -> Option<Occurrence> {
        rule::before(self.iter(), dt, inclusive)
    }

    pub fn after(&self, dt: Occurrence, inclusive: bool) -> Option<Occurrence> {
        rule::after(self.iter(), dt, inclusive)
    }
}

impl<'a> IntoIterator for &'a RecurrenceCollection {
    type Item = Occurrence;
    type IntoIter = CollectionIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Sorted merge of rule output and RDATEs with EXDATEs filtered out.
pub struct CollectionIter<'a> {
    rule_iter: Option<Peekable<RuleIter<'a>>>,
    rdates: &'a [Occurrence],
    rdate_pos: usize,
    exdates: &'a [Occurrence],
    exdate_pos: usize,
    all_day: bool,
    last: Option<Occurrence>,
}

impl CollectionIter<'_> {
    fn next_candidate(&mut self) -> Option<Occurrence> {
        let from_rule = self.rule_iter.as_mut().and_then(|iter| iter.peek().copied());
        let from_rdates = self.rdates.get(self.rdate_pos).copied();

        match (from_rule, from_rdates) {
            (Some(r), Some(d)) if d < r => {
                self.rdate_pos += 1;
                Some(d)
            }
            (Some(_), _) => self.rule_iter.as_mut().and_then(|iter| iter.next()),
            (None, Some(d)) => {
                self.rdate_pos += 1;
                Some(d)
            }
            (None, None) => None,
        }
    }

    fn is_excluded(&mut self, dt: Occurrence) -> bool {
        let key = exclusion_key(dt, self.all_day);
        while let Some(exdate) = self.exdates.get(self.exdate_pos) {
            if exclusion_key(*exdate, self.all_day) < key {
                self.exdate_pos += 1;
            } else {
                break;
            }
        }
        self.exdates
            .get(self.exdate_pos)
            .is_some_and(|exdate| exclusion_key(*exdate, self.all_day) == key)
    }
}

impl Iterator for CollectionIter<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let candidate = self.next_candidate()?;
            if self.last == Some(candidate) {
                continue;
            }
            self.last = Some(candidate);
            if self.is_excluded(candidate) {
                continue;
            }
            return Some(candidate);
        }
    }
}

/// Ordering key for exclusion matching: the instant, or the calendar date when all-day.
fn exclusion_key(dt: Occurrence, all_day: bool) -> i64 {
    if all_day {
        i64::from(chrono::Datelike::num_days_from_ce(&dt.date_naive())) * 86_400
    } else {
        dt.timestamp()
    }
}

fn insert_sorted(values: &mut Vec<Occurrence>, dt: Occurrence) {
    if let Err(pos) = values.binary_search(&dt) {
        values.insert(pos, dt);
    }
}

fn normalized_sorted(values: &[Occurrence], all_day: bool) -> Vec<Occurrence> {
    let mut normalized: Vec<Occurrence> = values
        .iter()
        .map(|dt| timezone::normalize(*dt, all_day))
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}
