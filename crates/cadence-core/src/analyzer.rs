//! Classification of recurrence edits.
//!
//! A downstream store holds occurrences materialized from an old
//! definition. [`ChangeAnalyzer`] compares old and new definitions and says
//! whether nothing changed, whether everything must be regenerated, or
//! which window to trim or extend and which exclusions to apply.

use std::collections::BTreeSet;

use chrono::TimeZone;
use chrono_tz::Tz;
use tracing::debug;

use crate::error::CoreError;
use crate::helper::RecurrenceSetHelper;
use crate::models::{ChangeAnalysis, ChangeType, Occurrence, RuleOptions};
use crate::parser;
use crate::rule::Rule;

/// How the end of a series is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndBound {
    Unbounded,
    Until(Occurrence),
    Count(u32),
}

impl EndBound {
    fn of(options: &RuleOptions) -> Self {
        match (options.count, options.until) {
            (0, None) => EndBound::Unbounded,
            (0, Some(until)) => EndBound::Until(until),
            (count, _) => EndBound::Count(count),
        }
    }
}

/// Compares recurrence definitions.
#[derive(Debug, Clone)]
pub struct ChangeAnalyzer {
    default_tz: Tz,
}

impl Default for ChangeAnalyzer {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl ChangeAnalyzer {
    /// # Arguments
    /// * `default_tz` - Zone for floating date-times in the analyzed lines
    pub fn new(default_tz: Tz) -> Self {
        Self { default_tz }
    }

    /// Fixed anchor for definitions that carry no DTSTART: 1970-01-01T00:00:00Z.
    pub fn synthetic_anchor() -> Occurrence {
        Tz::UTC.from_utc_datetime(&chrono::NaiveDateTime::default())
    }

    /// Classifies the change between two sets of recurrence lines.
    ///
    /// # Arguments
    /// * `old_lines` - The definition occurrences were materialized from
    /// * `new_lines` - The edited definition
    ///
    /// # Returns
    /// * `Result<ChangeAnalysis, CoreError>` - The classification, or a parse
    ///   error when either side cannot be read
    ///
    /// # Behavior
    /// - Lines are trimmed, blank lines dropped and the rest sorted, so
    ///   reordering alone is `NoChange`
    /// - An empty side on only one end is a `FullRebuild`
    /// - A side without DTSTART is anchored at [`Self::synthetic_anchor`], or
    ///   at its first occurrence when the rule does not produce the anchor
    /// - COUNT changes are resolved to concrete end instants only when both
    ///   sides carry an explicit DTSTART
    pub fn analyze<A, B>(&self, old_lines: &[A], new_lines: &[B]) -> Result<ChangeAnalysis, CoreError>
    where
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let old_normalized = normalize_lines(old_lines);
        let new_normalized = normalize_lines(new_lines);

        if old_normalized == new_normalized {
            return Ok(ChangeAnalysis::no_change());
        }
        if old_normalized.is_empty() || new_normalized.is_empty() {
            return Ok(ChangeAnalysis::full_rebuild("recurrence added or removed"));
        }

        let (old, old_synthetic) = self.parse_side(&old_normalized)?;
        let (new, new_synthetic) = self.parse_side(&new_normalized)?;

        if old_synthetic || new_synthetic {
            if let (Some(old_rule), Some(new_rule)) = (old.rule_options(), new.rule_options()) {
                let (old_end, new_end) = (EndBound::of(old_rule), EndBound::of(new_rule));
                let count_involved = matches!(old_end, EndBound::Count(_)) || matches!(new_end, EndBound::Count(_));
                if old_end != new_end && count_involved {
                    return Ok(ChangeAnalysis::full_rebuild(
                        "COUNT changed without an explicit DTSTART",
                    ));
                }
            }
        }

        Ok(self.compare(&old, &new))
    }

    /// Classifies the change between two already-built recurrence sets.
    ///
    /// Both DTSTARTs are taken as meaningful, so COUNT bounds are resolved
    /// to the instant of the last counted occurrence.
    pub fn compare(&self, old: &RecurrenceSetHelper, new: &RecurrenceSetHelper) -> ChangeAnalysis {
        match (old.rule_options(), new.rule_options()) {
            (Some(_), None) => return ChangeAnalysis::full_rebuild("RRULE removed"),
            (None, Some(_)) => return ChangeAnalysis::full_rebuild("RRULE added"),
            (Some(old_rule), Some(new_rule)) => {
                if let Some(reason) = structural_difference(old_rule, new_rule) {
                    return ChangeAnalysis::full_rebuild(&reason);
                }
            }
            (None, None) => {}
        }

        // same instant in another zone still shifts the wall-clock series
        let zoned = |dt: Occurrence| (dt, dt.timezone());
        if old.dtstart().map(zoned) != new.dtstart().map(zoned) {
            return ChangeAnalysis::full_rebuild("DTSTART changed");
        }
        if old.is_all_day() != new.is_all_day() {
            return ChangeAnalysis::full_rebuild("all-day flag changed");
        }
        if instant_set(old.rdates()) != instant_set(new.rdates()) {
            return ChangeAnalysis::full_rebuild("RDATE set changed");
        }

        let mut analysis = ChangeAnalysis::with_type(ChangeType::PartialUpdate, String::new());
        let mut notes = Vec::new();

        if let (Some(old_rule), Some(new_rule)) = (old.rule_options(), new.rule_options()) {
            let (old_end, new_end) = (EndBound::of(old_rule), EndBound::of(new_rule));
            if old_end != new_end {
                let resolved_old = match resolve_end(old, old_end) {
                    Ok(end) => end,
                    Err(reason) => return ChangeAnalysis::full_rebuild(&reason),
                };
                let resolved_new = match resolve_end(new, new_end) {
                    Ok(end) => end,
                    Err(reason) => return ChangeAnalysis::full_rebuild(&reason),
                };
                apply_end_change(&mut analysis, &mut notes, resolved_old, resolved_new);
            }
        }

        let old_exdates = instant_set(old.exdates());
        let new_exdates = instant_set(new.exdates());
        analysis.new_exdates = exdates_in(new.exdates(), &new_exdates, &old_exdates);
        analysis.removed_exdates = exdates_in(old.exdates(), &old_exdates, &new_exdates);
        if !analysis.new_exdates.is_empty() {
            notes.push(format!("{} EXDATE(s) added", analysis.new_exdates.len()));
        }
        if !analysis.removed_exdates.is_empty() {
            notes.push(format!("{} EXDATE(s) removed", analysis.removed_exdates.len()));
        }

        if notes.is_empty() {
            notes.push("definition rewritten without affecting occurrences".to_string());
        }
        analysis.description = format!("partial update: {}", notes.join("; "));
        debug!(
            delete_after = ?analysis.delete_after,
            generate_from = ?analysis.generate_from,
            generate_until = ?analysis.generate_until,
            new_exdates = analysis.new_exdates.len(),
            removed_exdates = analysis.removed_exdates.len(),
            "classified recurrence change as partial update"
        );
        analysis
    }

    /// Parses one side, anchoring it when it has no DTSTART.
    fn parse_side(&self, lines: &[String]) -> Result<(RecurrenceSetHelper, bool), CoreError> {
        let parsed = parser::parse_lines(lines, self.default_tz)?;
        if parsed.dtstart.is_some() {
            return Ok((RecurrenceSetHelper::from_parsed(parsed)?, false));
        }

        let anchored = RecurrenceSetHelper::from_parsed(parsed.clone().with_dtstart(Self::synthetic_anchor()))?;
        if anchored.rule_options().is_none() {
            return Ok((anchored, true));
        }

        match anchored.validate_dtstart_alignment(true) {
            Ok(()) => Ok((anchored, true)),
            Err(CoreError::Alignment(err)) => match err.actual_first() {
                Some(first) => {
                    debug!(anchor = %first, "re-anchoring recurrence without DTSTART");
                    let derived = RecurrenceSetHelper::from_parsed(parsed.with_dtstart(first))?;
                    Ok((derived, true))
                }
                None => Err(CoreError::Parse(format!(
                    "recurrence has no DTSTART and no occurrence to anchor it: {}",
                    err
                ))),
            },
            Err(other) => Err(other),
        }
    }
}

fn normalize_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    normalized.sort();
    normalized
}

/// The first rule-level difference that invalidates every materialized occurrence.
fn structural_difference(old: &RuleOptions, new: &RuleOptions) -> Option<String> {
    let checks: [(&str, bool); 13] = [
        ("FREQ", old.freq != new.freq),
        ("INTERVAL", old.effective_interval() != new.effective_interval()),
        ("WKST", old.wkst != new.wkst),
        ("BYSETPOS", old.bysetpos != new.bysetpos),
        ("BYMONTH", old.bymonth != new.bymonth),
        ("BYMONTHDAY", old.bymonthday != new.bymonthday),
        ("BYYEARDAY", old.byyearday != new.byyearday),
        ("BYWEEKNO", old.byweekno != new.byweekno),
        ("BYDAY", old.byweekday != new.byweekday),
        ("BYHOUR", old.byhour != new.byhour),
        ("BYMINUTE", old.byminute != new.byminute),
        ("BYSECOND", old.bysecond != new.bysecond),
        ("BYEASTER", old.byeaster != new.byeaster),
    ];
    checks
        .iter()
        .find(|(_, changed)| *changed)
        .map(|(name, _)| format!("{} changed", name))
}

/// Resolves an end bound to an instant; `None` means open-ended.
fn resolve_end(helper: &RecurrenceSetHelper, end: EndBound) -> Result<Option<Occurrence>, String> {
    match end {
        EndBound::Unbounded => Ok(None),
        EndBound::Until(until) => Ok(Some(until)),
        EndBound::Count(_) => {
            let options = helper
                .rule_options()
                .ok_or_else(|| "COUNT without a rule".to_string())?;
            let rule = Rule::new(RuleOptions {
                dtstart: helper.dtstart(),
                all_day: helper.is_all_day(),
                ..options.clone()
            })
            .map_err(|e| e.to_string())?;
            rule.iter()
                .last()
                .map(Some)
                .ok_or_else(|| "COUNT-bounded rule produces no occurrences".to_string())
        }
    }
}

fn apply_end_change(
    analysis: &mut ChangeAnalysis,
    notes: &mut Vec<String>,
    old_end: Option<Occurrence>,
    new_end: Option<Occurrence>,
) {
    match (old_end, new_end) {
        (Some(old), Some(new)) if new > old => {
            analysis.generate_from = Some(old);
            analysis.generate_until = Some(new);
            notes.push(format!("series end extended from {} to {}", old, new));
        }
        (Some(old), Some(new)) if new < old => {
            analysis.delete_after = Some(new);
            notes.push(format!("series end moved earlier from {} to {}", old, new));
        }
        (Some(_), Some(_)) => {}
        (None, Some(new)) => {
            analysis.delete_after = Some(new);
            notes.push(format!("series now ends at {}", new));
        }
        (Some(old), None) => {
            analysis.generate_from = Some(old);
            notes.push(format!("series end at {} removed", old));
        }
        (None, None) => {}
    }
}

fn instant_set(values: &[Occurrence]) -> BTreeSet<i64> {
    values.iter().map(|dt| dt.timestamp()).collect()
}

fn exdates_in(values: &[Occurrence], keys: &BTreeSet<i64>, other: &BTreeSet<i64>) -> Vec<Occurrence> {
    let mut result: Vec<Occurrence> = values
        .iter()
        .filter(|dt| keys.contains(&dt.timestamp()) && !other.contains(&dt.timestamp()))
        .copied()
        .collect();
    result.sort();
    result.dedup();
    result
}
