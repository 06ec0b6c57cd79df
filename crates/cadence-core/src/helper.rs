use chrono_tz::Tz;
use tracing::debug;

use crate::collection::RecurrenceCollection;
use crate::error::{AlignmentDiagnostic, AlignmentError, CoreError};
use crate::models::{Occurrence, RuleOptions};
use crate::parser::{self, ParsedRecurrence};
use crate::rule::Rule;
use crate::serializer;
use crate::timezone;

/// Editable recurrence set.
///
/// Keeps its own record of the rule options, DTSTART, RDATEs and EXDATEs,
/// and rebuilds the underlying [`RecurrenceCollection`] after every
/// mutation so queries always reflect the latest edit.
#[derive(Debug, Clone)]
pub struct RecurrenceSetHelper {
    collection: RecurrenceCollection,
    rule_options: Option<RuleOptions>,
    dtstart: Option<Occurrence>,
    all_day: bool,
    rdates: Vec<Occurrence>,
    exdates: Vec<Occurrence>,
}

impl RecurrenceSetHelper {
    /// Builds a helper from parsed recurrence parts.
    ///
    /// A rule without DTSTART is anchored to the current time, once; later
    /// rebuilds reuse that anchor.
    pub fn from_parsed(parsed: ParsedRecurrence) -> Result<Self, CoreError> {
        let all_day = parsed.all_day;
        let dtstart = match (parsed.dtstart, &parsed.rule) {
            (Some(dt), _) => Some(timezone::normalize(dt, all_day)),
            (None, Some(_)) => Some(timezone::normalize(timezone::utc_now(), all_day)),
            (None, None) => None,
        };

        let mut helper = Self {
            collection: RecurrenceCollection::new(),
            rule_options: parsed.rule,
            dtstart,
            all_day,
            rdates: Vec::new(),
            exdates: Vec::new(),
        };
        for rdate in parsed.rdates {
            push_unique(&mut helper.rdates, timezone::normalize(rdate, all_day));
        }
        for exdate in parsed.exdates {
            push_unique(&mut helper.exdates, timezone::normalize(exdate, all_day));
        }
        helper.rebuild()?;
        Ok(helper)
    }

    /// Builds a helper around a single rule; DTSTART comes from the options.
    pub fn from_rule(options: RuleOptions) -> Result<Self, CoreError> {
        Self::from_parsed(ParsedRecurrence {
            dtstart: options.dtstart,
            all_day: options.all_day,
            rule: Some(options),
            ..Default::default()
        })
    }

    /// Parses recurrence lines and builds a helper from them.
    pub fn from_lines<S: AsRef<str>>(lines: &[S], default_tz: Tz) -> Result<Self, CoreError> {
        Self::from_parsed(parser::parse_lines(lines, default_tz)?)
    }

    /// Recompiles the collection from the tracked parts.
    fn rebuild(&mut self) -> Result<(), CoreError> {
        self.collection = self.build_collection(true)?;
        debug!(
            has_rule = self.rule_options.is_some(),
            rdates = self.rdates.len(),
            exdates = self.exdates.len(),
            "rebuilt recurrence set"
        );
        Ok(())
    }

    fn build_collection(&self, with_exdates: bool) -> Result<RecurrenceCollection, CoreError> {
        let mut collection = match &self.rule_options {
            Some(options) => {
                let rule = Rule::new(RuleOptions {
                    dtstart: self.dtstart,
                    all_day: self.all_day,
                    ..options.clone()
                })?;
                RecurrenceCollection::with_rule(rule)
            }
            None => {
                let mut collection = RecurrenceCollection::new();
                collection.set_all_day(self.all_day)?;
                if let Some(dtstart) = self.dtstart {
                    collection.set_dtstart(dtstart)?;
                }
                collection
            }
        };
        for rdate in &self.rdates {
            collection.add_rdate(*rdate);
        }
        if with_exdates {
            for exdate in &self.exdates {
                collection.add_exdate(*exdate);
            }
        }
        Ok(collection)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Adds an explicit occurrence. Adding an existing RDATE is a no-op.
    pub fn add_rdate(&mut self, dt: Occurrence) -> Result<(), CoreError> {
        if push_unique(&mut self.rdates, timezone::normalize(dt, self.all_day)) {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Removes an explicit occurrence. Removing a missing RDATE is a no-op.
    pub fn remove_rdate(&mut self, dt: Occurrence) -> Result<(), CoreError> {
        if remove_value(&mut self.rdates, timezone::normalize(dt, self.all_day)) {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Excludes an occurrence. Adding an existing EXDATE is a no-op.
    pub fn add_exdate(&mut self, dt: Occurrence) -> Result<(), CoreError> {
        if push_unique(&mut self.exdates, timezone::normalize(dt, self.all_day)) {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Drops an exclusion. Removing a missing EXDATE is a no-op.
    pub fn remove_exdate(&mut self, dt: Occurrence) -> Result<(), CoreError> {
        if remove_value(&mut self.exdates, timezone::normalize(dt, self.all_day)) {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Bounds the rule by UNTIL, clearing COUNT.
    ///
    /// # Returns
    /// * `Err(CoreError::State)` when the set has no rule
    pub fn update_until(&mut self, until: Occurrence) -> Result<(), CoreError> {
        let options = self.rule_options.as_mut().ok_or_else(CoreError::no_rule)?;
        options.until = Some(until);
        options.count = 0;
        self.rebuild()
    }

    /// Bounds the rule by COUNT, clearing UNTIL. A count of 0 removes the bound.
    ///
    /// # Returns
    /// * `Err(CoreError::State)` when the set has no rule
    pub fn update_count(&mut self, count: u32) -> Result<(), CoreError> {
        let options = self.rule_options.as_mut().ok_or_else(CoreError::no_rule)?;
        options.count = count;
        options.until = None;
        self.rebuild()
    }

    /// Moves DTSTART, re-anchoring the rule.
    pub fn set_dtstart(&mut self, dtstart: Occurrence) -> Result<(), CoreError> {
        self.dtstart = Some(timezone::normalize(dtstart, self.all_day));
        self.rebuild()
    }

    /// Switches all-day mode; switching on floors every tracked value to its date.
    pub fn set_all_day(&mut self, all_day: bool) -> Result<(), CoreError> {
        if all_day == self.all_day {
            return Ok(());
        }
        self.all_day = all_day;
        if all_day {
            self.dtstart = self.dtstart.map(timezone::floor_to_date);
            self.rdates = dedup_normalized(&self.rdates);
            self.exdates = dedup_normalized(&self.exdates);
        }
        self.rebuild()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The first occurrence strictly after `after`.
    pub fn next(&self, after: Occurrence) -> Option<Occurrence> {
        self.collection.after(after, false)
    }

    /// Up to `n` occurrences strictly after `after`.
    pub fn next_n(&self, after: Occurrence, n: usize) -> Vec<Occurrence> {
        self.collection
            .iter()
            .skip_while(|dt| *dt <= after)
            .take(n)
            .collect()
    }

    /// Like [`next_n`](Self::next_n), but DTSTART itself counts as the first
    /// instance when `after` precedes it and it is not excluded.
    pub fn next_n_including_dtstart(&self, after: Occurrence, n: usize) -> Vec<Occurrence> {
        let Some(dtstart) = self.dtstart else {
            return self.next_n(after, n);
        };
        if n == 0 || after >= dtstart || self.is_excluded(dtstart) {
            return self.next_n(after, n);
        }

        let mut result = Vec::with_capacity(n);
        result.push(dtstart);
        result.extend(
            self.collection
                .iter()
                .skip_while(|dt| *dt <= after)
                .filter(|dt| *dt != dtstart)
                .take(n - 1),
        );
        result.sort();
        result
    }

    /// Checks that DTSTART is the first instance of the set (RFC 5545 §3.8.5.3).
    ///
    /// # Arguments
    /// * `ignore_exdate` - Evaluate as if no EXDATEs existed
    ///
    /// # Returns
    /// * `Ok(())` when the first instance on or after DTSTART is DTSTART, or
    ///   DTSTART is listed as an RDATE
    /// * `Err(CoreError::Alignment)` carrying what was found instead
    /// * `Err(CoreError::State)` when the set has no rule or no DTSTART
    pub fn validate_dtstart_alignment(&self, ignore_exdate: bool) -> Result<(), CoreError> {
        if self.rule_options.is_none() {
            return Err(CoreError::no_rule());
        }
        let dtstart = self
            .dtstart
            .ok_or_else(|| CoreError::State("set not initialized".to_string()))?;

        let unexcluded;
        let collection = if ignore_exdate && !self.exdates.is_empty() {
            unexcluded = self.build_collection(false)?;
            &unexcluded
        } else {
            &self.collection
        };

        let first = collection.after(dtstart, true);
        if first == Some(dtstart) {
            return Ok(());
        }
        let excluded = !ignore_exdate && self.is_excluded(dtstart);
        if self.rdates.contains(&dtstart) && !excluded {
            return Ok(());
        }

        let diagnostic = match first {
            Some(first) => AlignmentDiagnostic::FirstOccurrence(first),
            None => match collection.before(dtstart, false) {
                Some(preceding) => AlignmentDiagnostic::PrecedingOccurrence(preceding),
                None => AlignmentDiagnostic::NoOccurrences,
            },
        };
        debug!(%dtstart, %diagnostic, "DTSTART is not aligned with its rule");
        Err(AlignmentError { dtstart, diagnostic }.into())
    }

    fn is_excluded(&self, dt: Occurrence) -> bool {
        if self.all_day {
            self.exdates.iter().any(|ex| ex.date_naive() == dt.date_naive())
        } else {
            self.exdates.contains(&dt)
        }
    }

    // ========================================================================
    // Accessors and serialization
    // ========================================================================

    pub fn collection(&self) -> &RecurrenceCollection {
        &self.collection
    }

    pub fn rule_options(&self) -> Option<&RuleOptions> {
        self.rule_options.as_ref()
    }

    pub fn dtstart(&self) -> Option<Occurrence> {
        self.dtstart
    }

    pub fn is_all_day(&self) -> bool {
        self.all_day
    }

    pub fn rdates(&self) -> &[Occurrence] {
        &self.rdates
    }

    pub fn exdates(&self) -> &[Occurrence] {
        &self.exdates
    }

    /// Serializes the set back to RFC 5545 lines.
    pub fn to_lines(&self) -> Vec<String> {
        serializer::to_lines(
            self.dtstart,
            self.all_day,
            self.rule_options.as_ref(),
            &self.rdates,
            &self.exdates,
        )
    }
}

fn push_unique(values: &mut Vec<Occurrence>, dt: Occurrence) -> bool {
    if values.contains(&dt) {
        return false;
    }
    values.push(dt);
    true
}

fn remove_value(values: &mut Vec<Occurrence>, dt: Occurrence) -> bool {
    let before = values.len();
    values.retain(|v| *v != dt);
    values.len() != before
}

fn dedup_normalized(values: &[Occurrence]) -> Vec<Occurrence> {
    let mut normalized = Vec::with_capacity(values.len());
    for dt in values {
        push_unique(&mut normalized, timezone::floor_to_date(*dt));
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    fn utc(y: i32, m: u32, d: u32, h: u32) -> Occurrence {
        Tz::UTC.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[fixture]
    fn weekly() -> RecurrenceSetHelper {
        // Mondays at 09:00 UTC starting 2024-01-01
        RecurrenceSetHelper::from_lines(
            &["DTSTART:20240101T090000Z", "RRULE:FREQ=WEEKLY;BYDAY=MO"],
            Tz::UTC,
        )
        .unwrap()
    }

    mod mutation_tests {
        use super::*;

        #[rstest]
        fn test_add_and_remove_exdate(mut weekly: RecurrenceSetHelper) {
            weekly.add_exdate(utc(2024, 1, 8, 9)).unwrap();
            assert_eq!(weekly.next(utc(2024, 1, 1, 9)), Some(utc(2024, 1, 15, 9)));

            weekly.remove_exdate(utc(2024, 1, 8, 9)).unwrap();
            assert_eq!(weekly.next(utc(2024, 1, 1, 9)), Some(utc(2024, 1, 8, 9)));
        }

        #[rstest]
        fn test_add_and_remove_are_idempotent(mut weekly: RecurrenceSetHelper) {
            weekly.add_rdate(utc(2024, 1, 3, 12)).unwrap();
            weekly.add_rdate(utc(2024, 1, 3, 12)).unwrap();
            assert_eq!(weekly.rdates().len(), 1);

            weekly.remove_rdate(utc(2024, 1, 3, 12)).unwrap();
            weekly.remove_rdate(utc(2024, 1, 3, 12)).unwrap();
            assert!(weekly.rdates().is_empty());

            weekly.remove_exdate(utc(2030, 1, 1, 0)).unwrap();
            assert!(weekly.exdates().is_empty());
        }

        #[rstest]
        fn test_update_until_clears_count(mut weekly: RecurrenceSetHelper) {
            weekly.update_count(3).unwrap();
            assert_eq!(weekly.collection().all(None).len(), 3);

            weekly.update_until(utc(2024, 1, 22, 9)).unwrap();
            let options = weekly.rule_options().unwrap();
            assert_eq!(options.count, 0);
            assert_eq!(weekly.collection().all(None).len(), 4);
        }

        #[rstest]
        fn test_update_count_clears_until(mut weekly: RecurrenceSetHelper) {
            weekly.update_until(utc(2024, 1, 22, 9)).unwrap();
            weekly.update_count(2).unwrap();
            assert!(weekly.rule_options().unwrap().until.is_none());
            assert_eq!(
                weekly.collection().all(None),
                vec![utc(2024, 1, 1, 9), utc(2024, 1, 8, 9)]
            );
        }

        #[test]
        fn test_bound_updates_need_a_rule() {
            let mut helper =
                RecurrenceSetHelper::from_lines(&["RDATE:20240101T000000Z"], Tz::UTC).unwrap();
            assert!(matches!(helper.update_count(3), Err(CoreError::State(_))));
            assert!(matches!(
                helper.update_until(utc(2024, 2, 1, 0)),
                Err(CoreError::State(_))
            ));
        }

        #[rstest]
        fn test_set_all_day_floors_values(mut weekly: RecurrenceSetHelper) {
            weekly.add_exdate(utc(2024, 1, 8, 9)).unwrap();
            weekly.set_all_day(true).unwrap();
            assert_eq!(weekly.dtstart(), Some(utc(2024, 1, 1, 0)));
            assert_eq!(weekly.exdates(), &[utc(2024, 1, 8, 0)]);
            assert_eq!(weekly.next(utc(2024, 1, 1, 0)), Some(utc(2024, 1, 15, 0)));
        }

        #[test]
        fn test_dtstart_stays_stable_without_explicit_value() {
            let mut helper = RecurrenceSetHelper::from_lines(&["RRULE:FREQ=DAILY"], Tz::UTC).unwrap();
            let anchor = helper.dtstart().unwrap();
            helper.add_exdate(anchor + chrono::Duration::days(3)).unwrap();
            assert_eq!(helper.dtstart(), Some(anchor));
        }
    }

    mod query_tests {
        use super::*;

        #[rstest]
        fn test_next_n(weekly: RecurrenceSetHelper) {
            assert_eq!(
                weekly.next_n(utc(2024, 1, 1, 9), 2),
                vec![utc(2024, 1, 8, 9), utc(2024, 1, 15, 9)]
            );
            assert!(weekly.next_n(utc(2024, 1, 1, 9), 0).is_empty());
        }

        #[test]
        fn test_next_n_including_dtstart_off_pattern() {
            // DTSTART on a Wednesday, rule produces Mondays
            let helper = RecurrenceSetHelper::from_lines(
                &["DTSTART:20240103T090000Z", "RRULE:FREQ=WEEKLY;BYDAY=MO"],
                Tz::UTC,
            )
            .unwrap();
            let before = utc(2024, 1, 1, 0);
            assert_eq!(
                helper.next_n_including_dtstart(before, 3),
                vec![utc(2024, 1, 3, 9), utc(2024, 1, 8, 9), utc(2024, 1, 15, 9)]
            );
            assert_eq!(helper.next_n(before, 1), vec![utc(2024, 1, 8, 9)]);
        }

        #[rstest]
        fn test_next_n_including_dtstart_no_duplicate(weekly: RecurrenceSetHelper) {
            assert_eq!(
                weekly.next_n_including_dtstart(utc(2023, 12, 1, 0), 2),
                vec![utc(2024, 1, 1, 9), utc(2024, 1, 8, 9)]
            );
        }

        #[rstest]
        fn test_next_n_including_dtstart_respects_exdate(mut weekly: RecurrenceSetHelper) {
            weekly.add_exdate(utc(2024, 1, 1, 9)).unwrap();
            assert_eq!(
                weekly.next_n_including_dtstart(utc(2023, 12, 1, 0), 1),
                vec![utc(2024, 1, 8, 9)]
            );
        }
    }

    mod alignment_tests {
        use super::*;

        #[rstest]
        fn test_aligned(weekly: RecurrenceSetHelper) {
            assert!(weekly.validate_dtstart_alignment(false).is_ok());
        }

        #[test]
        fn test_misaligned_reports_first_occurrence() {
            let helper = RecurrenceSetHelper::from_lines(
                &["DTSTART:20240103T090000Z", "RRULE:FREQ=WEEKLY;BYDAY=MO"],
                Tz::UTC,
            )
            .unwrap();
            match helper.validate_dtstart_alignment(false) {
                Err(CoreError::Alignment(err)) => {
                    assert_eq!(err.actual_first(), Some(utc(2024, 1, 8, 9)));
                    assert_eq!(err.dtstart, utc(2024, 1, 3, 9));
                }
                other => panic!("expected alignment error, got {:?}", other),
            }
        }

        #[test]
        fn test_rdate_matching_dtstart_is_aligned() {
            let helper = RecurrenceSetHelper::from_lines(
                &[
                    "DTSTART:20240103T090000Z",
                    "RRULE:FREQ=WEEKLY;BYDAY=MO",
                    "RDATE:20240103T090000Z",
                ],
                Tz::UTC,
            )
            .unwrap();
            assert!(helper.validate_dtstart_alignment(false).is_ok());
        }

        #[rstest]
        fn test_exdate_on_dtstart(mut weekly: RecurrenceSetHelper) {
            weekly.add_exdate(utc(2024, 1, 1, 9)).unwrap();
            assert!(weekly.validate_dtstart_alignment(true).is_ok());
            assert!(matches!(
                weekly.validate_dtstart_alignment(false),
                Err(CoreError::Alignment(_))
            ));
        }

        #[test]
        fn test_no_occurrences() {
            let helper = RecurrenceSetHelper::from_lines(
                &["DTSTART:20240101T000000Z", "RRULE:FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=30"],
                Tz::UTC,
            )
            .unwrap();
            match helper.validate_dtstart_alignment(false) {
                Err(CoreError::Alignment(err)) => {
                    assert_eq!(err.diagnostic, AlignmentDiagnostic::NoOccurrences)
                }
                other => panic!("expected alignment error, got {:?}", other),
            }
        }

        #[test]
        fn test_preceding_occurrence_from_rdate() {
            let helper = RecurrenceSetHelper::from_lines(
                &[
                    "DTSTART:20240110T000000Z",
                    "RRULE:FREQ=DAILY;UNTIL=20240101T000000Z",
                    "RDATE:20240105T000000Z",
                ],
                Tz::UTC,
            )
            .unwrap();
            match helper.validate_dtstart_alignment(false) {
                Err(CoreError::Alignment(err)) => {
                    assert_eq!(err.preceding(), Some(utc(2024, 1, 5, 0)))
                }
                other => panic!("expected alignment error, got {:?}", other),
            }
        }

        #[test]
        fn test_alignment_without_rule() {
            let helper = RecurrenceSetHelper::from_lines(&["RDATE:20240101T000000Z"], Tz::UTC).unwrap();
            assert!(matches!(
                helper.validate_dtstart_alignment(false),
                Err(CoreError::State(_))
            ));
        }
    }

    #[rstest]
    fn test_to_lines_round_trip(mut weekly: RecurrenceSetHelper) {
        weekly.add_exdate(utc(2024, 1, 8, 9)).unwrap();
        let lines = weekly.to_lines();
        assert_eq!(
            lines,
            vec![
                "DTSTART:20240101T090000Z",
                "RRULE:FREQ=WEEKLY;BYDAY=MO",
                "EXDATE:20240108T090000Z",
            ]
        );
        let reparsed = RecurrenceSetHelper::from_lines(&lines, Tz::UTC).unwrap();
        assert_eq!(
            reparsed.next_n(utc(2024, 1, 1, 0), 3),
            weekly.next_n(utc(2024, 1, 1, 0), 3)
        );
    }
}
