use std::collections::BTreeMap;

use serde::Serialize;

use crate::datetime::{Instant, MILLIS_PER_DAY, MILLIS_PER_HOUR, MILLIS_PER_WEEK, iso_date_serde};
use crate::error::CalendarError;
use crate::event::Event;
use crate::term::Term;

/// Bucket name for events falling outside every configured term.
pub const OUT_OF_TERM: &str = "OT";

/// A date this close before a term's start still counts as the term's
/// first week: a term starting mid-week is a full "week 1" for display.
const WEEK_START_GRACE: i64 = 6 * MILLIS_PER_DAY;

/// Bias subtracted from the weekday offset so exact week transitions
/// land on integer boundaries under `ceil` despite floating-point
/// division.
const WEEK_ROUNDING_BIAS: f64 = 0.01;

/// A run of events grouped under one term, or under the out-of-term
/// sentinel.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TermBucket {
    pub name: String,
    pub label: String,
    #[serde(with = "iso_date_serde")]
    pub start: Instant,
    #[serde(with = "iso_date_serde")]
    pub end: Instant,
    pub events: Vec<Event>,
}

/// Maps absolute dates onto the institutional term/week model.
///
/// Holds the term table for one academic year, supplied up front; every
/// operation is a pure function of its arguments and that table.
#[derive(Debug, Clone)]
pub struct AcademicCalendar {
    terms: Vec<Term>,
}

impl AcademicCalendar {
    pub fn new(mut terms: Vec<Term>) -> Self {
        terms.sort_by_key(|term| term.start);
        Self { terms }
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Finds the term containing `date`, or `None` when the date falls
    /// in a break or vacation.
    ///
    /// Unless `precise`, a date within six days before a term's start is
    /// treated as inside that term, matching how the short opening week
    /// is presented.
    pub fn term_for(&self, date: Instant, precise: bool) -> Option<&Term> {
        self.terms.iter().find(|term| {
            if precise {
                term.contains(date)
            } else {
                date <= term.end && date.millis() + WEEK_START_GRACE >= term.start.millis()
            }
        })
    }

    /// 1-based week-within-term for `date`, or 0 when out of term.
    ///
    /// Terms start on a Tuesday but academic weeks turn over on
    /// Thursday, so the opening week covers only two days. Worked
    /// example: with Lent starting Tue 2015-01-13, Wed 2015-02-11 is
    /// week 5.
    pub fn academic_week_number(&self, date: Instant, precise: bool) -> i64 {
        let Some(term) = self.term_for(date, precise) else {
            return 0;
        };

        // One hour forward absorbs DST drift in term boundaries before
        // anchoring on the calendar day.
        let anchor = Instant::from_millis(term.start.millis() + MILLIS_PER_HOUR).start_of_day();
        let day_offset = anchor.iso_weekday() as f64 / 7.0 - WEEK_ROUNDING_BIAS;
        let elapsed_weeks =
            (date.millis() - anchor.millis()) as f64 / MILLIS_PER_WEEK as f64;
        (elapsed_weeks - day_offset).ceil() as i64 + 1
    }

    pub fn term_by_name(&self, name: &str) -> Result<&Term, CalendarError> {
        self.terms
            .iter()
            .find(|term| term.name == name)
            .ok_or_else(|| CalendarError::NotFound(name.to_string()))
    }

    pub fn first_day_of_term(&self, name: &str) -> Result<Instant, CalendarError> {
        Ok(self.term_by_name(name)?.start)
    }

    /// Calendar date of the given weekday (0 = Sunday .. 6 = Saturday)
    /// within the 1-based week of the named term.
    ///
    /// Weeks here are fixed seven-day offsets from the term start, not
    /// calendar weeks, so a weekday falling before the week's nominal
    /// start day wraps to the following instance of that weekday.
    pub fn date_by_week_and_day(
        &self,
        name: &str,
        week: i64,
        day: i64,
    ) -> Result<Instant, CalendarError> {
        if week < 1 {
            return Err(CalendarError::invalid_input(format!(
                "week number must be 1 or greater, got {week}"
            )));
        }
        if !(0..=6).contains(&day) {
            return Err(CalendarError::invalid_input(format!(
                "day number must be 0 (Sunday) to 6 (Saturday), got {day}"
            )));
        }

        let start = self.first_day_of_term(name)?;
        let start_of_week = start.millis() + (week - 1) * MILLIS_PER_WEEK;
        let week_start_day = Instant::from_millis(start_of_week).weekday_sun0();

        let offset_days = if day < week_start_day {
            7 - week_start_day + day
        } else {
            day - week_start_day
        };

        Ok(Instant::from_millis(start_of_week + offset_days * MILLIS_PER_DAY))
    }

    /// Classifies events by their start date. An event whose start falls
    /// inside several terms lands in every matching bucket; term tables
    /// are expected not to overlap, but that is a data invariant checked
    /// operationally, not enforced here. Events matching nothing collect
    /// into the `OT` bucket.
    pub fn split_events_by_term(&self, events: &[Event]) -> BTreeMap<String, TermBucket> {
        let mut buckets: BTreeMap<String, TermBucket> = BTreeMap::new();

        for event in events {
            let mut matched = false;
            for term in &self.terms {
                if term.contains(event.start) {
                    matched = true;
                    buckets
                        .entry(term.label.clone())
                        .or_insert_with(|| TermBucket {
                            name: term.name.clone(),
                            label: term.label.clone(),
                            start: term.start,
                            end: term.end,
                            events: vec![],
                        })
                        .events
                        .push(event.clone());
                }
            }

            if !matched {
                let bucket =
                    buckets
                        .entry(OUT_OF_TERM.to_string())
                        .or_insert_with(|| TermBucket {
                            name: OUT_OF_TERM.to_string(),
                            label: OUT_OF_TERM.to_string(),
                            start: event.start,
                            end: event.end,
                            events: vec![],
                        });
                bucket.start = bucket.start.min(event.start);
                bucket.end = bucket.end.max(event.end);
                bucket.events.push(event.clone());
            }
        }

        buckets
    }
}

/// Inclusive range containment.
pub fn is_date_in_range(date: Instant, start: Instant, end: Instant) -> Result<bool, CalendarError> {
    if start > end {
        return Err(CalendarError::InvalidRange {
            start: start.millis(),
            end: end.millis(),
        });
    }
    Ok(start <= date && date <= end)
}

/// Whole weeks in a date range, to the nearest week.
pub fn weeks_in_date_range(start: Instant, end: Instant) -> Result<i64, CalendarError> {
    if start > end {
        return Err(CalendarError::InvalidRange {
            start: start.millis(),
            end: end.millis(),
        });
    }
    let weeks = (end.millis() - start.millis()) as f64 / MILLIS_PER_WEEK as f64;
    Ok(weeks.round() as i64)
}

pub fn weeks_in_term(term: &Term) -> i64 {
    let span = (term.end.millis() - term.start.millis()).abs();
    (span as f64 / MILLIS_PER_WEEK as f64).ceil() as i64 + 1
}

/// Orders term buckets chronologically. Out-of-term events are not one
/// contiguous range (some precede the first term, some trail the last),
/// so the `OT` bucket is first exploded into one entry per event, sorted
/// among the real terms, and contiguous `OT` runs are then re-merged
/// into a single bucket per run.
pub fn order_events_by_term(buckets: BTreeMap<String, TermBucket>) -> Vec<TermBucket> {
    let mut exploded: Vec<TermBucket> = Vec::new();

    for (key, bucket) in buckets {
        if key == OUT_OF_TERM {
            for event in bucket.events {
                exploded.push(TermBucket {
                    name: OUT_OF_TERM.to_string(),
                    label: OUT_OF_TERM.to_string(),
                    start: event.start,
                    end: event.end,
                    events: vec![event],
                });
            }
        } else {
            exploded.push(bucket);
        }
    }

    exploded.sort_by_key(|bucket| bucket.start);

    let mut ordered: Vec<TermBucket> = Vec::new();
    for bucket in exploded {
        match ordered.last_mut() {
            Some(prev) if prev.name == OUT_OF_TERM && bucket.name == OUT_OF_TERM => {
                prev.end = bucket.end;
                prev.events.extend(bucket.events);
            }
            _ => ordered.push(bucket),
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::{
        AcademicCalendar, OUT_OF_TERM, is_date_in_range, order_events_by_term, weeks_in_date_range,
        weeks_in_term,
    };
    use crate::datetime::{Instant, MILLIS_PER_DAY, MILLIS_PER_HOUR, iso_to_unix};
    use crate::error::CalendarError;
    use crate::event::Event;
    use crate::term::Term;

    fn at(raw: &str) -> Instant {
        iso_to_unix(raw).expect("valid test date")
    }

    fn term(name: &str, label: &str, start: &str, end: &str) -> Term {
        Term {
            name: name.to_string(),
            label: label.to_string(),
            start: at(start),
            end: at(end),
        }
    }

    fn event(start: &str) -> Event {
        let start = at(start);
        Event {
            id: None,
            display_name: String::new(),
            start,
            end: Instant::from_millis(start.millis() + MILLIS_PER_HOUR),
        }
    }

    /// Cambridge 2014-15 dates: every term starts on a Tuesday.
    fn cambridge() -> AcademicCalendar {
        AcademicCalendar::new(vec![
            term("michaelmas", "Michaelmas", "2014-10-07", "2014-12-05"),
            term("lent", "Lent", "2015-01-13", "2015-03-13"),
            term("easter", "Easter", "2015-04-21", "2015-06-12"),
        ])
    }

    #[test]
    fn lent_week_five_worked_example() {
        let cal = cambridge();
        assert_eq!(cal.academic_week_number(at("2015-02-11"), false), 5);
    }

    #[test]
    fn opening_week_is_two_days() {
        let cal = cambridge();
        // Tue and Wed belong to week 1, Thu opens week 2.
        assert_eq!(cal.academic_week_number(at("2015-01-13"), false), 1);
        assert_eq!(cal.academic_week_number(at("2015-01-14"), false), 1);
        assert_eq!(cal.academic_week_number(at("2015-01-15"), false), 2);
    }

    #[test]
    fn week_numbers_never_decrease_within_a_term() {
        let cal = cambridge();
        let start = at("2015-01-13").millis();
        let end = at("2015-03-13").millis();

        let mut previous = 0;
        let mut day = start;
        while day <= end {
            let week = cal.academic_week_number(Instant::from_millis(day), true);
            assert!(week >= previous, "week dropped from {previous} to {week}");
            previous = week;
            day += MILLIS_PER_DAY;
        }
    }

    #[test]
    fn dates_outside_every_term_report_out_of_term() {
        let cal = cambridge();
        for raw in ["2014-09-01", "2014-12-25", "2015-06-20"] {
            assert!(cal.term_for(at(raw), false).is_none(), "{raw}");
            assert!(cal.term_for(at(raw), true).is_none(), "{raw}");
            assert_eq!(cal.academic_week_number(at(raw), false), 0, "{raw}");
        }
    }

    #[test]
    fn grace_window_pulls_nearby_dates_into_week_one() {
        let cal = cambridge();
        let eve = at("2014-10-04"); // three days before Michaelmas

        let found = cal.term_for(eve, false).expect("grace match");
        assert_eq!(found.name, "michaelmas");
        assert!(cal.term_for(eve, true).is_none());

        assert_eq!(cal.academic_week_number(eve, false), 1);
        assert_eq!(cal.academic_week_number(eve, true), 0);
    }

    #[test]
    fn first_day_lookup_and_unknown_term() {
        let cal = cambridge();
        assert_eq!(
            cal.first_day_of_term("lent").expect("known term"),
            at("2015-01-13")
        );

        let err = cal.first_day_of_term("trinity").expect_err("unknown term");
        assert_eq!(err, CalendarError::NotFound("trinity".to_string()));
    }

    #[test]
    fn weeks_in_term_counts_partial_weeks() {
        // Exactly eight calendar weeks start-to-end.
        let eight = term("t", "T", "2015-01-04", "2015-03-01");
        assert_eq!(weeks_in_term(&eight), 9);

        // Lent 2015 spans 59 days.
        let lent = term("lent", "Lent", "2015-01-13", "2015-03-13");
        assert_eq!(weeks_in_term(&lent), 10);
    }

    #[test]
    fn date_by_week_and_day_basics() {
        let cal = cambridge();

        // Week 1 day 2 is the Tuesday the term starts on.
        assert_eq!(
            cal.date_by_week_and_day("lent", 1, 2).expect("tuesday"),
            at("2015-01-13")
        );
        assert_eq!(
            cal.date_by_week_and_day("lent", 1, 3).expect("wednesday"),
            at("2015-01-14")
        );
        assert_eq!(
            cal.date_by_week_and_day("lent", 5, 3).expect("week five"),
            at("2015-02-11")
        );
    }

    #[test]
    fn date_by_week_and_day_wraps_to_following_weekday() {
        let cal = cambridge();

        // Sunday precedes the Tuesday week anchor, so it wraps forward.
        let sunday = cal.date_by_week_and_day("lent", 1, 0).expect("sunday");
        assert_eq!(sunday, at("2015-01-18"));
        assert_eq!(sunday.weekday_sun0(), 0);
    }

    #[test]
    fn date_by_week_and_day_validates_arguments() {
        let cal = cambridge();
        assert!(matches!(
            cal.date_by_week_and_day("lent", 0, 2),
            Err(CalendarError::InvalidInput(_))
        ));
        assert!(matches!(
            cal.date_by_week_and_day("lent", 1, 7),
            Err(CalendarError::InvalidInput(_))
        ));
        assert!(matches!(
            cal.date_by_week_and_day("trinity", 1, 2),
            Err(CalendarError::NotFound(_))
        ));
    }

    #[test]
    fn week_and_day_round_trips_for_sunday_aligned_term() {
        // 2015-03-01 was a Sunday: week windows line up with the week
        // numbering, so every weekday of week N maps back to week N.
        let cal = AcademicCalendar::new(vec![term("synthetic", "Synthetic", "2015-03-01", "2015-04-30")]);

        for week in 1..=4 {
            for day in 0..=6 {
                let date = cal
                    .date_by_week_and_day("synthetic", week, day)
                    .expect("valid combination");
                assert_eq!(
                    cal.academic_week_number(date, true),
                    week,
                    "week {week} day {day}"
                );
            }
        }
    }

    #[test]
    fn week_and_day_round_trips_for_tuesday_term_anchor_days() {
        // For a Tuesday-starting term only the Tue/Wed slots share a
        // week window with the Thursday-turning week numbers.
        let cal = cambridge();
        for week in 1..=8 {
            for day in [2, 3] {
                let date = cal
                    .date_by_week_and_day("lent", week, day)
                    .expect("valid combination");
                assert_eq!(
                    cal.academic_week_number(date, true),
                    week,
                    "week {week} day {day}"
                );
            }
        }
    }

    #[test]
    fn range_checks_are_inclusive_and_validated() {
        let start = at("2015-01-13");
        let end = at("2015-03-13");

        assert!(is_date_in_range(start, start, end).expect("start edge"));
        assert!(is_date_in_range(end, start, end).expect("end edge"));
        assert!(!is_date_in_range(at("2015-03-14"), start, end).expect("outside"));

        assert!(matches!(
            is_date_in_range(start, end, start),
            Err(CalendarError::InvalidRange { .. })
        ));
        assert!(matches!(
            weeks_in_date_range(end, start),
            Err(CalendarError::InvalidRange { .. })
        ));
    }

    #[test]
    fn weeks_in_date_range_rounds_to_nearest() {
        let start = at("2015-01-04");
        assert_eq!(weeks_in_date_range(start, at("2015-01-25")).expect("3 weeks"), 3);
        assert_eq!(weeks_in_date_range(start, at("2015-01-28")).expect("round down"), 3);
        assert_eq!(weeks_in_date_range(start, at("2015-01-29")).expect("round up"), 4);
    }

    #[test]
    fn split_collects_unmatched_events_into_ot() {
        let cal = cambridge();
        let events = vec![
            event("2014-10-20"),
            event("2014-09-01"),
            event("2015-02-02"),
            event("2015-07-01"),
        ];

        let buckets = cal.split_events_by_term(&events);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets["Michaelmas"].events, vec![event("2014-10-20")]);
        assert_eq!(buckets["Lent"].events, vec![event("2015-02-02")]);

        let ot = &buckets[OUT_OF_TERM];
        assert_eq!(ot.events.len(), 2);
        assert_eq!(ot.start, at("2014-09-01"));
        assert_eq!(ot.end.millis(), at("2015-07-01").millis() + MILLIS_PER_HOUR);
    }

    #[test]
    fn split_matching_is_not_exclusive_across_overlapping_terms() {
        let cal = AcademicCalendar::new(vec![
            term("alpha", "Alpha", "2015-01-01", "2015-02-01"),
            term("beta", "Beta", "2015-01-20", "2015-03-01"),
        ]);

        let buckets = cal.split_events_by_term(&[event("2015-01-25")]);
        assert_eq!(buckets["Alpha"].events.len(), 1);
        assert_eq!(buckets["Beta"].events.len(), 1);
    }

    #[test]
    fn ordering_keeps_non_contiguous_ot_runs_separate() {
        let cal = cambridge();
        let buckets = cal.split_events_by_term(&[
            event("2014-10-20"),
            event("2014-09-01"),
            event("2015-02-02"),
            event("2015-07-01"),
        ]);

        let ordered = order_events_by_term(buckets);
        let names: Vec<&str> = ordered.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec![OUT_OF_TERM, "michaelmas", "lent", OUT_OF_TERM]);
        assert_eq!(ordered[0].events, vec![event("2014-09-01")]);
        assert_eq!(ordered[3].events, vec![event("2015-07-01")]);
    }

    #[test]
    fn ordering_merges_contiguous_ot_runs() {
        let cal = cambridge();
        let buckets = cal.split_events_by_term(&[
            event("2014-09-05"),
            event("2014-09-01"),
            event("2014-10-20"),
        ]);

        let ordered = order_events_by_term(buckets);
        assert_eq!(ordered.len(), 2);

        let ot = &ordered[0];
        assert_eq!(ot.name, OUT_OF_TERM);
        assert_eq!(ot.events.len(), 2);
        assert_eq!(ot.start, at("2014-09-01"));
        assert_eq!(ot.end.millis(), at("2014-09-05").millis() + MILLIS_PER_HOUR);
    }
}
