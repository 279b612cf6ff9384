//! Working-day classification and enumeration.
//!
//! Every date is reduced to its calendar-day identity ([`NaiveDate`]) before
//! it is compared, so the time of day or zone of an input never changes
//! which weekday it falls on. Instants carrying an offset are reduced in UTC.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{CalendarError, RangeViolation, Result};

/// Highest weekday index used by team calendars: 0 = Sunday ... 6 = Saturday.
pub const SATURDAY: u8 = 6;

/// Work-week and holiday settings for one team, passed in on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkCalendarConfig {
    /// Informational only; `working_days` decides which weekdays count.
    pub working_days_per_week: u8,
    pub working_days: BTreeSet<u8>,
    pub holidays: Vec<NaiveDate>,
    pub time_zone: Tz,
}

impl Default for WorkCalendarConfig {
    fn default() -> Self {
        Self {
            working_days_per_week: 5,
            working_days: (1..=5).collect(),
            holidays: vec![],
            time_zone: chrono_tz::UTC,
        }
    }
}

impl WorkCalendarConfig {
    pub fn with_holidays<I>(mut self, holidays: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.holidays.extend(holidays);
        self
    }
}

/// Anything that can be reduced to a calendar day.
///
/// Textual input is the only representation that can fail; it must be an ISO
/// `YYYY-MM-DD` date, an RFC 3339 timestamp or a date-time without offset.
pub trait CalendarDay {
    fn calendar_day(&self) -> Result<NaiveDate>;
}

impl CalendarDay for NaiveDate {
    fn calendar_day(&self) -> Result<NaiveDate> {
        Ok(*self)
    }
}

impl CalendarDay for NaiveDateTime {
    fn calendar_day(&self) -> Result<NaiveDate> {
        Ok(self.date())
    }
}

impl<Z: TimeZone> CalendarDay for DateTime<Z> {
    fn calendar_day(&self) -> Result<NaiveDate> {
        Ok(self.with_timezone(&Utc).date_naive())
    }
}

impl CalendarDay for str {
    fn calendar_day(&self) -> Result<NaiveDate> {
        let token = self.trim();
        if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
            return Ok(date);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
            return dt.calendar_day();
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
                return ndt.calendar_day();
            }
        }
        Err(CalendarError::invalid_date(self))
    }
}

impl CalendarDay for String {
    fn calendar_day(&self) -> Result<NaiveDate> {
        self.as_str().calendar_day()
    }
}

impl<T: CalendarDay + ?Sized> CalendarDay for &T {
    fn calendar_day(&self) -> Result<NaiveDate> {
        (**self).calendar_day()
    }
}

/// Weekday index of `date`, Sunday = 0.
#[must_use]
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Holiday lookup built once per call and reused for every visited day.
struct DayClassifier<'a> {
    working_days: &'a BTreeSet<u8>,
    holidays: HashSet<NaiveDate>,
}

impl<'a> DayClassifier<'a> {
    fn new(config: &'a WorkCalendarConfig) -> Self {
        Self {
            working_days: &config.working_days,
            holidays: config.holidays.iter().copied().collect(),
        }
    }

    fn classify(&self, day: NaiveDate) -> bool {
        self.working_days.contains(&weekday_index(day)) && !self.holidays.contains(&day)
    }
}

/// Whether `date` is a working day under `config`.
pub fn is_working_day<D>(date: &D, config: &WorkCalendarConfig) -> Result<bool>
where
    D: CalendarDay + ?Sized,
{
    let day = date.calendar_day()?;
    Ok(DayClassifier::new(config).classify(day))
}

/// Working days from `start` through `end`, both inclusive, in ascending order.
pub fn get_working_days_in_range<S, E>(
    start: &S,
    end: &E,
    config: &WorkCalendarConfig,
) -> Result<Vec<NaiveDate>>
where
    S: CalendarDay + ?Sized,
    E: CalendarDay + ?Sized,
{
    let range = DateRange::from_endpoints(start, end)?;
    Ok(working_days_between(range.start, range.end, config))
}

/// Number of working days from `start` through `end`, both inclusive.
///
/// Validates exactly like [`get_working_days_in_range`].
pub fn calculate_working_days<S, E>(start: &S, end: &E, config: &WorkCalendarConfig) -> Result<usize>
where
    S: CalendarDay + ?Sized,
    E: CalendarDay + ?Sized,
{
    get_working_days_in_range(start, end, config).map(|days| days.len())
}

fn working_days_between(start: NaiveDate, end: NaiveDate, config: &WorkCalendarConfig) -> Vec<NaiveDate> {
    let classifier = DayClassifier::new(config);
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| classifier.classify(*day))
        .collect()
}

/// An inclusive span of calendar days with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(CalendarError::end_before_start(start, end));
        }
        Ok(Self { start, end })
    }

    /// Normalises both endpoints, reporting which one failed.
    pub fn from_endpoints<S, E>(start: &S, end: &E) -> Result<Self>
    where
        S: CalendarDay + ?Sized,
        E: CalendarDay + ?Sized,
    {
        let start = start.calendar_day().map_err(|err| range_endpoint_error(err, true))?;
        let end = end.calendar_day().map_err(|err| range_endpoint_error(err, false))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// The clamped intersection with `[start, end]`, or `None` when disjoint.
    pub fn overlap(&self, start: NaiveDate, end: NaiveDate) -> Option<Self> {
        let overlap_start = self.start.max(start);
        let overlap_end = self.end.min(end);
        (overlap_start <= overlap_end).then_some(Self {
            start: overlap_start,
            end: overlap_end,
        })
    }

    pub fn working_days(&self, config: &WorkCalendarConfig) -> Vec<NaiveDate> {
        working_days_between(self.start, self.end, config)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

fn range_endpoint_error(err: CalendarError, is_start: bool) -> CalendarError {
    match err {
        CalendarError::InvalidDate { input } => CalendarError::InvalidRange {
            reason: if is_start {
                RangeViolation::InvalidStart(input)
            } else {
                RangeViolation::InvalidEnd(input)
            },
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{
        DateRange, WorkCalendarConfig, calculate_working_days, get_working_days_in_range,
        is_working_day, weekday_index,
    };
    use crate::error::{CalendarError, RangeViolation};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn weekday_index_starts_on_sunday() {
        assert_eq!(weekday_index(day(2024, 7, 7)), 0);
        assert_eq!(weekday_index(day(2024, 7, 1)), 1);
        assert_eq!(weekday_index(day(2024, 7, 6)), 6);
    }

    #[test]
    fn classifies_weekdays_weekends_and_holidays() {
        let config = WorkCalendarConfig::default().with_holidays([day(2024, 7, 4)]);

        assert!(is_working_day(&day(2024, 7, 3), &config).expect("classify"));
        assert!(!is_working_day(&day(2024, 7, 4), &config).expect("classify"));
        assert!(!is_working_day(&day(2024, 7, 6), &config).expect("classify"));
        assert!(!is_working_day("2024-07-07", &config).expect("classify"));
    }

    #[test]
    fn time_of_day_does_not_shift_the_weekday() {
        let config = WorkCalendarConfig::default();
        let late_friday = Utc
            .with_ymd_and_hms(2024, 7, 5, 23, 59, 59)
            .single()
            .expect("valid instant");
        let early_friday = day(2024, 7, 5).and_hms_opt(0, 0, 1).expect("valid time");

        assert!(is_working_day(&late_friday, &config).expect("classify"));
        assert!(is_working_day(&early_friday, &config).expect("classify"));
        assert!(is_working_day("2024-07-05T23:30:00Z", &config).expect("classify"));
    }

    #[test]
    fn local_date_time_text_keeps_its_date() {
        let config = WorkCalendarConfig::default();
        assert!(is_working_day("2024-07-05T10:00:00", &config).expect("classify"));
        assert!(!is_working_day("2024-07-06 23:15:00", &config).expect("classify"));
        assert!(is_working_day("2024-07-05T10:00:00.250", &config).expect("classify"));
        assert!(is_working_day("2024-07-05T25:00:00", &config).is_err());
    }

    #[test]
    fn repeated_classification_agrees() {
        let config = WorkCalendarConfig::default().with_holidays([day(2024, 7, 4)]);
        let afternoon = Utc
            .with_ymd_and_hms(2024, 7, 4, 15, 45, 0)
            .single()
            .expect("valid instant");
        let monday = day(2024, 7, 1).and_hms_opt(9, 30, 0).expect("valid time");

        for _ in 0..3 {
            assert_eq!(
                is_working_day(&afternoon, &config).expect("first"),
                is_working_day(&afternoon, &config).expect("second")
            );
            assert_eq!(
                is_working_day(&monday, &config).expect("first"),
                is_working_day(&monday, &config).expect("second")
            );
        }
        assert!(!is_working_day(&afternoon, &config).expect("holiday"));
        assert!(is_working_day(&monday, &config).expect("monday"));
    }

    #[test]
    fn unparsable_date_is_reported() {
        let config = WorkCalendarConfig::default();
        let err = is_working_day("not-a-date", &config).expect_err("should fail");
        assert_eq!(
            err,
            CalendarError::InvalidDate {
                input: "not-a-date".to_string()
            }
        );

        let err = is_working_day("2024-02-30", &config).expect_err("should fail");
        assert!(err.is_invalid_date());
    }

    #[test]
    fn scenario_a_full_work_week() {
        let config = WorkCalendarConfig::default();
        assert_eq!(
            calculate_working_days("2024-07-01", "2024-07-05", &config).expect("count"),
            5
        );
    }

    #[test]
    fn scenario_b_weekend_is_excluded() {
        let config = WorkCalendarConfig::default();
        assert_eq!(
            calculate_working_days("2024-07-01", "2024-07-07", &config).expect("count"),
            5
        );
    }

    #[test]
    fn scenario_c_holiday_is_excluded() {
        let config = WorkCalendarConfig::default().with_holidays([day(2024, 7, 4)]);
        assert_eq!(
            calculate_working_days("2024-07-01", "2024-07-05", &config).expect("count"),
            4
        );
    }

    #[test]
    fn enumerates_in_ascending_order() {
        let config = WorkCalendarConfig::default().with_holidays([day(2024, 7, 4)]);
        let days = get_working_days_in_range(&day(2024, 6, 28), &day(2024, 7, 5), &config)
            .expect("enumerate");
        assert_eq!(
            days,
            vec![
                day(2024, 6, 28),
                day(2024, 7, 1),
                day(2024, 7, 2),
                day(2024, 7, 3),
                day(2024, 7, 5),
            ]
        );
    }

    #[test]
    fn single_day_range_matches_classifier() {
        let config = WorkCalendarConfig::default();
        for d in 1..=7 {
            let date = day(2024, 7, d);
            let expected = usize::from(is_working_day(&date, &config).expect("classify"));
            assert_eq!(
                calculate_working_days(&date, &date, &config).expect("count"),
                expected
            );
        }
    }

    #[test]
    fn adding_a_holiday_removes_at_most_one_day() {
        let base = WorkCalendarConfig::default();
        let start = day(2024, 7, 1);
        let end = day(2024, 7, 14);
        let before = calculate_working_days(&start, &end, &base).expect("count");

        for holiday in start.iter_days().take_while(|d| *d <= end) {
            let was_working = is_working_day(&holiday, &base).expect("classify");
            let with_holiday = base.clone().with_holidays([holiday]);
            let after = calculate_working_days(&start, &end, &with_holiday).expect("count");
            assert_eq!(before - after, usize::from(was_working), "holiday {holiday}");
        }
    }

    #[test]
    fn empty_working_week_yields_no_days() {
        let config = WorkCalendarConfig {
            working_days: Default::default(),
            ..WorkCalendarConfig::default()
        };
        assert_eq!(
            calculate_working_days("2024-07-01", "2024-07-31", &config).expect("count"),
            0
        );
    }

    #[test]
    fn custom_working_week_is_respected() {
        let config = WorkCalendarConfig {
            working_days_per_week: 4,
            working_days: [0, 1, 2, 3].into_iter().collect(),
            ..WorkCalendarConfig::default()
        };
        let days = get_working_days_in_range("2024-07-01", "2024-07-07", &config).expect("enumerate");
        assert_eq!(days, vec![day(2024, 7, 1), day(2024, 7, 2), day(2024, 7, 3), day(2024, 7, 7)]);
    }

    #[test]
    fn reversed_range_is_rejected_by_both_entry_points() {
        let config = WorkCalendarConfig::default();
        let expected = CalendarError::end_before_start(day(2024, 7, 5), day(2024, 7, 1));

        assert_eq!(
            calculate_working_days("2024-07-05", "2024-07-01", &config).expect_err("reversed"),
            expected
        );
        assert_eq!(
            get_working_days_in_range("2024-07-05", "2024-07-01", &config).expect_err("reversed"),
            expected
        );
    }

    #[test]
    fn invalid_endpoint_names_the_side() {
        let config = WorkCalendarConfig::default();
        let err = calculate_working_days("garbage", "2024-07-01", &config).expect_err("bad start");
        assert_eq!(
            err,
            CalendarError::InvalidRange {
                reason: RangeViolation::InvalidStart("garbage".to_string())
            }
        );

        let err = get_working_days_in_range("2024-07-01", "2024-07-32", &config).expect_err("bad end");
        assert_eq!(
            err,
            CalendarError::InvalidRange {
                reason: RangeViolation::InvalidEnd("2024-07-32".to_string())
            }
        );
    }

    #[test]
    fn overlap_clamps_to_the_range() {
        let sprint = DateRange::new(day(2024, 7, 1), day(2024, 7, 12)).expect("range");

        let clamped = sprint.overlap(day(2024, 6, 20), day(2024, 7, 3)).expect("overlap");
        assert_eq!((clamped.start(), clamped.end()), (day(2024, 7, 1), day(2024, 7, 3)));

        assert!(sprint.overlap(day(2024, 7, 13), day(2024, 7, 20)).is_none());
        assert!(sprint.overlap(day(2024, 7, 10), day(2024, 7, 2)).is_none());
    }
}
