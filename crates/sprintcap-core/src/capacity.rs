//! Sprint capacity impact of time off.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::calendar::{DateRange, WorkCalendarConfig, get_working_days_in_range};
use crate::error::Result;

/// Weight charged for one working day of a half-day entry.
pub const HALF_DAY_WEIGHT: f64 = 0.5;

/// One continuous span of time off for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOffEntry {
    pub user_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_all_day")]
    pub all_day: bool,
}

fn default_all_day() -> bool {
    true
}

impl TimeOffEntry {
    pub fn all_day(user_id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            start_date,
            end_date,
            all_day: true,
        }
    }

    pub fn half_day(user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            start_date: date,
            end_date: date,
            all_day: false,
        }
    }

    /// Days charged per impacted working day. Multi-day half-day entries are
    /// charged on every working day they span.
    pub fn weight(&self) -> f64 {
        if self.all_day { 1.0 } else { HALF_DAY_WEIGHT }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorkingDayResult {
    pub total_working_days: usize,
    pub impacted_days: f64,
    pub available_capacity_percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityReport {
    pub sprint: DateRangeView,
    pub result: WorkingDayResult,
    pub working_days: Vec<NaiveDate>,
    pub impact_by_user: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRangeView {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl From<DateRange> for DateRangeView {
    fn from(range: DateRange) -> Self {
        Self {
            start: range.start(),
            end: range.end(),
        }
    }
}

/// Deduplicated capacity impact of `entries` on `sprint`.
pub fn calculate_capacity_impact<'a, I>(
    sprint: &DateRange,
    entries: I,
    config: &WorkCalendarConfig,
) -> Result<WorkingDayResult>
where
    I: IntoIterator<Item = &'a TimeOffEntry>,
{
    capacity_breakdown(sprint, entries, config).map(|report| report.result)
}

/// Same computation as [`calculate_capacity_impact`], keeping the per-user
/// totals and the sprint's working days.
#[tracing::instrument(skip_all, fields(sprint = %sprint))]
pub fn capacity_breakdown<'a, I>(
    sprint: &DateRange,
    entries: I,
    config: &WorkCalendarConfig,
) -> Result<CapacityReport>
where
    I: IntoIterator<Item = &'a TimeOffEntry>,
{
    let working_days = get_working_days_in_range(&sprint.start(), &sprint.end(), config)?;
    let total_working_days = working_days.len();

    let mut seen: HashSet<(&str, NaiveDate)> = HashSet::new();
    let mut impacted_days = 0.0;
    let mut impact_by_user: BTreeMap<String, f64> = BTreeMap::new();

    for entry in entries {
        let Some(overlap) = sprint.overlap(entry.start_date, entry.end_date) else {
            trace!(
                user = %entry.user_id,
                start = %entry.start_date,
                end = %entry.end_date,
                "entry outside sprint; skipping"
            );
            continue;
        };

        let weight = entry.weight();
        for day in overlap.working_days(config) {
            if !seen.insert((entry.user_id.as_str(), day)) {
                trace!(user = %entry.user_id, %day, "day already charged");
                continue;
            }
            impacted_days += weight;
            *impact_by_user.entry(entry.user_id.clone()).or_insert(0.0) += weight;
        }
    }

    let result = WorkingDayResult {
        total_working_days,
        impacted_days,
        available_capacity_percentage: available_percentage(total_working_days, impacted_days),
    };
    debug!(
        total = result.total_working_days,
        impacted = result.impacted_days,
        available = result.available_capacity_percentage,
        "computed capacity impact"
    );

    Ok(CapacityReport {
        sprint: (*sprint).into(),
        result,
        working_days,
        impact_by_user,
    })
}

/// Percentage of `total` left after `impacted`, rounded half-up. An empty
/// sprint is fully available.
#[must_use]
pub fn available_percentage(total: usize, impacted: f64) -> i64 {
    if total == 0 {
        return 100;
    }
    // Impact is always a multiple of half a day, so work in half-days and
    // keep the tie-breaking exact.
    let half_days_total = 2 * total as i64;
    let half_days_impacted = (impacted * 2.0).round() as i64;
    let numerator = 2 * (half_days_total - half_days_impacted) * 100 + half_days_total;
    numerator.div_euclid(2 * half_days_total)
}
