//! Error types raised by the working-day engine.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors reported by the calendar engine.
///
/// The engine never recovers from these locally: whatever the day
/// classifier raises travels unchanged through the range enumerator and the
/// capacity aggregator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("invalid date: {input:?} is not a calendar date")]
    InvalidDate { input: String },

    #[error("invalid date range: {reason}")]
    InvalidRange { reason: RangeViolation },
}

/// Which constraint a date range broke.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeViolation {
    #[error("start is not a valid date ({0:?})")]
    InvalidStart(String),

    #[error("end is not a valid date ({0:?})")]
    InvalidEnd(String),

    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

impl CalendarError {
    pub fn invalid_date(input: impl Into<String>) -> Self {
        Self::InvalidDate {
            input: input.into(),
        }
    }

    pub fn end_before_start(start: NaiveDate, end: NaiveDate) -> Self {
        Self::InvalidRange {
            reason: RangeViolation::EndBeforeStart { start, end },
        }
    }

    pub fn is_invalid_date(&self) -> bool {
        matches!(self, Self::InvalidDate { .. })
    }

    pub fn is_invalid_range(&self) -> bool {
        matches!(self, Self::InvalidRange { .. })
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, CalendarError>;
