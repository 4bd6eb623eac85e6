//! Ingestion time window
//!
//! Converts `(days, hours, end)` lookback arguments or explicit calendar
//! dates into a `[start, end]` pair. All arithmetic is in UTC; partition
//! dates come from message timestamps, never from the window itself.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::core::constants::DEFAULT_WINDOW_DAYS;
use crate::data::error::DataError;

/// A half-open-free, inclusive-start/inclusive-end UTC interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Lookback window ending at `end` (now when absent). Zero `days` and
    /// `hours` fall back to the default lookback.
    pub fn from_lookback(days: i64, hours: i64, end: Option<DateTime<Utc>>) -> Self {
        let end = end.unwrap_or_else(Utc::now);
        let mut span = Duration::days(days) + Duration::hours(hours);
        if span.is_zero() {
            span = Duration::days(DEFAULT_WINDOW_DAYS);
        }
        Self {
            start: end - span,
            end,
        }
    }

    /// The whole of one UTC calendar day
    pub fn for_date(date: NaiveDate) -> Self {
        let start = date.and_hms_opt(0, 0, 0).expect("midnight always exists");
        Self {
            start: start.and_utc(),
            end: (start + Duration::days(1)).and_utc(),
        }
    }

    /// The whole of an inclusive calendar-day range
    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Result<Self, DataError> {
        if start > end {
            return Err(DataError::Config(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self {
            start: TimeWindow::for_date(start).start,
            end: TimeWindow::for_date(end).end,
        })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// First calendar day touched by the window
    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Last calendar day touched by the window
    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}
