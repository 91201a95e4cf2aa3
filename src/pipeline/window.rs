//! Calendar-month partitioning of a time span.

use chrono::{DateTime, Months, NaiveDate, Utc};

use crate::error::{CompositeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Half-open interval `[start, end)`.
pub struct TimeSpan {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeSpan {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(CompositeError::MalformedTimeSpan { start, end });
        }
        Ok(TimeSpan { start, end })
    }

    /// Span from midnight UTC of `start` to midnight UTC of `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        TimeSpan::new(midnight(start), midnight(end))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
}

/// Splits a span into consecutive one-month windows labelled `YYYY_MM`.
///
/// Window `k` starts `k` calendar months after the span start, so a span starting on the 31st
/// does not drift when it crosses short months. The last window ends at the span end.
pub fn partition(span: &TimeSpan) -> Vec<MonthWindow> {
    let mut windows = Vec::new();

    for k in 0.. {
        let start = match span.start.checked_add_months(Months::new(k)) {
            Some(start) if start < span.end => start,
            _ => break,
        };
        let end = span
            .start
            .checked_add_months(Months::new(k + 1))
            .map_or(span.end, |next| next.min(span.end));

        windows.push(MonthWindow {
            start,
            end,
            label: start.format("%Y_%m").to_string(),
        });
    }

    windows
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

// -- Tests -------------------------------------------------------------------
