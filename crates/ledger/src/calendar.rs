//! Inclusive calendar-day ranges.

use core::iter::FusedIterator;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use palletflow_core::{DomainError, DomainResult};

/// Inclusive `[start, end]` range of calendar days, `start <= end`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range, both endpoints included.
    pub fn day_count(&self) -> u64 {
        (self.end - self.start).num_days() as u64 + 1
    }

    /// Fresh iterator over every day of the range; call again to restart.
    pub fn days(&self) -> DaySequence {
        DaySequence {
            next: Some(self.start),
            end: self.end,
        }
    }
}

/// Ascending sequence of calendar days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySequence {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DaySequence {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let day = self.next.filter(|d| *d <= self.end)?;
        self.next = day.succ_opt();
        Some(day)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            Some(d) if d <= self.end => (self.end - d).num_days() as usize + 1,
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DaySequence {}

impl FusedIterator for DaySequence {}

/// Midnight (UTC) opening `day`.
pub fn start_of_day_utc(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// First instant (UTC) after `day` ends; stock "held on" `day` is whatever was
/// recorded strictly before this instant.
pub fn end_of_day_utc(day: NaiveDate) -> DateTime<Utc> {
    match day.succ_opt() {
        Some(next) => start_of_day_utc(next),
        None => DateTime::<Utc>::MAX_UTC,
    }
}
