//! Calendar-day partitioning of tick streams.
//!
//! Timestamps are already exchange-local, so a day is simply the naive date of
//! the nanosecond timestamp.

use chrono::{DateTime, NaiveDate};
use infobar_core::{Tick, TimestampNs};

/// Calendar day of an exchange-local nanosecond timestamp.
#[inline]
pub fn day_of(ts_ns: TimestampNs) -> NaiveDate {
    DateTime::from_timestamp_nanos(ts_ns).date_naive()
}

/// Split a time-sorted tick slice into contiguous per-day runs.
pub fn split_by_day(ticks: &[Tick]) -> Vec<(NaiveDate, &[Tick])> {
    let mut days = Vec::new();
    let mut start = 0;

    while start < ticks.len() {
        let day = day_of(ticks[start].ts_ns);
        let len = ticks[start..]
            .iter()
            .take_while(|t| day_of(t.ts_ns) == day)
            .count();
        days.push((day, &ticks[start..start + len]));
        start += len;
    }

    days
}
