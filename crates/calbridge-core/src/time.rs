//! Time types for calendar events.
//!
//! [`EventTime`] is the parsed form of an event start/end (a specific
//! instant or an all-day date). [`TimeWindow`] is a query range; the
//! `local_*` constructors compute the "today" and "this month" windows from
//! a wall-clock reading in any timezone.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Represents the time of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Parses either an RFC3339 instant or a bare `YYYY-MM-DD` date.
    pub fn parse(value: &str) -> Option<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(Self::DateTime(dt.with_timezone(&Utc)));
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(Self::AllDay)
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Converts to a UTC datetime for comparison purposes.
    ///
    /// For all-day events, returns midnight UTC on that date.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// A closed query window `[start, end]` stored in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (inclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The window from `start` to `end`, or `None` if `end` precedes `start`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The local calendar day containing `now`: 00:00:00 to 23:59:59 in
    /// `now`'s timezone.
    pub fn local_day<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let today = now.date_naive();
        Self::local_dates(&now.timezone(), today, today)
    }

    /// The local calendar month containing `now`: the first day at 00:00:00
    /// to the last day at 23:59:59 in `now`'s timezone.
    pub fn local_month<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let today = now.date_naive();
        let first = today - Duration::days(i64::from(today.day0()));
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX);
        Self::local_dates(&now.timezone(), first, last)
    }

    fn local_dates<Tz: TimeZone>(tz: &Tz, first: NaiveDate, last: NaiveDate) -> Self {
        let start = resolve_local(tz, first.and_time(NaiveTime::MIN));
        let end = resolve_local(tz, last.and_time(end_of_day()));
        Self { start, end }
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::MIN + Duration::seconds(24 * 60 * 60 - 1)
}

/// Maps a wall-clock reading to an instant.
///
/// Ambiguous readings (clocks turned back) take the earlier instant; readings
/// inside a gap (clocks turned forward) move to the first valid minute after
/// the gap.
fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    let mut candidate = local;
    // DST gaps are at most a few hours wide
    for _ in 0..=(4 * 60) {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                return dt.with_timezone(&Utc);
            }
            LocalResult::None => candidate += Duration::minutes(1),
        }
    }
    tz.from_utc_datetime(&local).with_timezone(&Utc)
}
