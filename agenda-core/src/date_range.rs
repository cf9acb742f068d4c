//! The forward-looking window events are fetched for.

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, TimeDelta, TimeZone};

use crate::error::{AgendaError, AgendaResult};

pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Every day of the window spawns one sub-task per feed.
pub const MAX_WINDOW_DAYS: i64 = 366;

/// Half-open range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Local>,
    pub to: DateTime<Local>,
}

impl DateRange {
    /// From `now` to the same wall-clock time `days` calendar days later.
    pub fn upcoming(now: DateTime<Local>, days: i64) -> AgendaResult<Self> {
        if !(1..=MAX_WINDOW_DAYS).contains(&days) {
            return Err(AgendaError::Config(format!(
                "window must be between 1 and {MAX_WINDOW_DAYS} days, got {days}"
            )));
        }

        let to = window_end(&now, days).ok_or_else(|| {
            AgendaError::Config(format!("{days} days after {now} is out of range"))
        })?;

        Ok(DateRange { from: now, to })
    }

    /// `from` as RFC3339 with the local offset (e.g. `2024-06-01T09:00:00+02:00`)
    pub fn from_rfc3339(&self) -> String {
        self.from.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    /// `to` as RFC3339 with the local offset
    pub fn to_rfc3339(&self) -> String {
        self.to.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    /// Local calendar days from `from`'s date up to, not including, `to`'s date.
    pub fn days(&self) -> Vec<NaiveDate> {
        calendar_days(self.from.date_naive(), self.to.date_naive())
    }
}

/// Same wall-clock time `days` later in `now`'s zone. When that time falls
/// in a DST gap, exactly `days * 24` hours later instead.
fn window_end<Tz: TimeZone>(now: &DateTime<Tz>, days: i64) -> Option<DateTime<Tz>> {
    let delta = TimeDelta::try_days(days)?;
    let wall = now.naive_local().checked_add_signed(delta)?;

    match now.timezone().from_local_datetime(&wall).earliest() {
        Some(end) => Some(end),
        None => now.clone().checked_add_signed(delta),
    }
}

fn calendar_days(first: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    first.iter_days().take_while(|day| *day < end).collect()
}
