//! RRULE expansion for recurring feed events.

use agenda_core::EventTime;
use agenda_core::normalize::resolve_event_time;
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use rrule::RRuleSet;

use super::parse::IcsEvent;

/// Upper bound on occurrences produced per expansion.
const MAX_OCCURRENCES: u16 = 365;

/// Build an iCalendar-format recurrence set for the rrule crate parser.
///
/// The rrule crate needs datetimes, so all-day dates become midnight UTC and
/// floating times are treated as UTC. Occurrences are converted back with
/// [`occurrence_time`], which undoes both.
fn build_rrule_set(start: &EventTime, rrule: &str, exdates: &[EventTime]) -> String {
    let mut lines = vec![rrule_line("DTSTART", start), format!("RRULE:{rrule}")];
    lines.extend(exdates.iter().map(|exdate| rrule_line("EXDATE", exdate)));
    lines.join("\n")
}

fn rrule_line(name: &str, time: &EventTime) -> String {
    match time {
        EventTime::Date(d) => format!("{name}:{}T000000Z", d.format("%Y%m%d")),
        EventTime::DateTimeUtc(dt) => format!("{name}:{}", dt.format("%Y%m%dT%H%M%SZ")),
        EventTime::DateTimeFloating(dt) => format!("{name}:{}Z", dt.format("%Y%m%dT%H%M%S")),
        EventTime::DateTimeZoned { datetime, tzid } => {
            format!("{name};TZID={tzid}:{}", datetime.format("%Y%m%dT%H%M%S"))
        }
    }
}

/// Convert an rrule occurrence back to the master's EventTime variant.
fn occurrence_time(dt: &DateTime<rrule::Tz>, master_start: &EventTime) -> EventTime {
    match master_start {
        EventTime::Date(_) => EventTime::Date(dt.date_naive()),
        EventTime::DateTimeUtc(_) => EventTime::DateTimeUtc(dt.with_timezone(&Utc)),
        EventTime::DateTimeFloating(_) => EventTime::DateTimeFloating(dt.naive_utc()),
        EventTime::DateTimeZoned { tzid, .. } => EventTime::DateTimeZoned {
            datetime: dt.naive_local(),
            tzid: tzid.clone(),
        },
    }
}

fn naive(time: &EventTime) -> NaiveDateTime {
    match time {
        EventTime::Date(d) => d.and_time(NaiveTime::MIN),
        EventTime::DateTimeUtc(dt) => dt.naive_utc(),
        EventTime::DateTimeFloating(dt) => *dt,
        EventTime::DateTimeZoned { datetime, .. } => *datetime,
    }
}

/// Length of the master event, used for every occurrence.
fn master_duration(master: &IcsEvent) -> Duration {
    match (&master.start, &master.end) {
        (EventTime::Date(start), EventTime::Date(end)) => Duration::days((*end - *start).num_days()),
        (EventTime::DateTimeFloating(_), EventTime::DateTimeFloating(_)) => {
            naive(&master.end) - naive(&master.start)
        }
        _ => match (resolve_event_time(&master.start), resolve_event_time(&master.end)) {
            (Ok(start), Ok(end)) => end - start,
            _ => naive(&master.end) - naive(&master.start),
        },
    }
}

fn shift(time: &EventTime, by: Duration) -> EventTime {
    match time {
        EventTime::Date(d) => EventTime::Date(*d + Duration::days(by.num_days())),
        EventTime::DateTimeUtc(dt) => EventTime::DateTimeUtc(*dt + by),
        EventTime::DateTimeFloating(dt) => EventTime::DateTimeFloating(*dt + by),
        EventTime::DateTimeZoned { datetime, tzid } => EventTime::DateTimeZoned {
            datetime: *datetime + by,
            tzid: tzid.clone(),
        },
    }
}

/// (start, end) of every occurrence of `master` between `from` and `to`,
/// excluding its EXDATEs. Instance overrides are handled by the caller.
pub fn expand(
    master: &IcsEvent,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<(EventTime, EventTime)>, String> {
    let Some(rrule) = &master.rrule else {
        return Ok(Vec::new());
    };

    let rrule_set: RRuleSet = build_rrule_set(&master.start, rrule, &master.exdates)
        .parse()
        .map_err(|e| format!("Failed to parse RRULE for event '{}': {}", master.uid, e))?;

    let tz: rrule::Tz = Utc.into();
    let result = rrule_set
        .after(from.with_timezone(&tz))
        .before(to.with_timezone(&tz))
        .all(MAX_OCCURRENCES);

    let duration = master_duration(master);

    Ok(result
        .dates
        .iter()
        .map(|occurrence| {
            let start = occurrence_time(occurrence, &master.start);
            let end = shift(&start, duration);
            (start, end)
        })
        .collect())
}
