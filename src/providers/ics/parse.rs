//! Feed parsing using the icalendar crate's parser.

use agenda_core::EventTime;
use icalendar::{
    DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

/// One VEVENT of a feed, with just what the timeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct IcsEvent {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventTime,
    pub end: EventTime,
    pub cancelled: bool,
    pub rrule: Option<String>,
    pub exdates: Vec<EventTime>,
    /// Set on instances that override one occurrence of a recurring event
    pub recurrence_id: Option<EventTime>,
}

/// Parse every VEVENT of a feed. VEVENTs without a readable DTSTART are
/// skipped; everything else in the feed is kept.
pub fn parse_calendar(content: &str) -> Result<Vec<IcsEvent>, String> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded)?;

    let events: Vec<IcsEvent> = calendar
        .components
        .iter()
        .flat_map(vevents)
        .filter_map(|vevent| {
            let event = parse_vevent(vevent);
            if event.is_none() {
                tracing::debug!(
                    uid = ?vevent.find_prop("UID").map(|p| p.val.to_string()),
                    "skipping VEVENT without a usable DTSTART"
                );
            }
            event
        })
        .collect();

    Ok(events)
}

/// VEVENTs may be top-level or nested inside VCALENDAR.
fn vevents<'a>(component: &'a Component<'a>) -> Vec<&'a Component<'a>> {
    if component.name == "VEVENT" {
        vec![component]
    } else {
        component
            .components
            .iter()
            .filter(|c| c.name == "VEVENT")
            .collect()
    }
}

fn parse_vevent(vevent: &Component) -> Option<IcsEvent> {
    let start = to_event_time(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?);

    // Without DTEND an all-day event lasts one day and a timed event is instantaneous
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time)
        .unwrap_or_else(|| match &start {
            EventTime::Date(d) => EventTime::Date(*d + chrono::Duration::days(1)),
            other => other.clone(),
        });

    let text = |name: &str| {
        vevent
            .find_prop(name)
            .map(|p| unescape(p.val.as_ref()))
            .unwrap_or_default()
    };

    let exdates = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_exdate_property)
        .collect();

    Some(IcsEvent {
        uid: text("UID"),
        summary: text("SUMMARY"),
        description: text("DESCRIPTION"),
        location: text("LOCATION"),
        start,
        end,
        cancelled: vevent
            .find_prop("STATUS")
            .is_some_and(|p| p.val.as_ref() == "CANCELLED"),
        rrule: vevent.find_prop("RRULE").map(|p| p.val.to_string()),
        exdates,
        recurrence_id: vevent
            .find_prop("RECURRENCE-ID")
            .and_then(|p| DatePerhapsTime::try_from(p).ok())
            .map(to_event_time),
    })
}

fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// EXDATE values, honouring TZID and VALUE=DATE, possibly comma-separated.
fn parse_exdate_property(prop: &Property) -> Vec<EventTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if is_date {
                return chrono::NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(EventTime::Date);
            }
            let utc = s.ends_with('Z');
            let naive =
                chrono::NaiveDateTime::parse_from_str(s.trim_end_matches('Z'), "%Y%m%dT%H%M%S")
                    .ok()?;
            Some(match (&tzid, utc) {
                (Some(tz), _) => EventTime::DateTimeZoned {
                    datetime: naive,
                    tzid: tz.clone(),
                },
                (None, true) => EventTime::DateTimeUtc(naive.and_utc()),
                (None, false) => EventTime::DateTimeFloating(naive),
            })
        })
        .collect()
}

/// Undo RFC 5545 TEXT escaping.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
