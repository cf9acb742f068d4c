//! Conversion of source-native records into [`NormalizedEvent`].
//!
//! Start and end are resolved independently: a date-only value becomes local
//! midnight of that day, a date-time is read in its own offset and converted
//! to local time. A record whose start is date-only while its end is timed is
//! accepted as-is.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::error::{NormalizeError, TemporalField};
use crate::event::{EventMarker, EventTime, FeedEvent, NormalizedEvent, ServiceEvent};
use crate::palette::{AttributeMap, DisplayAttribute, PALETTE};
use crate::source::{CalendarSource, SourceId};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn normalize_service_event(
    event: &ServiceEvent,
    source: &CalendarSource,
    attributes: &AttributeMap,
) -> Result<NormalizedEvent, NormalizeError> {
    let start = resolve_marker(&event.start, TemporalField::Start)?;
    let end = resolve_marker(&event.end, TemporalField::End)?;

    Ok(NormalizedEvent {
        summary: event.summary.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        start,
        end,
        source: source.id.clone(),
        attribute: attribute_for(&source.id, attributes),
    })
}

/// The event is credited to `source`, the feed it was requested from,
/// whatever [`FeedEvent::feed`] says.
pub fn normalize_feed_event(
    event: &FeedEvent,
    source: &CalendarSource,
    attributes: &AttributeMap,
) -> Result<NormalizedEvent, NormalizeError> {
    let start = resolve_event_time(&event.start)
        .map_err(|reason| NormalizeError::malformed(TemporalField::Start, reason))?;
    let end = resolve_event_time(&event.end)
        .map_err(|reason| NormalizeError::malformed(TemporalField::End, reason))?;

    Ok(NormalizedEvent {
        summary: event.summary.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        start,
        end,
        source: source.id.clone(),
        attribute: attribute_for(&source.id, attributes),
    })
}

/// Sources are registered before they are fetched, so every source has an
/// attribute by the time its events are normalized.
fn attribute_for(source: &SourceId, attributes: &AttributeMap) -> DisplayAttribute {
    attributes.get(source).unwrap_or(PALETTE[0])
}

fn resolve_marker(
    marker: &EventMarker,
    field: TemporalField,
) -> Result<DateTime<Local>, NormalizeError> {
    if let Some(date) = marker.date.as_deref().filter(|d| !d.is_empty()) {
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|e| NormalizeError::malformed(field, format!("'{date}': {e}")))?;
        return local_midnight(date).map_err(|reason| NormalizeError::malformed(field, reason));
    }

    match marker.date_time.as_deref().filter(|d| !d.is_empty()) {
        Some(date_time) => DateTime::parse_from_rfc3339(date_time)
            .map(|dt| dt.with_timezone(&Local))
            .map_err(|e| NormalizeError::malformed(field, format!("'{date_time}': {e}"))),
        None => Err(NormalizeError::malformed(field, "neither date nor dateTime present")),
    }
}

/// Resolve an iCalendar time to a local instant.
///
/// Floating times are read as local wall-clock time. A TZID that is not in
/// the IANA database is treated like a floating time.
pub fn resolve_event_time(time: &EventTime) -> Result<DateTime<Local>, String> {
    match time {
        EventTime::Date(date) => local_midnight(*date),
        EventTime::DateTimeUtc(dt) => Ok(dt.with_timezone(&Local)),
        EventTime::DateTimeFloating(naive) => local_wall_time(naive),
        EventTime::DateTimeZoned { datetime, tzid } => match tzid.parse::<chrono_tz::Tz>() {
            Ok(tz) => tz
                .from_local_datetime(datetime)
                .earliest()
                .map(|dt| dt.with_timezone(&Local))
                .ok_or_else(|| format!("{datetime} does not exist in {tzid}")),
            Err(_) => {
                tracing::debug!(tzid = %tzid, "unknown TZID, reading as local time");
                local_wall_time(datetime)
            }
        },
    }
}

fn local_midnight(date: NaiveDate) -> Result<DateTime<Local>, String> {
    local_wall_time(&date.and_time(NaiveTime::MIN))
}

fn local_wall_time(naive: &NaiveDateTime) -> Result<DateTime<Local>, String> {
    Local
        .from_local_datetime(naive)
        .earliest()
        .ok_or_else(|| format!("{naive} does not exist in the local timezone"))
}
