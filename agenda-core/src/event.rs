//! Event representations.
//!
//! Sources hand the engine their own records ([`ServiceEvent`], [`FeedEvent`]);
//! the normalizer turns both into [`NormalizedEvent`], the only type the
//! timeline and renderer work with.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::palette::DisplayAttribute;
use crate::source::SourceId;

/// A source-independent event, resolved to local time.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub summary: String,
    pub description: String,
    /// Empty when the source has no location
    pub location: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub source: SourceId,
    pub attribute: DisplayAttribute,
}

impl NormalizedEvent {
    /// True when the source reported an end before the start.
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }
}

/// An event as listed by the calendar service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start: EventMarker,
    #[serde(default)]
    pub end: EventMarker,
}

/// Start or end of a service event, exactly as sent on the wire.
///
/// All-day events carry `date` (`2024-06-01`), timed events carry
/// `dateTime` with an offset (`2024-06-01T09:30:00-07:00`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventMarker {
    pub fn date(date: &str) -> Self {
        EventMarker {
            date: Some(date.to_string()),
            ..Default::default()
        }
    }

    pub fn date_time(date_time: &str) -> Self {
        EventMarker {
            date_time: Some(date_time.to_string()),
            ..Default::default()
        }
    }
}

/// A calendar in the service's calendar list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCalendar {
    pub id: String,
    pub summary: String,
}

/// An event yielded by a feed for one concrete date.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventTime,
    pub end: EventTime,
    /// The feed this event was read from
    pub feed: SourceId,
}

/// A point in time as iCalendar expresses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}
