//! Seams to the fetching collaborators.
//!
//! The engine never talks to the network itself. The CLI plugs in a Google
//! Calendar client and an ICS feed client; tests plug in in-memory fakes.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::date_range::DateRange;
use crate::error::FetchError;
use crate::event::{FeedEvent, ServiceCalendar, ServiceEvent};
use crate::source::CalendarSource;

/// An authenticated handle to the calendar service.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Calendars visible to the account, in the service's listing order.
    async fn list_calendars(&self) -> Result<Vec<ServiceCalendar>, FetchError>;

    /// Events of one calendar overlapping `range`. Overlap rules are the
    /// service's own.
    async fn list_events(
        &self,
        calendar_id: &str,
        range: &DateRange,
    ) -> Result<Vec<ServiceEvent>, FetchError>;
}

/// Fetches and parses iCalendar feeds.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Events of `feed` that fall on `date` (local calendar day).
    async fn events_on(
        &self,
        feed: &CalendarSource,
        date: NaiveDate,
    ) -> Result<Vec<FeedEvent>, FetchError>;
}
