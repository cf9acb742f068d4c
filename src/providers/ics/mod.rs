//! ICS feed client.
//!
//! A feed is downloaded and parsed at most once per client, however many
//! days are asked of it; a failed download is remembered the same way, so
//! every day of a broken feed reports the same error.

pub mod parse;
pub mod recurrence;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use agenda_core::client::FeedClient;
use agenda_core::normalize::resolve_event_time;
use agenda_core::source::Locator;
use agenda_core::{CalendarSource, EventTime, FeedEvent, FetchError, SourceId};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};
use reqwest::StatusCode;
use tokio::sync::OnceCell;
use url::Url;

use parse::{IcsEvent, parse_calendar};

type ParsedFeed = Result<Arc<Vec<IcsEvent>>, FetchError>;

#[derive(Default)]
pub struct IcsFeedClient {
    http: reqwest::Client,
    feeds: Mutex<HashMap<String, Arc<OnceCell<ParsedFeed>>>>,
}

impl IcsFeedClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn feed(&self, url: &str) -> ParsedFeed {
        let cell = self
            .feeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.to_string())
            .or_default()
            .clone();

        cell.get_or_init(|| self.download(url)).await.clone()
    }

    async fn download(&self, url: &str) -> ParsedFeed {
        let location = feed_url(url)?;
        tracing::debug!(url = %location, "downloading feed");

        let response = self
            .http
            .get(location)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Transport(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let events = parse_calendar(&body).map_err(FetchError::Parse)?;
        tracing::debug!(url, events = events.len(), "feed parsed");
        Ok(Arc::new(events))
    }
}

#[async_trait]
impl FeedClient for IcsFeedClient {
    async fn events_on(
        &self,
        feed: &CalendarSource,
        date: NaiveDate,
    ) -> Result<Vec<FeedEvent>, FetchError> {
        let Locator::Feed(url) = &feed.locator else {
            return Err(FetchError::Transport(format!("{} is not a feed", feed.id)));
        };

        let events = self.feed(url).await?;
        Ok(events_on(&events, date, &feed.id))
    }
}

/// `webcal://` is a plain HTTPS URL under another name.
pub fn feed_url(url: &str) -> Result<Url, FetchError> {
    let rewritten = match url.split_once("://") {
        Some((scheme, rest))
            if scheme.eq_ignore_ascii_case("webcal") || scheme.eq_ignore_ascii_case("webcals") =>
        {
            format!("https://{rest}")
        }
        _ => url.to_string(),
    };

    Url::parse(&rewritten).map_err(|e| FetchError::Transport(format!("invalid feed URL {url}: {e}")))
}

/// Local calendar day an event starts on.
fn start_day(time: &EventTime) -> NaiveDate {
    match resolve_event_time(time) {
        Ok(local) => local.date_naive(),
        Err(_) => match time {
            EventTime::Date(d) => *d,
            EventTime::DateTimeUtc(dt) => dt.date_naive(),
            EventTime::DateTimeFloating(dt) => dt.date(),
            EventTime::DateTimeZoned { datetime, .. } => datetime.date(),
        },
    }
}

/// Bounds for expanding recurring events on `date`, padded by a day on
/// each side so floating and zoned series are never cut short. The exact
/// day is checked afterwards.
fn expansion_range(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = resolve_event_time(&EventTime::Date(date))
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|_| date.and_time(NaiveTime::MIN).and_utc());
    (midnight - Duration::days(1), midnight + Duration::days(2))
}

/// Events of a parsed feed that start on `date`.
///
/// Recurring events are expanded; an occurrence replaced by a RECURRENCE-ID
/// instance is shown only through that instance. Cancelled events and
/// cancelled instances are left out.
pub fn events_on(events: &[IcsEvent], date: NaiveDate, feed: &SourceId) -> Vec<FeedEvent> {
    let overridden: HashSet<(&str, DateTime<Local>)> = events
        .iter()
        .filter_map(|event| {
            let recurrence_id = event.recurrence_id.as_ref()?;
            Some((event.uid.as_str(), resolve_event_time(recurrence_id).ok()?))
        })
        .collect();

    let (from, to) = expansion_range(date);
    let mut day = Vec::new();

    for event in events.iter().filter(|e| !e.cancelled) {
        if event.rrule.is_none() || event.recurrence_id.is_some() {
            if start_day(&event.start) == date {
                day.push(feed_event(event, event.start.clone(), event.end.clone(), feed));
            }
            continue;
        }

        let occurrences = match recurrence::expand(event, from, to) {
            Ok(occurrences) => occurrences,
            Err(e) => {
                tracing::warn!(feed = %feed, uid = %event.uid, error = %e, "skipping recurring event");
                continue;
            }
        };

        for (start, end) in occurrences {
            if start_day(&start) != date {
                continue;
            }
            let replaced = resolve_event_time(&start)
                .is_ok_and(|instant| overridden.contains(&(event.uid.as_str(), instant)));
            if !replaced {
                day.push(feed_event(event, start, end, feed));
            }
        }
    }

    day
}

fn feed_event(event: &IcsEvent, start: EventTime, end: EventTime, feed: &SourceId) -> FeedEvent {
    FeedEvent {
        summary: event.summary.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        start,
        end,
        feed: feed.clone(),
    }
}
