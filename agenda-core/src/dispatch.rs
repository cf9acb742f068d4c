//! Fetch dispatcher: one concurrent task per source.
//!
//! Tasks are spawned eagerly and never awaited by the dispatcher. Each task
//! lists its source's events, normalizes them and pushes them onto the shared
//! channel. A failed listing ends that task only; a record that does not
//! normalize is dropped on its own. Every network call and every send is
//! raced against the run's [`CancelToken`], and sends to a collector that has
//! gone away fail immediately, so late tasks wind down instead of blocking.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::cancel::CancelToken;
use crate::client::{FeedClient, ServiceClient};
use crate::date_range::DateRange;
use crate::diagnostics::{Outcome, SourceReport};
use crate::error::FetchError;
use crate::event::NormalizedEvent;
use crate::normalize::{normalize_feed_event, normalize_service_event};
use crate::palette::AttributeMap;
use crate::source::{CalendarSource, Locator, SourceId, SourceRegistry};

/// Where an event came from, used as a deterministic tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Origin {
    /// Registration index of the source
    pub source: usize,
    /// Day of the window (feeds only, 0 for service calendars)
    pub day: usize,
    /// Position in the listing the event came from
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub event: NormalizedEvent,
    pub origin: Origin,
}

/// What fetch tasks send to the collector.
#[derive(Debug)]
pub enum Delivery {
    Event(Arrival),
    Finished(SourceReport),
}

/// What to do with an event whose end lies before its start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvertedSpanPolicy {
    /// Pass the event through unchanged
    #[default]
    Keep,
    /// Discard the event
    Drop,
    /// Move the end up to the start
    Clamp,
}

impl InvertedSpanPolicy {
    pub fn apply(self, mut event: NormalizedEvent) -> Option<NormalizedEvent> {
        if !event.is_inverted() {
            return Some(event);
        }
        match self {
            InvertedSpanPolicy::Keep => Some(event),
            InvertedSpanPolicy::Drop => None,
            InvertedSpanPolicy::Clamp => {
                event.end = event.start;
                Some(event)
            }
        }
    }
}

pub struct Dispatcher {
    pub service: Option<Arc<dyn ServiceClient>>,
    pub feeds: Option<Arc<dyn FeedClient>>,
    pub registry: Arc<SourceRegistry>,
    pub attributes: Arc<AttributeMap>,
    pub window: DateRange,
    pub inverted_spans: InvertedSpanPolicy,
}

impl Dispatcher {
    /// Spawn one task per registered source. Returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, tx: mpsc::Sender<Delivery>, cancel: CancelToken) {
        for (index, source) in self.registry.sources().iter().enumerate() {
            let sink = Sink {
                tx: tx.clone(),
                cancel: cancel.clone(),
                source: source.id.clone(),
                source_index: index,
                inverted_spans: self.inverted_spans,
                delivered: 0,
                dropped: 0,
            };

            match &source.locator {
                Locator::Service(calendar_id) => {
                    tracing::debug!(source = %source.id, "dispatching service calendar");
                    tokio::spawn(fetch_service_calendar(
                        self.service.clone(),
                        source.clone(),
                        calendar_id.clone(),
                        self.window,
                        self.attributes.clone(),
                        sink,
                    ));
                }
                Locator::Feed(_) => {
                    tracing::debug!(source = %source.id, "dispatching feed");
                    tokio::spawn(fetch_feed(
                        self.feeds.clone(),
                        source.clone(),
                        self.window,
                        self.attributes.clone(),
                        sink,
                    ));
                }
            }
        }
    }
}

async fn fetch_service_calendar(
    client: Option<Arc<dyn ServiceClient>>,
    source: CalendarSource,
    calendar_id: String,
    window: DateRange,
    attributes: Arc<AttributeMap>,
    mut sink: Sink,
) {
    let Some(client) = client else {
        sink.finish(Outcome::Failed("no calendar service configured".into()))
            .await;
        return;
    };

    let listing = tokio::select! {
        biased;
        _ = sink.cancel.cancelled() => return,
        listing = client.list_events(&calendar_id, &window) => listing,
    };

    let events = match listing {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(source = %source.id, error = %e, "calendar fetch failed");
            sink.finish(Outcome::Failed(e.to_string())).await;
            return;
        }
    };

    for (position, raw) in events.iter().enumerate() {
        match normalize_service_event(raw, &source, &attributes) {
            Ok(event) => {
                if !sink.deliver(event, 0, position).await {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(source = %source.id, event = %raw.id, error = %e, "dropping event");
                sink.dropped += 1;
            }
        }
    }

    sink.finish(Outcome::Completed).await;
}

/// Fans out one sub-task per day of the window, then reports for the feed
/// as a whole.
async fn fetch_feed(
    client: Option<Arc<dyn FeedClient>>,
    source: CalendarSource,
    window: DateRange,
    attributes: Arc<AttributeMap>,
    mut sink: Sink,
) {
    let Some(client) = client else {
        sink.finish(Outcome::Failed("no feed client configured".into()))
            .await;
        return;
    };

    let mut days = JoinSet::new();
    for (day, date) in window.days().into_iter().enumerate() {
        let client = client.clone();
        let source = source.clone();
        let attributes = attributes.clone();
        let mut day_sink = sink.fork();

        days.spawn(async move {
            let listing = tokio::select! {
                biased;
                _ = day_sink.cancel.cancelled() => return (day_sink, Ok(())),
                listing = client.events_on(&source, date) => listing,
            };

            let events = match listing {
                Ok(events) => events,
                Err(e) => return (day_sink, Err(e)),
            };

            for (position, raw) in events.iter().enumerate() {
                match normalize_feed_event(raw, &source, &attributes) {
                    Ok(event) => {
                        if !day_sink.deliver(event, day, position).await {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(source = %source.id, %date, error = %e, "dropping event");
                        day_sink.dropped += 1;
                    }
                }
            }
            (day_sink, Ok(()))
        });
    }

    let mut failure: Option<FetchError> = None;
    while let Some(joined) = days.join_next().await {
        match joined {
            Ok((day_sink, result)) => {
                sink.delivered += day_sink.delivered;
                sink.dropped += day_sink.dropped;
                if let Err(e) = result {
                    tracing::warn!(source = %source.id, error = %e, "feed fetch failed");
                    failure.get_or_insert(e);
                }
            }
            Err(e) => {
                failure.get_or_insert(FetchError::Transport(format!("day task aborted: {e}")));
            }
        }
    }

    let outcome = match failure {
        Some(e) => Outcome::Failed(e.to_string()),
        None => Outcome::Completed,
    };
    sink.finish(outcome).await;
}

/// A task's handle on the shared channel, counting what it sends.
struct Sink {
    tx: mpsc::Sender<Delivery>,
    cancel: CancelToken,
    source: SourceId,
    source_index: usize,
    inverted_spans: InvertedSpanPolicy,
    delivered: usize,
    dropped: usize,
}

impl Sink {
    fn fork(&self) -> Sink {
        Sink {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
            source: self.source.clone(),
            source_index: self.source_index,
            inverted_spans: self.inverted_spans,
            delivered: 0,
            dropped: 0,
        }
    }

    /// Push one event. Returns false once the collector has stopped listening.
    async fn deliver(&mut self, event: NormalizedEvent, day: usize, position: usize) -> bool {
        let Some(event) = self.inverted_spans.apply(event) else {
            self.dropped += 1;
            return true;
        };

        let arrival = Arrival {
            event,
            origin: Origin {
                source: self.source_index,
                day,
                position,
            },
        };

        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(Delivery::Event(arrival)) => sent.is_ok(),
        };
        if sent {
            self.delivered += 1;
        }
        sent
    }

    async fn finish(self, outcome: Outcome) {
        let report = SourceReport {
            source: self.source,
            outcome,
            delivered: self.delivered,
            dropped: self.dropped,
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            _ = self.tx.send(Delivery::Finished(report)) => {}
        }
    }
}
