//! Source discovery and the aggregation run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::cancel::cancel_pair;
use crate::client::{FeedClient, ServiceClient};
use crate::collect::{DEFAULT_COLLECT_TIMEOUT, collect};
use crate::config::AgendaConfig;
use crate::date_range::DateRange;
use crate::diagnostics::Diagnostics;
use crate::dispatch::{Dispatcher, InvertedSpanPolicy};
use crate::error::{AgendaError, AgendaResult};
use crate::feeds::FeedConfig;
use crate::palette::AttributeMap;
use crate::source::{CalendarSource, SourceId, SourceRegistry};
use crate::timeline::{TieBreak, Timeline};

/// Register the service's calendars (listing order, at most `max_calendars`)
/// followed by the configured feeds.
pub async fn discover_sources(
    service: Option<&dyn ServiceClient>,
    feeds: &[FeedConfig],
    max_calendars: usize,
) -> AgendaResult<SourceRegistry> {
    let mut registry = SourceRegistry::new();

    if let Some(service) = service {
        let calendars = service
            .list_calendars()
            .await
            .map_err(|e| AgendaError::CalendarList(e.to_string()))?;

        for calendar in calendars.iter().take(max_calendars) {
            registry.register(CalendarSource::service(&calendar.id, &calendar.summary));
        }
    }

    for feed in feeds {
        registry.register(CalendarSource::from(feed));
    }

    if registry.is_empty() {
        return Err(AgendaError::NoSources);
    }

    tracing::debug!(sources = registry.len(), "sources registered");
    Ok(registry)
}

/// Result of one aggregation run.
#[derive(Debug)]
pub struct Aggregation {
    pub timeline: Timeline,
    pub attributes: Arc<AttributeMap>,
    pub diagnostics: Diagnostics,
    /// True when every source finished before the deadline
    pub complete: bool,
}

pub struct Aggregator {
    service: Option<Arc<dyn ServiceClient>>,
    feeds: Option<Arc<dyn FeedClient>>,
    window: DateRange,
    timeout: Duration,
    channel_capacity: usize,
    tie_break: TieBreak,
    inverted_spans: InvertedSpanPolicy,
}

impl Aggregator {
    pub fn new(window: DateRange) -> Self {
        Aggregator {
            service: None,
            feeds: None,
            window,
            timeout: DEFAULT_COLLECT_TIMEOUT,
            channel_capacity: 256,
            tie_break: TieBreak::default(),
            inverted_spans: InvertedSpanPolicy::default(),
        }
    }

    pub fn from_config(config: &AgendaConfig, window: DateRange) -> Self {
        Aggregator::new(window)
            .timeout(config.collect_timeout())
            .channel_capacity(config.channel_capacity)
            .tie_break(config.tie_break())
            .inverted_spans(config.inverted_spans)
    }

    pub fn service(mut self, client: Arc<dyn ServiceClient>) -> Self {
        self.service = Some(client);
        self
    }

    pub fn feeds(mut self, client: Arc<dyn FeedClient>) -> Self {
        self.feeds = Some(client);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn inverted_spans(mut self, policy: InvertedSpanPolicy) -> Self {
        self.inverted_spans = policy;
        self
    }

    /// Fetch every source concurrently and merge what arrives before the
    /// deadline into one timeline.
    pub async fn run(&self, registry: Arc<SourceRegistry>) -> AgendaResult<Aggregation> {
        if registry.is_empty() {
            return Err(AgendaError::NoSources);
        }

        let attributes = Arc::new(AttributeMap::assign(&registry));
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let (canceller, token) = cancel_pair();

        Dispatcher {
            service: self.service.clone(),
            feeds: self.feeds.clone(),
            registry: registry.clone(),
            attributes: attributes.clone(),
            window: self.window,
            inverted_spans: self.inverted_spans,
        }
        .dispatch(tx, token);

        let collection = collect(rx, self.timeout, canceller).await;

        let mut delivered: HashMap<SourceId, usize> = HashMap::new();
        for arrival in &collection.arrivals {
            *delivered.entry(arrival.event.source.clone()).or_default() += 1;
        }
        let diagnostics = Diagnostics::assemble(&registry, collection.reports, &delivered);
        let timeline = Timeline::from_arrivals(collection.arrivals, self.tie_break);

        tracing::info!(
            events = timeline.len(),
            sources = registry.len(),
            failed = diagnostics.failed().count(),
            pending = diagnostics.pending().count(),
            "aggregation finished"
        );

        Ok(Aggregation {
            timeline,
            attributes,
            diagnostics,
            complete: collection.complete,
        })
    }
}
