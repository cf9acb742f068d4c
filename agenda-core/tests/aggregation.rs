use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agenda_core::client::{FeedClient, ServiceClient};
use agenda_core::date_range::DateRange;
use agenda_core::diagnostics::Outcome;
use agenda_core::dispatch::InvertedSpanPolicy;
use agenda_core::feeds::FeedConfig;
use agenda_core::timeline::TieBreak;
use agenda_core::{
    AgendaError, Aggregator, CalendarSource, EventMarker, EventTime, FeedEvent, FetchError,
    ServiceCalendar, ServiceEvent, SourceId, SourceRegistry, discover_sources,
};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};

type Listing = Result<Vec<ServiceEvent>, FetchError>;

#[derive(Default)]
struct FakeService {
    calendars: Vec<ServiceCalendar>,
    listings: HashMap<String, (Duration, Listing)>,
    calendar_list_error: bool,
}

impl FakeService {
    fn calendar(mut self, id: &str, delay_ms: u64, listing: Listing) -> Self {
        self.calendars.push(ServiceCalendar {
            id: id.to_string(),
            summary: format!("Calendar {id}"),
        });
        self.listings
            .insert(id.to_string(), (Duration::from_millis(delay_ms), listing));
        self
    }
}

#[async_trait]
impl ServiceClient for FakeService {
    async fn list_calendars(&self) -> Result<Vec<ServiceCalendar>, FetchError> {
        if self.calendar_list_error {
            return Err(FetchError::Unauthorized("token revoked".to_string()));
        }
        Ok(self.calendars.clone())
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        _range: &DateRange,
    ) -> Result<Vec<ServiceEvent>, FetchError> {
        let (delay, listing) = self
            .listings
            .get(calendar_id)
            .cloned()
            .unwrap_or((Duration::ZERO, Ok(Vec::new())));
        tokio::time::sleep(delay).await;
        listing
    }
}

/// Yields one timed event per requested day, except on `failing_day`.
#[derive(Default)]
struct FakeFeeds {
    calls: AtomicUsize,
    failing_day: Option<NaiveDate>,
}

#[async_trait]
impl FeedClient for FakeFeeds {
    async fn events_on(
        &self,
        feed: &CalendarSource,
        date: NaiveDate,
    ) -> Result<Vec<FeedEvent>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_day == Some(date) {
            return Err(FetchError::Transport("connection reset".to_string()));
        }
        let at = |h| date.and_hms_opt(h, 0, 0).unwrap();
        Ok(vec![FeedEvent {
            summary: format!("{} on {date}", feed.name),
            description: String::new(),
            location: String::new(),
            start: EventTime::DateTimeFloating(at(12)),
            end: EventTime::DateTimeFloating(at(13)),
            feed: feed.id.clone(),
        }])
    }
}

fn timed(id: &str, start: &str, end: &str) -> ServiceEvent {
    ServiceEvent {
        id: id.to_string(),
        summary: id.to_string(),
        start: EventMarker::date_time(start),
        end: EventMarker::date_time(end),
        ..Default::default()
    }
}

fn registry_for(service: &FakeService) -> Arc<SourceRegistry> {
    Arc::new(
        service
            .calendars
            .iter()
            .map(|c| CalendarSource::service(&c.id, &c.summary))
            .collect(),
    )
}

fn week() -> DateRange {
    DateRange::upcoming(Local::now(), 7).unwrap()
}

fn summaries(aggregation: &agenda_core::Aggregation) -> Vec<String> {
    aggregation
        .timeline
        .events()
        .iter()
        .map(|e| e.summary.clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_is_cut_off_at_the_deadline() {
    let service = FakeService::default()
        .calendar("a", 100, Ok(vec![timed("a1", "2024-06-03T09:00:00Z", "2024-06-03T10:00:00Z")]))
        .calendar("b", 500, Ok(vec![timed("b1", "2024-06-03T08:00:00Z", "2024-06-03T09:00:00Z")]))
        .calendar("c", 2000, Ok(vec![timed("c1", "2024-06-03T07:00:00Z", "2024-06-03T08:00:00Z")]));
    let registry = registry_for(&service);

    let aggregation = Aggregator::new(week())
        .service(Arc::new(service))
        .timeout(Duration::from_millis(1000))
        .run(registry)
        .await
        .unwrap();

    assert_eq!(summaries(&aggregation), vec!["b1", "a1"]);
    assert!(!aggregation.complete);

    let c = aggregation.diagnostics.report(&SourceId::new("c")).unwrap();
    assert_eq!(c.outcome, Outcome::Pending);
    assert_eq!(c.delivered, 0);
    let a = aggregation.diagnostics.report(&SourceId::new("a")).unwrap();
    assert_eq!(a.outcome, Outcome::Completed);
    assert_eq!(a.delivered, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_source_contributes_nothing() {
    let service = FakeService::default()
        .calendar("ok", 10, Ok(vec![
            timed("ok1", "2024-06-03T09:00:00Z", "2024-06-03T10:00:00Z"),
            timed("ok2", "2024-06-04T09:00:00Z", "2024-06-04T10:00:00Z"),
        ]))
        .calendar("broken", 10, Err(FetchError::Transport("HTTP 503".to_string())));
    let registry = registry_for(&service);

    let aggregation = Aggregator::new(week())
        .service(Arc::new(service))
        .run(registry)
        .await
        .unwrap();

    assert_eq!(summaries(&aggregation), vec!["ok1", "ok2"]);
    assert!(aggregation.complete);
    assert!(aggregation
        .timeline
        .events()
        .iter()
        .all(|e| e.source == SourceId::new("ok")));

    let broken = aggregation.diagnostics.report(&SourceId::new("broken")).unwrap();
    assert_eq!(
        broken.outcome,
        Outcome::Failed("transport error: HTTP 503".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_malformed_event_is_dropped_alone() {
    let mut bad = timed("bad", "2024-06-03T09:00:00Z", "2024-06-03T10:00:00Z");
    bad.start = EventMarker::date("June 3rd");
    let service = FakeService::default().calendar("cal", 10, Ok(vec![
        timed("before", "2024-06-03T08:00:00Z", "2024-06-03T09:00:00Z"),
        bad,
        timed("after", "2024-06-03T11:00:00Z", "2024-06-03T12:00:00Z"),
    ]));
    let registry = registry_for(&service);

    let aggregation = Aggregator::new(week())
        .service(Arc::new(service))
        .run(registry)
        .await
        .unwrap();

    assert_eq!(summaries(&aggregation), vec!["before", "after"]);
    let report = aggregation.diagnostics.report(&SourceId::new("cal")).unwrap();
    assert_eq!(report.dropped, 1);
    assert_eq!(report.delivered, 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeline_is_ordered_across_sources() {
    let service = FakeService::default()
        .calendar("x", 300, Ok(vec![
            timed("x-long", "2024-06-03T09:00:00Z", "2024-06-03T12:00:00Z"),
            timed("x-late", "2024-06-05T09:00:00Z", "2024-06-05T10:00:00Z"),
        ]))
        .calendar("y", 50, Ok(vec![
            timed("y-short", "2024-06-03T09:00:00Z", "2024-06-03T09:30:00Z"),
            timed("y-early", "2024-06-02T09:00:00Z", "2024-06-02T09:30:00Z"),
        ]));
    let registry = registry_for(&service);

    let aggregation = Aggregator::new(week())
        .service(Arc::new(service))
        .run(registry)
        .await
        .unwrap();

    assert_eq!(
        summaries(&aggregation),
        vec!["y-early", "y-short", "x-long", "x-late"]
    );
    for pair in aggregation.timeline.events().windows(2) {
        assert!(
            pair[0].start < pair[1].start
                || (pair[0].start == pair[1].start && pair[0].end <= pair[1].end)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_registration_tie_break_ignores_arrival_order() {
    let same = |id: &str| timed(id, "2024-06-03T09:00:00Z", "2024-06-03T10:00:00Z");
    let service = FakeService::default()
        .calendar("first", 400, Ok(vec![same("first")]))
        .calendar("second", 10, Ok(vec![same("second")]));
    let registry = registry_for(&service);
    let service = Arc::new(service);

    let by_receipt = Aggregator::new(week())
        .service(service.clone())
        .run(registry.clone())
        .await
        .unwrap();
    let by_registration = Aggregator::new(week())
        .service(service)
        .tie_break(TieBreak::Registration)
        .run(registry)
        .await
        .unwrap();

    assert_eq!(summaries(&by_receipt), vec!["second", "first"]);
    assert_eq!(summaries(&by_registration), vec!["first", "second"]);
}

#[tokio::test(start_paused = true)]
async fn test_inverted_spans_follow_policy() {
    let service = FakeService::default().calendar("cal", 10, Ok(vec![timed(
        "backwards",
        "2024-06-03T10:00:00Z",
        "2024-06-03T09:00:00Z",
    )]));
    let registry = registry_for(&service);
    let service = Arc::new(service);

    let kept = Aggregator::new(week())
        .service(service.clone())
        .run(registry.clone())
        .await
        .unwrap();
    let dropped = Aggregator::new(week())
        .service(service)
        .inverted_spans(InvertedSpanPolicy::Drop)
        .run(registry)
        .await
        .unwrap();

    assert_eq!(kept.timeline.len(), 1);
    assert!(kept.timeline.events()[0].is_inverted());
    assert!(dropped.timeline.is_empty());
    assert_eq!(dropped.diagnostics.dropped(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_feed_fans_out_per_day() {
    let feeds = Arc::new(FakeFeeds::default());
    let feed = FeedConfig {
        name: "Team".to_string(),
        url: "https://feeds.test/team.ics".to_string(),
        color: None,
    };
    let registry = Arc::new(discover_sources(None, &[feed], 20).await.unwrap());
    let window = week();

    let aggregation = Aggregator::new(window)
        .feeds(feeds.clone())
        .run(registry)
        .await
        .unwrap();

    assert_eq!(window.days().len(), 7);
    assert_eq!(feeds.calls.load(Ordering::SeqCst), 7);
    assert_eq!(aggregation.timeline.len(), window.days().len());
    let starts: Vec<NaiveDate> = aggregation
        .timeline
        .events()
        .iter()
        .map(|e| e.start.date_naive())
        .collect();
    assert_eq!(starts, window.days());
}

#[tokio::test(start_paused = true)]
async fn test_failed_feed_day_is_reported_but_other_days_remain() {
    let window = week();
    let failing_day = window.days()[2];
    let feeds = Arc::new(FakeFeeds {
        failing_day: Some(failing_day),
        ..Default::default()
    });
    let registry: SourceRegistry =
        [CalendarSource::feed("https://feeds.test/team.ics", "Team")].into_iter().collect();

    let aggregation = Aggregator::new(window)
        .feeds(feeds)
        .run(Arc::new(registry))
        .await
        .unwrap();

    assert_eq!(aggregation.timeline.len(), window.days().len() - 1);
    let report = aggregation
        .diagnostics
        .report(&SourceId::new("https://feeds.test/team.ics"))
        .unwrap();
    assert!(matches!(report.outcome, Outcome::Failed(_)));
}

#[tokio::test]
async fn test_discovery_registers_services_before_feeds() {
    let service = FakeService::default()
        .calendar("one", 0, Ok(Vec::new()))
        .calendar("two", 0, Ok(Vec::new()))
        .calendar("three", 0, Ok(Vec::new()));
    let feeds = vec![FeedConfig {
        name: "Holidays".to_string(),
        url: "https://feeds.test/holidays.ics".to_string(),
        color: None,
    }];

    let registry = discover_sources(Some(&service as &dyn ServiceClient), &feeds, 2).await.unwrap();

    let ids: Vec<&str> = registry.sources().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["one", "two", "https://feeds.test/holidays.ics"]);
}

#[tokio::test]
async fn test_discovery_failures_are_fatal() {
    let empty = discover_sources(None, &[], 20).await;
    assert!(matches!(empty, Err(AgendaError::NoSources)));

    let revoked = FakeService {
        calendar_list_error: true,
        ..Default::default()
    };
    let listing = discover_sources(Some(&revoked as &dyn ServiceClient), &[], 20).await;
    assert!(matches!(listing, Err(AgendaError::CalendarList(_))));
}
