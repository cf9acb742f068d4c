//! Calendar sources and their registration order.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a source, unique within a run.
///
/// Service calendars are identified by their calendar id, feeds by their URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        SourceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    ServiceCalendar,
    FeedUrl,
}

/// Where a source's events are fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locator {
    /// Calendar id assigned by the calendar service
    Service(String),
    /// URL of an iCalendar feed
    Feed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSource {
    pub id: SourceId,
    pub name: String,
    pub locator: Locator,
}

impl CalendarSource {
    pub fn service(calendar_id: &str, name: &str) -> Self {
        CalendarSource {
            id: SourceId::new(calendar_id),
            name: name.to_string(),
            locator: Locator::Service(calendar_id.to_string()),
        }
    }

    pub fn feed(url: &str, name: &str) -> Self {
        CalendarSource {
            id: SourceId::new(url),
            name: name.to_string(),
            locator: Locator::Feed(url.to_string()),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self.locator {
            Locator::Service(_) => SourceKind::ServiceCalendar,
            Locator::Feed(_) => SourceKind::FeedUrl,
        }
    }
}

/// All sources of a run, in registration order.
///
/// Service calendars are registered first (in listing order), then feeds (in
/// configuration order). The registry never changes after startup.
#[derive(Debug, Default, Clone)]
pub struct SourceRegistry {
    sources: Vec<CalendarSource>,
    index: HashMap<SourceId, usize>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. Returns false (and keeps the first registration)
    /// when the identifier is already taken.
    pub fn register(&mut self, source: CalendarSource) -> bool {
        if self.index.contains_key(&source.id) {
            tracing::warn!(source = %source.id, "duplicate calendar source ignored");
            return false;
        }
        self.index.insert(source.id.clone(), self.sources.len());
        self.sources.push(source);
        true
    }

    pub fn sources(&self) -> &[CalendarSource] {
        &self.sources
    }

    pub fn get(&self, id: &SourceId) -> Option<&CalendarSource> {
        self.index.get(id).map(|&i| &self.sources[i])
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FromIterator<CalendarSource> for SourceRegistry {
    fn from_iter<I: IntoIterator<Item = CalendarSource>>(iter: I) -> Self {
        let mut registry = SourceRegistry::new();
        for source in iter {
            registry.register(source);
        }
        registry
    }
}
