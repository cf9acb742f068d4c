//! Core of agenda: merges calendar sources into one timeline.
//!
//! - `source` / `palette`: registered sources and their display colors
//! - `normalize`: service and feed records → `NormalizedEvent`
//! - `dispatch` / `collect`: concurrent fetching under a collection deadline
//! - `timeline`: the final (start, end) ordering
//! - `engine`: discovery and the aggregation run tying it together

pub mod cancel;
pub mod client;
pub mod collect;
pub mod config;
pub mod date_range;
pub mod diagnostics;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod feeds;
pub mod normalize;
pub mod palette;
pub mod source;
pub mod timeline;

pub use engine::{Aggregation, Aggregator, discover_sources};
pub use error::{AgendaError, AgendaResult, FetchError, NormalizeError};
pub use event::{EventMarker, EventTime, FeedEvent, NormalizedEvent, ServiceCalendar, ServiceEvent};
pub use palette::{AttributeMap, DisplayAttribute};
pub use source::{CalendarSource, SourceId, SourceKind, SourceRegistry};
pub use timeline::Timeline;
