//! Timeline sorter.
//!
//! Events are stably sorted by (start, end). With the default tie-break,
//! events sharing both keep the order they were received in, which depends on
//! how the concurrent fetches interleaved and can differ between runs.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::dispatch::Arrival;
use crate::event::NormalizedEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// Keep receipt order for equal (start, end)
    #[default]
    Receipt,
    /// Order equal (start, end) by source registration, day, then listing position
    Registration,
}

/// Events ordered by start, then end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    events: Vec<NormalizedEvent>,
}

fn by_span(a: &NormalizedEvent, b: &NormalizedEvent) -> Ordering {
    a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end))
}

impl Timeline {
    /// Stable sort of arrivals given in receipt order.
    pub fn from_arrivals(mut arrivals: Vec<Arrival>, tie_break: TieBreak) -> Self {
        match tie_break {
            TieBreak::Receipt => arrivals.sort_by(|a, b| by_span(&a.event, &b.event)),
            TieBreak::Registration => arrivals.sort_by(|a, b| {
                by_span(&a.event, &b.event).then_with(|| a.origin.cmp(&b.origin))
            }),
        }
        Timeline {
            events: arrivals.into_iter().map(|a| a.event).collect(),
        }
    }

    pub fn events(&self) -> &[NormalizedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl IntoIterator for Timeline {
    type Item = NormalizedEvent;
    type IntoIter = std::vec::IntoIter<NormalizedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a NormalizedEvent;
    type IntoIter = std::slice::Iter<'a, NormalizedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
