//! Per-source outcome of a run.
//!
//! Nothing reported here is fatal; the report exists so the renderer can tell
//! the user why a calendar is missing from the timeline.

use std::collections::HashMap;

use crate::source::{SourceId, SourceRegistry};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Every listing request of the source finished
    Completed,
    /// At least one listing request failed; the message is from the first failure
    Failed(String),
    /// Still fetching when collection stopped
    Pending,
}

/// Sent by a fetch task once all of its listing requests are done.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source: SourceId,
    pub outcome: Outcome,
    /// Events handed to the collector
    pub delivered: usize,
    /// Events dropped by normalization or the inverted-span policy
    pub dropped: usize,
}

impl SourceReport {
    pub fn pending(source: SourceId) -> Self {
        SourceReport {
            source,
            outcome: Outcome::Pending,
            delivered: 0,
            dropped: 0,
        }
    }
}

/// One report per registered source, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub reports: Vec<SourceReport>,
}

impl Diagnostics {
    /// Fill in the reports the collector received, marking the rest pending.
    ///
    /// `delivered` counts come from what the collector actually received, so
    /// a pending source still shows the events that made it in time.
    pub fn assemble(
        registry: &SourceRegistry,
        received: Vec<SourceReport>,
        delivered: &HashMap<SourceId, usize>,
    ) -> Self {
        let mut received: HashMap<SourceId, SourceReport> = received
            .into_iter()
            .map(|report| (report.source.clone(), report))
            .collect();

        let reports = registry
            .sources()
            .iter()
            .map(|source| {
                let mut report = received
                    .remove(&source.id)
                    .unwrap_or_else(|| SourceReport::pending(source.id.clone()));
                report.delivered = delivered.get(&source.id).copied().unwrap_or(0);
                report
            })
            .collect();

        Diagnostics { reports }
    }

    pub fn report(&self, source: &SourceId) -> Option<&SourceReport> {
        self.reports.iter().find(|r| &r.source == source)
    }

    pub fn failed(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed(_)))
    }

    pub fn pending(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports.iter().filter(|r| r.outcome == Outcome::Pending)
    }

    pub fn dropped(&self) -> usize {
        self.reports.iter().map(|r| r.dropped).sum()
    }
}
