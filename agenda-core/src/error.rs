//! Error types for the agenda engine.
//!
//! Only [`AgendaError`] ends a run. [`FetchError`] and [`NormalizeError`] are
//! absorbed per source / per event and end up in the run's diagnostics.

use thiserror::Error;

/// Startup conditions that abort the whole run.
#[derive(Error, Debug)]
pub enum AgendaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Could not list calendars: {0}")]
    CalendarList(String),

    #[error("Feed list error: {0}")]
    FeedList(String),

    #[error("No calendar sources found")]
    NoSources,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for fatal agenda operations.
pub type AgendaResult<T> = Result<T, AgendaError>;

/// A failed listing request for one source. The source contributes no events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("unreadable response: {0}")]
    Parse(String),
}

/// A single source-native record that could not be normalized.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("malformed {field} field: {reason}")]
    MalformedTemporalField { field: TemporalField, reason: String },
}

impl NormalizeError {
    pub(crate) fn malformed(field: TemporalField, reason: impl Into<String>) -> Self {
        NormalizeError::MalformedTemporalField {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalField {
    Start,
    End,
}

impl std::fmt::Display for TemporalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemporalField::Start => write!(f, "start"),
            TemporalField::End => write!(f, "end"),
        }
    }
}
