//! The configured list of ICS feeds.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, AgendaResult};
use crate::source::CalendarSource;

/// One entry of ics.json.
///
/// Keys are accepted capitalized (`Name`, `URL`) or lowercase. `Color` is
/// read for compatibility but sources are colored from the palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "URL", alias = "url")]
    pub url: String,
    #[serde(rename = "Color", alias = "color", default)]
    pub color: Option<String>,
}

impl From<&FeedConfig> for CalendarSource {
    fn from(feed: &FeedConfig) -> Self {
        CalendarSource::feed(&feed.url, &feed.name)
    }
}

pub fn parse_feeds(json: &str) -> AgendaResult<Vec<FeedConfig>> {
    serde_json::from_str(json).map_err(|e| AgendaError::FeedList(e.to_string()))
}

/// Load the feed list. A missing file means no feeds.
pub fn load_feeds(path: &Path) -> AgendaResult<Vec<FeedConfig>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no feed list");
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AgendaError::FeedList(format!("Could not read {}: {e}", path.display()))
    })?;

    parse_feeds(&contents)
        .map_err(|e| AgendaError::FeedList(format!("{} in {}", e, path.display())))
}
