pub mod show;
pub mod sources;

use std::sync::Arc;

use agenda_core::client::ServiceClient;
use agenda_core::config::AgendaConfig;
use agenda_core::feeds::load_feeds;
use agenda_core::{SourceRegistry, discover_sources};
use anyhow::Result;

use crate::providers::google::GoogleClient;

/// Everything needed to fetch: the signed-in service client (if enabled) and
/// the registered sources.
pub struct Sources {
    pub service: Option<Arc<GoogleClient>>,
    pub registry: SourceRegistry,
}

/// Sign in to Google (if enabled), read the feed list and register sources.
pub async fn discover(config: &AgendaConfig) -> Result<Sources> {
    let service = if config.google {
        Some(Arc::new(GoogleClient::connect(config).await?))
    } else {
        None
    };

    let feeds = load_feeds(&config.feeds_path()?)?;

    let registry = discover_sources(
        service.as_deref().map(|s| s as &dyn ServiceClient),
        &feeds,
        config.max_calendars,
    )
    .await?;

    Ok(Sources { service, registry })
}
