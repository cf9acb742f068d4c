use std::sync::Arc;

use agenda_core::Aggregator;
use agenda_core::config::AgendaConfig;
use agenda_core::date_range::DateRange;
use anyhow::Result;
use chrono::Local;

use super::discover;
use crate::providers::ics::IcsFeedClient;
use crate::render::{render_diagnostics, render_legend, render_timeline};
use crate::utils::tui::create_spinner;

pub async fn run(config: &AgendaConfig, diagnostics: bool) -> Result<()> {
    let window = DateRange::upcoming(Local::now(), config.window_days)?;

    let spinner = create_spinner("Loading calendars".to_string());
    let sources = discover(config)
        .await
        .inspect_err(|_| spinner.finish_and_clear())?;
    let registry = Arc::new(sources.registry);

    let mut aggregator =
        Aggregator::from_config(config, window).feeds(Arc::new(IcsFeedClient::new()));
    if let Some(service) = sources.service {
        aggregator = aggregator.service(service);
    }

    spinner.set_message(format!("Fetching {} calendars", registry.len()));
    let aggregation = aggregator.run(registry.clone()).await;
    spinner.finish_and_clear();
    let aggregation = aggregation?;

    print!("{}", render_timeline(&aggregation.timeline));
    println!("{}", render_legend(&aggregation.attributes, &registry));

    if diagnostics {
        println!();
        println!("{}", render_diagnostics(&aggregation.diagnostics, &registry));
    }

    Ok(())
}
