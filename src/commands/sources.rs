use agenda_core::AttributeMap;
use agenda_core::config::AgendaConfig;
use anyhow::Result;

use super::discover;
use crate::render::render_source_list;
use crate::utils::tui::create_spinner;

pub async fn run(config: &AgendaConfig) -> Result<()> {
    let spinner = create_spinner("Loading calendars".to_string());
    let sources = discover(config).await;
    spinner.finish_and_clear();
    let sources = sources?;

    let attributes = AttributeMap::assign(&sources.registry);
    println!("{}", render_source_list(&attributes, &sources.registry));

    Ok(())
}
