mod commands;
mod providers;
mod render;
mod utils;

use std::path::PathBuf;

use agenda_core::config::AgendaConfig;
use agenda_core::date_range::MAX_WINDOW_DAYS;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agenda")]
#[command(about = "Show the coming days of all your calendars as one timeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use this config file instead of ~/.config/agenda/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// How long to wait for calendars before printing (milliseconds)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Number of days to show, starting now
    #[arg(long, global = true)]
    days: Option<i64>,

    /// Order events with identical times by calendar instead of arrival
    #[arg(long, global = true)]
    deterministic: bool,

    /// Report calendars that failed, timed out or had unreadable events
    #[arg(long, global = true)]
    diagnostics: bool,

    /// Log what every calendar fetch is doing (to stderr)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged timeline (default)
    Show,
    /// List the calendars that would be shown, with their colors
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Commands::Show) {
        Commands::Show => commands::show::run(&config, cli.diagnostics).await,
        Commands::Sources => commands::sources::run(&config).await,
    }
}

/// Logs go to stderr so the timeline on stdout stays clean.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<AgendaConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file {} not found", path.display());
            }
            AgendaConfig::load_from(path)?
        }
        None => AgendaConfig::load()?,
    };

    if let Some(timeout_ms) = cli.timeout_ms {
        config.collect_timeout_ms = timeout_ms;
    }
    if let Some(days) = cli.days {
        if !(1..=MAX_WINDOW_DAYS).contains(&days) {
            anyhow::bail!("--days must be between 1 and {MAX_WINDOW_DAYS}");
        }
        config.window_days = days;
    }
    if cli.deterministic {
        config.deterministic_ties = true;
    }

    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}
