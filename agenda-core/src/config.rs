//! Global agenda configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::collect::DEFAULT_COLLECT_TIMEOUT;
use crate::date_range::DEFAULT_WINDOW_DAYS;
use crate::dispatch::InvertedSpanPolicy;
use crate::error::{AgendaError, AgendaResult};
use crate::timeline::TieBreak;

const DEFAULT_MAX_CALENDARS: usize = 20;
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

fn default_true() -> bool {
    true
}

fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}

fn default_collect_timeout_ms() -> u64 {
    DEFAULT_COLLECT_TIMEOUT.as_millis() as u64
}

fn default_max_calendars() -> usize {
    DEFAULT_MAX_CALENDARS
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// Configuration at ~/.config/agenda/config.toml, overridable with
/// `AGENDA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct AgendaConfig {
    /// Google OAuth client secret (defaults to credentials.json next to the config)
    pub credentials_path: Option<PathBuf>,

    /// Stored OAuth token (defaults to token.json next to the config)
    pub token_path: Option<PathBuf>,

    /// JSON list of ICS feeds (defaults to ics.json next to the config)
    pub feeds_path: Option<PathBuf>,

    /// Whether to include Google Calendar calendars
    #[serde(default = "default_true")]
    pub google: bool,

    #[serde(default = "default_window_days")]
    pub window_days: i64,

    #[serde(default = "default_collect_timeout_ms")]
    pub collect_timeout_ms: u64,

    #[serde(default = "default_max_calendars")]
    pub max_calendars: usize,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub deterministic_ties: bool,

    #[serde(default)]
    pub inverted_spans: InvertedSpanPolicy,
}

impl Default for AgendaConfig {
    fn default() -> Self {
        AgendaConfig {
            credentials_path: None,
            token_path: None,
            feeds_path: None,
            google: true,
            window_days: DEFAULT_WINDOW_DAYS,
            collect_timeout_ms: default_collect_timeout_ms(),
            max_calendars: DEFAULT_MAX_CALENDARS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            deterministic_ties: false,
            inverted_spans: InvertedSpanPolicy::Keep,
        }
    }
}

impl AgendaConfig {
    pub fn config_dir() -> AgendaResult<PathBuf> {
        Ok(dirs::config_dir()
            .ok_or_else(|| AgendaError::Config("Could not determine config directory".into()))?
            .join("agenda"))
    }

    pub fn config_path() -> AgendaResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load ~/.config/agenda/config.toml, creating a commented default if missing.
    pub fn load() -> AgendaResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> AgendaResult<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("AGENDA").try_parsing(true))
            .build()
            .map_err(|e| AgendaError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AgendaError::Config(e.to_string()))
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> AgendaResult<()> {
        let contents = format!(
            "\
# agenda configuration

# Google OAuth client secret and stored token:
# credentials_path = \"~/.config/agenda/credentials.json\"
# token_path = \"~/.config/agenda/token.json\"

# ICS feeds, a JSON list of {{ \"Name\": ..., \"URL\": ... }}:
# feeds_path = \"~/.config/agenda/ics.json\"

# Set to false to only show ICS feeds:
# google = true

# How far ahead to look, and how long to wait for calendars:
# window_days = {DEFAULT_WINDOW_DAYS}
# collect_timeout_ms = {}

# At most this many Google calendars:
# max_calendars = {DEFAULT_MAX_CALENDARS}

# Order events with identical times by calendar instead of arrival:
# deterministic_ties = false

# Events ending before they start: \"keep\", \"drop\" or \"clamp\"
# inverted_spans = \"keep\"
",
            default_collect_timeout_ms()
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AgendaError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| AgendaError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    pub fn credentials_path(&self) -> AgendaResult<PathBuf> {
        self.resolve(&self.credentials_path, "credentials.json")
    }

    pub fn token_path(&self) -> AgendaResult<PathBuf> {
        self.resolve(&self.token_path, "token.json")
    }

    pub fn feeds_path(&self) -> AgendaResult<PathBuf> {
        self.resolve(&self.feeds_path, "ics.json")
    }

    fn resolve(&self, configured: &Option<PathBuf>, default_name: &str) -> AgendaResult<PathBuf> {
        match configured {
            Some(path) => Ok(expand_path(path)),
            None => Ok(Self::config_dir()?.join(default_name)),
        }
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_millis(self.collect_timeout_ms)
    }

    pub fn tie_break(&self) -> TieBreak {
        if self.deterministic_ties {
            TieBreak::Registration
        } else {
            TieBreak::Receipt
        }
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
