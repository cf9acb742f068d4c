//! Google OAuth client credentials.
//!
//! Read from credentials.json as downloaded from the Google Cloud console.
//! Both the `installed` and `web` wrappers are accepted, as well as a flat
//! `{ "client_id": ..., "client_secret": ... }` object.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialsFile {
    Installed { installed: Credentials },
    Web { web: Credentials },
    Flat(Credentials),
}

impl From<CredentialsFile> for Credentials {
    fn from(file: CredentialsFile) -> Self {
        match file {
            CredentialsFile::Installed { installed } => installed,
            CredentialsFile::Web { web } => web,
            CredentialsFile::Flat(credentials) => credentials,
        }
    }
}

pub fn parse(json: &str) -> Result<Credentials> {
    let file: CredentialsFile =
        serde_json::from_str(json).context("Expected an OAuth client secret")?;
    Ok(file.into())
}

pub fn load(path: &Path) -> Result<Credentials> {
    if !path.exists() {
        anyhow::bail!(
            "Google credentials not found.\n\n\
            Download an OAuth client secret for a desktop app from\n\
            https://console.cloud.google.com/apis/credentials and save it as\n  \
            {}\n\n\
            Or set `google = false` in the agenda config to only show ICS feeds.",
            path.display()
        );
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials from {}", path.display()))?;

    parse(&contents).with_context(|| format!("Failed to parse credentials from {}", path.display()))
}
