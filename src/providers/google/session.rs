//! A valid Google access token, loaded from token.json.
//!
//! The file uses the common OAuth token layout (`access_token`,
//! `refresh_token`, `token_type`, RFC 3339 `expiry`). An expired token is
//! refreshed once and written back.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::credentials::Credentials;

/// Refresh this long before the recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    /// Tokens without an expiry (or with the zero time) never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) if expiry.year() > 1 => {
                now + Duration::seconds(EXPIRY_MARGIN_SECS) >= expiry
            }
            _ => false,
        }
    }
}

pub struct Session {
    path: PathBuf,
    token: Token,
}

impl Session {
    /// Load the token and refresh it if it has expired.
    pub async fn load_valid(path: &Path, credentials: &Credentials) -> Result<Self> {
        let mut session = Self::load(path)?;

        if session.token.is_expired(Utc::now()) {
            tracing::debug!(path = %path.display(), "access token expired, refreshing");
            session.refresh(credentials).await?;
        }

        Ok(session)
    }

    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Google OAuth token not found at {}.\n\n\
                Authorize agenda for read-only calendar access and save the\n\
                resulting token there, or set `google = false` in the agenda config.",
                path.display()
            );
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read Google OAuth token from {}", path.display()))?;

        let token: Token = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse Google OAuth token from {}", path.display()))?;

        Ok(Session {
            path: path.to_path_buf(),
            token,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.token.access_token
    }

    pub fn save(&self) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(&self.token).context("Failed to serialize token")?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write token to {}", self.path.display()))?;

        // Set to owner-only (0600) since file contains OAuth tokens:
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", self.path.display()))?;
        }

        Ok(())
    }

    async fn refresh(&mut self, credentials: &Credentials) -> Result<()> {
        if self.token.refresh_token.is_empty() {
            anyhow::bail!(
                "Google OAuth token at {} has expired and has no refresh token",
                self.path.display()
            );
        }

        let response = reqwest::Client::new()
            .post(&credentials.token_uri)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", self.token.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("Failed to send token refresh request")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to refresh Google OAuth token: {}", error_text);
        }

        #[derive(Deserialize)]
        struct RefreshResponse {
            access_token: String,
            expires_in: i64,
            #[serde(default)]
            token_type: Option<String>,
            // Google usually keeps the existing refresh token
            #[serde(default)]
            refresh_token: Option<String>,
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .context("Failed to parse token refresh response")?;

        self.token.access_token = refreshed.access_token;
        self.token.expiry = Some(Utc::now() + Duration::seconds(refreshed.expires_in));
        if let Some(token_type) = refreshed.token_type {
            self.token.token_type = token_type;
        }
        if let Some(refresh_token) = refreshed.refresh_token.filter(|t| !t.is_empty()) {
            self.token.refresh_token = refresh_token;
        }
        self.save()?;

        Ok(())
    }
}
