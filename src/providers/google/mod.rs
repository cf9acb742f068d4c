//! Google Calendar API v3 client.
//!
//! Events are requested with `singleEvents=true`, so recurring events arrive
//! already expanded and only need normalizing.

pub mod credentials;
pub mod session;

use agenda_core::client::ServiceClient;
use agenda_core::config::AgendaConfig;
use agenda_core::date_range::DateRange;
use agenda_core::{AgendaError, FetchError, ServiceCalendar, ServiceEvent};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use session::Session;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

pub struct GoogleClient {
    http: reqwest::Client,
    access_token: String,
    max_calendars: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListPage {
    #[serde(default)]
    items: Vec<ServiceCalendar>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<ServiceEvent>,
    next_page_token: Option<String>,
}

impl GoogleClient {
    /// Load credentials and token from the configured paths, refreshing the
    /// token if needed.
    pub async fn connect(config: &AgendaConfig) -> Result<Self> {
        let credentials = credentials::load(&config.credentials_path()?)
            .map_err(|e| AgendaError::Credentials(format!("{e:#}")))?;
        let session = Session::load_valid(&config.token_path()?, &credentials)
            .await
            .map_err(|e| AgendaError::Credentials(format!("{e:#}")))?;

        Ok(Self::with_token(session.access_token(), config.max_calendars))
    }

    pub fn with_token(access_token: &str, max_calendars: usize) -> Self {
        GoogleClient {
            http: reqwest::Client::new(),
            access_token: access_token.to_string(),
            max_calendars,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = Url::parse(API_BASE).map_err(|e| FetchError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Transport(format!("{API_BASE} cannot take a path")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Transport(format!("HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ServiceClient for GoogleClient {
    async fn list_calendars(&self) -> Result<Vec<ServiceCalendar>, FetchError> {
        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let page: CalendarListPage = self
            .get(url, &[("maxResults", self.max_calendars.to_string())])
            .await?;

        tracing::debug!(calendars = page.items.len(), "calendar list received");
        Ok(page.items)
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        range: &DateRange,
    ) -> Result<Vec<ServiceEvent>, FetchError> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", range.from_rfc3339()),
                ("timeMax", range.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let page: EventsPage = self.get(url.clone(), &query).await?;
            events.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_id_is_escaped_into_one_segment() {
        let client = GoogleClient::with_token("t", 20);
        let url = client
            .endpoint(&["calendars", "en.german#holiday@group.v.calendar.google.com", "events"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/en.german%23holiday@group.v.calendar.google.com/events"
        );
    }

    #[test]
    fn test_events_page_parses_wire_markers() {
        let page: EventsPage = serde_json::from_str(
            r#"{
                "kind": "calendar#events",
                "nextPageToken": "abc",
                "items": [
                    {"id": "1", "summary": "Offsite", "start": {"date": "2024-06-01"}, "end": {"date": "2024-06-02"}},
                    {"id": "2", "summary": "Standup", "location": "Room 4",
                     "start": {"dateTime": "2024-06-03T09:30:00-07:00", "timeZone": "America/Los_Angeles"},
                     "end": {"dateTime": "2024-06-03T09:45:00-07:00"}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
        assert_eq!(page.items[0].start.date.as_deref(), Some("2024-06-01"));
        assert_eq!(
            page.items[1].start.date_time.as_deref(),
            Some("2024-06-03T09:30:00-07:00")
        );
        assert_eq!(page.items[1].location, "Room 4");
        assert_eq!(page.items[1].description, "");
    }

    #[test]
    fn test_calendar_list_ignores_extra_fields() {
        let page: CalendarListPage = serde_json::from_str(
            r#"{"items": [{"id": "primary@example.com", "summary": "Me", "colorId": "14", "accessRole": "owner"}]}"#,
        )
        .unwrap();

        assert_eq!(page.items[0].id, "primary@example.com");
        assert_eq!(page.items[0].summary, "Me");
    }
}
