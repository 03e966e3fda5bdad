// --- File: crates/convene_gcal/src/provider.rs ---
//! Google Calendar provider.

use chrono::{DateTime, Utc};
use convene_common::models::{BusyInterval, CreatedEvent, NewCalendarEvent, TokenGrant};
use convene_common::services::{BoxFuture, CalendarProvider};
use convene_common::{config_error, create_client, ConveneError, ProviderError};
use convene_config::GoogleConfig;
use reqwest::Client;
use tracing::{debug, info, instrument};

use crate::auth;
use crate::payloads::{EventInsertRequest, EventInsertResponse, FreeBusyRequest, FreeBusyResponse};

/// Key under which Google credentials are stored.
pub const GOOGLE_PROVIDER: &str = "google";

/// Provider payloads are kept for diagnostics up to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 1024;

pub(crate) fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

// reqwest errors can carry the request URL but never headers or form bodies.
pub(crate) fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Transport(err.to_string())
}

/// Google Calendar provider using per-user OAuth access tokens.
#[derive(Debug, Clone)]
pub struct GoogleCalendarProvider {
    client: Client,
    config: GoogleConfig,
}

impl GoogleCalendarProvider {
    /// Build a provider with its own HTTP client bounded by `request_timeout_secs`.
    pub fn new(config: GoogleConfig) -> Result<Self, ConveneError> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(config_error("google client_id and client_secret must be set"));
        }
        let client = create_client(config.request_timeout_secs, true)
            .map_err(|e| config_error(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    #[instrument(skip(self, access_token))]
    async fn free_busy(
        &self,
        access_token: &str,
        account: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, ProviderError> {
        let request = FreeBusyRequest::for_account(account, start, end);

        let response = self
            .client
            .post(&self.config.freebusy_url)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: FreeBusyResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::MalformedResponse(format!("free/busy response: {}", e)))?;
        let busy = parsed.into_busy_intervals(account)?;
        debug!("Fetched {} busy periods", busy.len());
        Ok(busy)
    }

    async fn insert_event(
        &self,
        access_token: &str,
        event: &NewCalendarEvent,
    ) -> Result<CreatedEvent, ProviderError> {
        let request = EventInsertRequest::from_event(event, self.config.create_meet_links);

        let mut query = vec![("sendUpdates", "all")];
        if self.config.create_meet_links {
            query.push(("conferenceDataVersion", "1"));
        }

        let response = self
            .client
            .post(&self.config.events_url)
            .query(&query)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: EventInsertResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::MalformedResponse(format!("event response: {}", e)))?;
        let created = CreatedEvent::from(parsed);
        info!("Created calendar event {}", created.event_id);
        Ok(created)
    }
}

impl CalendarProvider for GoogleCalendarProvider {
    fn provider_name(&self) -> &'static str {
        GOOGLE_PROVIDER
    }

    fn refresh_access_token(&self, refresh_token: &str) -> BoxFuture<'_, TokenGrant, ProviderError> {
        let refresh_token = refresh_token.to_string();
        Box::pin(async move { auth::refresh_access_token(&self.client, &self.config, &refresh_token).await })
    }

    fn get_busy_times(
        &self,
        access_token: &str,
        account: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<BusyInterval>, ProviderError> {
        let access_token = access_token.to_string();
        let account = account.to_string();
        Box::pin(async move { self.free_busy(&access_token, &account, start, end).await })
    }

    fn create_event(
        &self,
        access_token: &str,
        event: &NewCalendarEvent,
    ) -> BoxFuture<'_, CreatedEvent, ProviderError> {
        let access_token = access_token.to_string();
        let event = event.clone();
        Box::pin(async move { self.insert_event(&access_token, &event).await })
    }
}
