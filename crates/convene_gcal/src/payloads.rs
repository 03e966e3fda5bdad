// --- File: crates/convene_gcal/src/payloads.rs ---
//! Typed request and response bodies for the Google Calendar and OAuth APIs.

use chrono::{DateTime, Utc};
use convene_common::models::{BusyInterval, CreatedEvent, NewCalendarEvent, TokenGrant};
use convene_common::ProviderError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Used when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Longest access-token lifetime accepted from the token endpoint.
pub const MAX_EXPIRES_IN_SECS: i64 = 86_400;

// --- free/busy ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeBusyRequest {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
    pub time_zone: String,
    pub items: Vec<FreeBusyItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreeBusyItem {
    pub id: String,
}

impl FreeBusyRequest {
    pub fn for_account(account: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            time_min: start,
            time_max: end,
            time_zone: "UTC".to_string(),
            items: vec![FreeBusyItem {
                id: account.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeBusyResponse {
    pub calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeBusyCalendar {
    #[serde(default)]
    pub busy: Vec<TimePeriod>,
    #[serde(default)]
    pub errors: Vec<CalendarError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarError {
    #[serde(default)]
    pub domain: Option<String>,
    pub reason: String,
}

impl FreeBusyResponse {
    /// Busy intervals reported for `account`, in arrival order.
    pub fn into_busy_intervals(mut self, account: &str) -> Result<Vec<BusyInterval>, ProviderError> {
        let calendar = self.calendars.remove(account).ok_or_else(|| {
            ProviderError::MalformedResponse(format!("no free/busy entry for calendar '{}'", account))
        })?;

        if let Some(error) = calendar.errors.first() {
            return Err(ProviderError::AccountError {
                reason: error.reason.clone(),
            });
        }

        calendar
            .busy
            .into_iter()
            .map(|period| {
                if period.end <= period.start {
                    Err(ProviderError::MalformedResponse(format!(
                        "busy period ends before it starts ({} - {})",
                        period.start, period.end
                    )))
                } else {
                    Ok(BusyInterval::new(period.start, period.end))
                }
            })
            .collect()
    }
}

// --- events ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInsertRequest {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub attendees: Vec<EventAttendee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conference_data: Option<ConferenceDataRequest>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: DateTime<Utc>,
    pub time_zone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventAttendee {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceDataRequest {
    pub create_request: CreateConferenceRequest,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConferenceRequest {
    pub request_id: String,
    pub conference_solution_key: ConferenceSolutionKey,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConferenceSolutionKey {
    #[serde(rename = "type")]
    pub kind: String,
}

impl EventInsertRequest {
    pub fn from_event(event: &NewCalendarEvent, with_meet_link: bool) -> Self {
        Self {
            summary: event.summary.clone(),
            description: event.description.clone(),
            start: EventDateTime {
                date_time: event.start,
                time_zone: event.timezone.clone(),
            },
            end: EventDateTime {
                date_time: event.end,
                time_zone: event.timezone.clone(),
            },
            attendees: event
                .attendees
                .iter()
                .map(|email| EventAttendee {
                    email: email.clone(),
                })
                .collect(),
            conference_data: with_meet_link.then(|| ConferenceDataRequest {
                create_request: CreateConferenceRequest {
                    request_id: uuid::Uuid::new_v4().to_string(),
                    conference_solution_key: ConferenceSolutionKey {
                        kind: "hangoutsMeet".to_string(),
                    },
                },
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInsertResponse {
    pub id: String,
    #[serde(default)]
    pub hangout_link: Option<String>,
    #[serde(default)]
    pub conference_data: Option<ConferenceDataResponse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceDataResponse {
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub entry_point_type: String,
    pub uri: String,
}

impl From<EventInsertResponse> for CreatedEvent {
    fn from(response: EventInsertResponse) -> Self {
        let video_entry = response.conference_data.and_then(|data| {
            data.entry_points
                .into_iter()
                .find(|entry| entry.entry_point_type == "video")
                .map(|entry| entry.uri)
        });
        CreatedEvent {
            event_id: response.id,
            meeting_link: response.hangout_link.or(video_entry),
        }
    }
}

// --- OAuth token endpoint ---

#[derive(Debug, Clone, Serialize)]
pub struct RefreshTokenForm<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub refresh_token: &'a str,
    pub grant_type: &'static str,
}

/// Successful and failed token responses share one shape on the wire.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|error| match &self.error_description {
            Some(description) => format!("{}: {}", error, description),
            None => error.clone(),
        })
    }

    pub fn into_grant(self) -> Result<TokenGrant, ProviderError> {
        if let Some(message) = self.error_message() {
            return Err(ProviderError::MalformedResponse(format!(
                "token endpoint returned an error with a success status: {}",
                message
            )));
        }
        let access_token = self
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ProviderError::MalformedResponse("token response has no access_token".to_string())
            })?;
        let expires_in_secs = match self.expires_in {
            Some(secs) if secs > MAX_EXPIRES_IN_SECS => {
                return Err(ProviderError::MalformedResponse(format!(
                    "token response expires_in of {} seconds exceeds {}",
                    secs, MAX_EXPIRES_IN_SECS
                )));
            }
            Some(secs) if secs > 0 => secs,
            _ => DEFAULT_EXPIRES_IN_SECS,
        };
        Ok(TokenGrant {
            access_token,
            expires_in_secs,
            refresh_token: self.refresh_token.filter(|token| !token.is_empty()),
        })
    }
}
