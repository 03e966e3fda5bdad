// --- File: crates/convene_scheduling/src/models.rs ---
use chrono::{DateTime, NaiveDate, Utc};
use convene_common::models::{BusyInterval, ExternalCalendarCredential};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller's time-of-day preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePreference {
    Morning,
    Afternoon,
    Evening,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotPreferences {
    /// 08:00-18:00 instead of 06:00-23:00.
    #[serde(default)]
    pub business_hours_only: bool,
    #[serde(default)]
    pub time_preference: Option<TimePreference>,
    /// IANA name of the reference timezone for day and hour arithmetic.
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindSlotsRequest {
    pub participant_ids: Vec<Uuid>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub days_ahead: Option<i64>,
    /// First calendar day to search, in the reference timezone.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub preferences: SlotPreferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub score: i32,
    pub available_count: usize,
    pub total_participants: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    NotConnected,
    ReauthenticationRequired,
    ProviderUnavailable,
    TimedOut,
    Internal,
}

/// A participant whose busy time could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectedOwner {
    pub owner_id: Uuid,
    pub reason: DisconnectReason,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindSlotsResponse {
    pub slots: Vec<ScoredSlot>,
    pub connected_count: usize,
    pub disconnected_count: usize,
    pub total_participants: usize,
    pub disconnected_owners: Vec<DisconnectedOwner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub search_start: DateTime<Utc>,
    pub search_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerBusy {
    pub owner_id: Uuid,
    pub account_email: String,
    pub busy: Vec<BusyInterval>,
}

/// A connected calendar as shown to its owner. Tokens never leave the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarConnection {
    pub provider: String,
    pub account_email: String,
    pub token_expires_at: DateTime<Utc>,
    /// False once the owner has to reconnect after the access token expires.
    pub can_refresh: bool,
}

impl From<ExternalCalendarCredential> for CalendarConnection {
    fn from(credential: ExternalCalendarCredential) -> Self {
        let can_refresh = credential
            .refresh_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty());
        Self {
            provider: credential.provider,
            account_email: credential.account_email,
            token_expires_at: credential.expires_at,
            can_refresh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeBusyOverview {
    pub owners: Vec<OwnerBusy>,
    pub disconnected_owners: Vec<DisconnectedOwner>,
}
