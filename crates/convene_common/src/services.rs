// --- File: crates/convene_common/src/services.rs ---
//! Service abstractions for external collaborators.
//!
//! The scheduling and booking crates only talk to calendars, storage and
//! notification delivery through these traits, so each can be swapped for an
//! in-memory or test double.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

use crate::error::{ConveneError, ProviderError, StoreError};
use crate::models::{
    BookingRequest, BookingStatus, BusyInterval, CreatedEvent, ExternalCalendarCredential,
    NewCalendarEvent, TokenGrant,
};

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// An external calendar provider (free/busy, event insert, OAuth refresh).
pub trait CalendarProvider: Send + Sync {
    /// Key under which this provider's credentials are stored.
    fn provider_name(&self) -> &'static str;

    /// Exchange a refresh token for a new access token.
    fn refresh_access_token(&self, refresh_token: &str) -> BoxFuture<'_, TokenGrant, ProviderError>;

    /// Busy intervals for `account` within `[start, end)`. No internal retries.
    fn get_busy_times(
        &self,
        access_token: &str,
        account: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<BusyInterval>, ProviderError>;

    /// Create an event on the primary calendar of the token's owner.
    fn create_event(
        &self,
        access_token: &str,
        event: &NewCalendarEvent,
    ) -> BoxFuture<'_, CreatedEvent, ProviderError>;
}

/// Persistent store of external calendar credentials, one per (owner, provider).
pub trait CredentialStore: Send + Sync {
    fn get(
        &self,
        owner_id: Uuid,
        provider: &str,
    ) -> BoxFuture<'_, Option<ExternalCalendarCredential>, StoreError>;

    /// Insert or replace the credential for its (owner, provider).
    fn save(&self, credential: &ExternalCalendarCredential) -> BoxFuture<'_, (), StoreError>;

    /// Remove a connection. Returns whether a row existed.
    fn delete(&self, owner_id: Uuid, provider: &str) -> BoxFuture<'_, bool, StoreError>;

    /// Every connection of an owner, ordered by provider.
    fn list_for_owner(
        &self,
        owner_id: Uuid,
    ) -> BoxFuture<'_, Vec<ExternalCalendarCredential>, StoreError>;
}

/// Persistent store of booking requests.
///
/// Decisions go through `claim_pending` so only one caller at a time can act
/// on a request, and `complete_decision` only moves requests that are still
/// pending.
pub trait BookingStore: Send + Sync {
    fn create(&self, request: &BookingRequest) -> BoxFuture<'_, (), StoreError>;

    fn get(&self, id: Uuid) -> BoxFuture<'_, Option<BookingRequest>, StoreError>;

    /// Pending requests of a host, earliest proposed start first.
    fn list_pending_for_host(&self, host_id: Uuid) -> BoxFuture<'_, Vec<BookingRequest>, StoreError>;

    /// Claim a pending request for a decision. A claim made before
    /// `stale_before` is treated as abandoned. Returns false if the request is
    /// not pending or someone else holds a live claim.
    fn claim_pending(
        &self,
        id: Uuid,
        claimed_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> BoxFuture<'_, bool, StoreError>;

    /// Move a pending request to a terminal status and clear its claim.
    /// Returns false if the request was no longer pending.
    fn complete_decision(
        &self,
        id: Uuid,
        status: BookingStatus,
        meeting_link: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> BoxFuture<'_, bool, StoreError>;

    /// Drop a claim without changing the status.
    fn release_claim(&self, id: Uuid) -> BoxFuture<'_, (), StoreError>;
}

/// Outbound notification delivery.
pub trait NotificationService: Send + Sync {
    /// Send a plain-text email.
    fn send_email(&self, to: &str, subject: &str, body: &str) -> BoxFuture<'_, (), ConveneError>;
}
