// --- File: crates/convene_booking/src/service.rs ---
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use convene_common::models::{BookingRequest, BookingStatus, CreatedEvent, NewCalendarEvent};
use convene_common::services::{BookingStore, CalendarProvider};
use convene_common::{log_error, log_result};
use convene_config::BookingConfig;
use convene_scheduling::{CredentialError, CredentialResolver};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::approval::ApprovalTokens;
use crate::error::BookingError;
use crate::models::{ApprovalLinks, Decision, ProposeBooking};
use crate::notifications::{BookingNotification, NotificationDispatcher};

/// Booking request lifecycle: `pending -> scheduled | cancelled`.
///
/// Decisions claim the request in the store first, so concurrent accepts and
/// declines on one request cannot both go through, and an accepted request
/// gets exactly one calendar event.
#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    resolver: Arc<CredentialResolver>,
    provider: Arc<dyn CalendarProvider>,
    tokens: ApprovalTokens,
    notifier: NotificationDispatcher,
    config: BookingConfig,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        resolver: Arc<CredentialResolver>,
        provider: Arc<dyn CalendarProvider>,
        notifier: NotificationDispatcher,
        config: BookingConfig,
    ) -> Result<Self, BookingError> {
        let tokens = ApprovalTokens::new(
            &config.signing_secret,
            Duration::minutes(config.approval_ttl_minutes),
        )?;
        Ok(Self {
            store,
            resolver,
            provider,
            tokens,
            notifier,
            config,
        })
    }

    pub fn tokens(&self) -> &ApprovalTokens {
        &self.tokens
    }

    pub async fn propose_booking(
        &self,
        host_id: Uuid,
        proposal: ProposeBooking,
    ) -> Result<BookingRequest, BookingError> {
        self.propose_booking_at(host_id, proposal, Utc::now()).await
    }

    /// Store a pending request and send the host approval links.
    #[instrument(skip(self, proposal), fields(guest = %proposal.guest_email))]
    pub async fn propose_booking_at(
        &self,
        host_id: Uuid,
        proposal: ProposeBooking,
        now: DateTime<Utc>,
    ) -> Result<BookingRequest, BookingError> {
        let guest_name = proposal.guest_name.trim().to_string();
        let guest_email = proposal.guest_email.trim().to_string();
        if guest_name.is_empty() {
            return Err(BookingError::MalformedInput("guest name is required".to_string()));
        }
        if !looks_like_email(&guest_email) {
            return Err(BookingError::MalformedInput(format!(
                "'{}' is not an email address",
                guest_email
            )));
        }
        if proposal.end <= proposal.start {
            return Err(BookingError::MalformedInput(
                "proposed end must be after its start".to_string(),
            ));
        }
        let timezone = proposal
            .timezone
            .as_deref()
            .map(str::trim)
            .filter(|tz| !tz.is_empty())
            .unwrap_or(self.config.default_timezone.as_str())
            .to_string();
        if timezone.parse::<Tz>().is_err() {
            return Err(BookingError::MalformedInput(format!(
                "unknown timezone '{}'",
                timezone
            )));
        }

        let host_email = match self.resolver.connected_account(host_id).await {
            Ok(email) => email,
            Err(CredentialError::NotConnected { .. }) => return Err(BookingError::UnknownHost(host_id)),
            Err(e) => return Err(e.into()),
        };

        let title = proposal
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Booking with {}", guest_name));

        let request = BookingRequest {
            id: Uuid::new_v4(),
            host_id,
            title,
            proposed_start: proposal.start,
            proposed_end: proposal.end,
            timezone,
            status: BookingStatus::Pending,
            guest_name,
            guest_email,
            meeting_link: None,
            created_at: now,
            updated_at: now,
        };
        self.store.create(&request).await?;
        info!("Created booking request {} for host {}", request.id, host_id);

        let links = self.approval_links(&request, &host_email, now)?;
        self.notifier.dispatch(BookingNotification::BookingRequested {
            host_email,
            request: request.clone(),
            links,
        });

        Ok(request)
    }

    /// Issue accept and decline links for a request.
    pub fn approval_links(
        &self,
        request: &BookingRequest,
        host_email: &str,
        now: DateTime<Utc>,
    ) -> Result<ApprovalLinks, BookingError> {
        let base = self.config.public_base_url.trim_end_matches('/');
        let (accept, expires_at) =
            self.tokens
                .issue(request.host_id, host_email, request.id, Decision::Accept, now)?;
        let (decline, _) =
            self.tokens
                .issue(request.host_id, host_email, request.id, Decision::Decline, now)?;
        Ok(ApprovalLinks {
            accept_url: format!("{}/api/booking/requests/{}/accept?token={}", base, request.id, accept),
            decline_url: format!("{}/api/booking/requests/{}/decline?token={}", base, request.id, decline),
            expires_at,
        })
    }

    pub async fn decide_booking(
        &self,
        request_id: Uuid,
        token: &str,
        decision: Decision,
    ) -> Result<BookingRequest, BookingError> {
        self.decide_booking_at(request_id, token, decision, Utc::now()).await
    }

    /// Decide a request through an approval link.
    #[instrument(skip(self, token))]
    pub async fn decide_booking_at(
        &self,
        request_id: Uuid,
        token: &str,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<BookingRequest, BookingError> {
        let claims = self.tokens.verify(token, now)?;
        if claims.request_id()? != request_id || claims.decision != decision {
            warn!("Approval token does not match request {} / {}", request_id, decision);
            return Err(BookingError::Unauthorized(
                "approval token was issued for a different action".to_string(),
            ));
        }

        let request = self.load(request_id).await?;
        if claims.host_id()? != request.host_id {
            warn!("Approval token host does not own request {}", request_id);
            return Err(BookingError::Unauthorized(
                "approval token does not belong to the request's host".to_string(),
            ));
        }

        self.apply_decision(request, decision, now).await
    }

    pub async fn decide_booking_as_host(
        &self,
        host_id: Uuid,
        request_id: Uuid,
        decision: Decision,
    ) -> Result<BookingRequest, BookingError> {
        self.decide_booking_as_host_at(host_id, request_id, decision, Utc::now())
            .await
    }

    /// Decide a request on behalf of an already authenticated host.
    #[instrument(skip(self))]
    pub async fn decide_booking_as_host_at(
        &self,
        host_id: Uuid,
        request_id: Uuid,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<BookingRequest, BookingError> {
        let request = self.load(request_id).await?;
        if request.host_id != host_id {
            return Err(BookingError::Unauthorized(
                "only the host can decide this request".to_string(),
            ));
        }
        self.apply_decision(request, decision, now).await
    }

    /// Pending requests of a host, earliest proposed start first.
    pub async fn list_pending_requests(&self, host_id: Uuid) -> Result<Vec<BookingRequest>, BookingError> {
        Ok(self.store.list_pending_for_host(host_id).await?)
    }

    async fn load(&self, request_id: Uuid) -> Result<BookingRequest, BookingError> {
        self.store
            .get(request_id)
            .await?
            .ok_or(BookingError::NotFound(request_id))
    }

    async fn apply_decision(
        &self,
        request: BookingRequest,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<BookingRequest, BookingError> {
        if request.status.is_terminal() {
            return Err(BookingError::AlreadyDecided {
                request_id: request.id,
                status: request.status,
            });
        }
        if decision == Decision::Accept && !request.has_valid_window() {
            return Err(BookingError::MalformedInput(
                "request has an empty time window".to_string(),
            ));
        }

        let stale_before = now - Duration::seconds(self.config.decision_claim_ttl_secs);
        if !self.store.claim_pending(request.id, now, stale_before).await? {
            info!("Booking request {} is already being decided", request.id);
            return Err(self.already_decided(request.id).await);
        }

        let (status, meeting_link) = match decision {
            Decision::Accept => match self.create_event(&request).await {
                Ok(created) => {
                    info!("Created calendar event {} for request {}", created.event_id, request.id);
                    (BookingStatus::Scheduled, created.meeting_link)
                }
                Err(e) => {
                    log_error(&e, &format!("Creating the event for request {} failed", request.id));
                    let _ = log_result(
                        self.store.release_claim(request.id).await,
                        &format!("Released claim on request {}", request.id),
                        &format!("Failed to release claim on request {}", request.id),
                    );
                    return Err(e);
                }
            },
            Decision::Decline => (BookingStatus::Cancelled, None),
        };

        if !self
            .store
            .complete_decision(request.id, status, meeting_link.clone(), now)
            .await?
        {
            return Err(self.already_decided(request.id).await);
        }

        let decided = BookingRequest {
            status,
            meeting_link,
            updated_at: now,
            ..request
        };
        info!("Booking request {} is now {}", decided.id, decided.status);

        self.notifier.dispatch(match status {
            BookingStatus::Scheduled => BookingNotification::BookingConfirmed {
                request: decided.clone(),
            },
            _ => BookingNotification::BookingDeclined {
                request: decided.clone(),
            },
        });

        Ok(decided)
    }

    async fn create_event(&self, request: &BookingRequest) -> Result<CreatedEvent, BookingError> {
        let credential = self.resolver.resolve(request.host_id).await?;
        let event = NewCalendarEvent {
            summary: request.title.clone(),
            description: Some(format!(
                "Booked by {} <{}>",
                request.guest_name, request.guest_email
            )),
            start: request.proposed_start,
            end: request.proposed_end,
            timezone: request.timezone.clone(),
            attendees: vec![request.guest_email.clone(), credential.account_email.clone()],
        };
        Ok(self
            .provider
            .create_event(&credential.access_token, &event)
            .await?)
    }

    async fn already_decided(&self, request_id: Uuid) -> BookingError {
        let status = match self.store.get(request_id).await {
            Ok(Some(current)) => current.status,
            Ok(None) => return BookingError::NotFound(request_id),
            Err(e) => return e.into(),
        };
        BookingError::AlreadyDecided { request_id, status }
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::looks_like_email;

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("ada@example.com"));
        assert!(!looks_like_email("ada"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ada@"));
        assert!(!looks_like_email("ada lovelace@example.com"));
    }
}
