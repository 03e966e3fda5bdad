//! In-memory stores with the same contracts as the SQL repositories.
//!
//! Used by tests across the workspace and by single-process deployments that
//! do not need durability.

use chrono::{DateTime, Utc};
use convene_common::models::{BookingRequest, BookingStatus, ExternalCalendarCredential};
use convene_common::services::{BoxFuture, BookingStore, CredentialStore};
use convene_common::StoreError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError("in-memory store lock poisoned".to_string()))
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: Mutex<HashMap<(Uuid, String), ExternalCalendarCredential>>,
    writes: Mutex<usize>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `credentials`.
    pub fn with_credentials(credentials: impl IntoIterator<Item = ExternalCalendarCredential>) -> Self {
        let map = credentials
            .into_iter()
            .map(|c| ((c.owner_id, c.provider.clone()), c))
            .collect();
        Self {
            credentials: Mutex::new(map),
            writes: Mutex::new(0),
        }
    }

    /// Number of `save` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or_default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(
        &self,
        owner_id: Uuid,
        provider: &str,
    ) -> BoxFuture<'_, Option<ExternalCalendarCredential>, StoreError> {
        let key = (owner_id, provider.to_string());
        Box::pin(async move { Ok(lock(&self.credentials)?.get(&key).cloned()) })
    }

    fn save(&self, credential: &ExternalCalendarCredential) -> BoxFuture<'_, (), StoreError> {
        let credential = credential.clone();
        Box::pin(async move {
            lock(&self.credentials)?
                .insert((credential.owner_id, credential.provider.clone()), credential);
            *lock(&self.writes)? += 1;
            Ok(())
        })
    }

    fn delete(&self, owner_id: Uuid, provider: &str) -> BoxFuture<'_, bool, StoreError> {
        let key = (owner_id, provider.to_string());
        Box::pin(async move { Ok(lock(&self.credentials)?.remove(&key).is_some()) })
    }

    fn list_for_owner(
        &self,
        owner_id: Uuid,
    ) -> BoxFuture<'_, Vec<ExternalCalendarCredential>, StoreError> {
        Box::pin(async move {
            let mut owned: Vec<_> = lock(&self.credentials)?
                .values()
                .filter(|c| c.owner_id == owner_id)
                .cloned()
                .collect();
            owned.sort_by(|a, b| a.provider.cmp(&b.provider));
            Ok(owned)
        })
    }
}

#[derive(Debug, Clone)]
struct StoredRequest {
    request: BookingRequest,
    claimed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct InMemoryBookingStore {
    requests: Mutex<HashMap<Uuid, StoredRequest>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BookingStore for InMemoryBookingStore {
    fn create(&self, request: &BookingRequest) -> BoxFuture<'_, (), StoreError> {
        let request = request.clone();
        Box::pin(async move {
            let mut requests = lock(&self.requests)?;
            if requests.contains_key(&request.id) {
                return Err(StoreError(format!("booking request {} already exists", request.id)));
            }
            requests.insert(
                request.id,
                StoredRequest {
                    request,
                    claimed_at: None,
                },
            );
            Ok(())
        })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Option<BookingRequest>, StoreError> {
        Box::pin(async move { Ok(lock(&self.requests)?.get(&id).map(|s| s.request.clone())) })
    }

    fn list_pending_for_host(&self, host_id: Uuid) -> BoxFuture<'_, Vec<BookingRequest>, StoreError> {
        Box::pin(async move {
            let mut pending: Vec<BookingRequest> = lock(&self.requests)?
                .values()
                .filter(|s| s.request.host_id == host_id && s.request.status == BookingStatus::Pending)
                .map(|s| s.request.clone())
                .collect();
            pending.sort_by_key(|r| r.proposed_start);
            Ok(pending)
        })
    }

    fn claim_pending(
        &self,
        id: Uuid,
        claimed_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> BoxFuture<'_, bool, StoreError> {
        Box::pin(async move {
            let mut requests = lock(&self.requests)?;
            let Some(stored) = requests.get_mut(&id) else {
                return Ok(false);
            };
            let claim_is_live = stored.claimed_at.is_some_and(|at| at >= stale_before);
            if stored.request.status != BookingStatus::Pending || claim_is_live {
                return Ok(false);
            }
            stored.claimed_at = Some(claimed_at);
            Ok(true)
        })
    }

    fn complete_decision(
        &self,
        id: Uuid,
        status: BookingStatus,
        meeting_link: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> BoxFuture<'_, bool, StoreError> {
        Box::pin(async move {
            let mut requests = lock(&self.requests)?;
            match requests.get_mut(&id) {
                Some(stored) if stored.request.status == BookingStatus::Pending => {
                    stored.request.status = status;
                    stored.request.meeting_link = meeting_link;
                    stored.request.updated_at = decided_at;
                    stored.claimed_at = None;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn release_claim(&self, id: Uuid) -> BoxFuture<'_, (), StoreError> {
        Box::pin(async move {
            if let Some(stored) = lock(&self.requests)?.get_mut(&id) {
                stored.claimed_at = None;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request() -> BookingRequest {
        let now = Utc::now();
        BookingRequest {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            title: "Booking with Ada".to_string(),
            proposed_start: now + Duration::days(1),
            proposed_end: now + Duration::days(1) + Duration::minutes(30),
            timezone: "UTC".to_string(),
            status: BookingStatus::Pending,
            guest_name: "Ada".to_string(),
            guest_email: "ada@example.com".to_string(),
            meeting_link: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn claims_mirror_sql_semantics() {
        let store = InMemoryBookingStore::new();
        let req = request();
        store.create(&req).await.unwrap();

        let now = Utc::now();
        let stale_before = now - Duration::minutes(2);
        assert!(store.claim_pending(req.id, now, stale_before).await.unwrap());
        assert!(!store.claim_pending(req.id, now, stale_before).await.unwrap());
        // a later caller treats the old claim as abandoned
        assert!(store
            .claim_pending(req.id, now + Duration::minutes(5), now + Duration::minutes(3))
            .await
            .unwrap());

        assert!(store
            .complete_decision(req.id, BookingStatus::Cancelled, None, now)
            .await
            .unwrap());
        assert!(!store
            .complete_decision(req.id, BookingStatus::Scheduled, None, now)
            .await
            .unwrap());
        assert!(!store.claim_pending(req.id, now, now).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = InMemoryBookingStore::new();
        let req = request();
        store.create(&req).await.unwrap();
        assert!(store.create(&req).await.is_err());
    }

    #[tokio::test]
    async fn credential_writes_are_counted() {
        let owner = Uuid::new_v4();
        let store = InMemoryCredentialStore::new();
        let credential = ExternalCalendarCredential {
            owner_id: owner,
            provider: "google".to_string(),
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: Utc::now(),
            account_email: "o@example.com".to_string(),
        };
        store.save(&credential).await.unwrap();
        store.save(&credential).await.unwrap();

        assert_eq!(store.write_count(), 2);
        assert!(store.get(owner, "google").await.unwrap().is_some());
        assert!(store.delete(owner, "google").await.unwrap());
    }
}
