// --- File: crates/convene_scheduling/src/aggregator.rs ---
//! Concurrent, partial-failure tolerant busy-time collection.

use chrono::{DateTime, Utc};
use convene_common::services::CalendarProvider;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::credentials::CredentialResolver;
use crate::error::{CredentialError, SchedulingError};
use crate::models::{DisconnectReason, DisconnectedOwner, OwnerBusy};

/// Result of one fan-out: every requested owner ends up in exactly one of
/// the two lists, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub connected: Vec<OwnerBusy>,
    pub disconnected: Vec<DisconnectedOwner>,
}

impl Aggregation {
    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    pub fn disconnected_count(&self) -> usize {
        self.disconnected.len()
    }
}

impl DisconnectedOwner {
    pub fn from_error(owner_id: Uuid, err: &SchedulingError) -> Self {
        let reason = match err {
            SchedulingError::Credential(CredentialError::NotConnected { .. }) => {
                DisconnectReason::NotConnected
            }
            SchedulingError::Credential(CredentialError::ReauthenticationRequired { .. }) => {
                DisconnectReason::ReauthenticationRequired
            }
            SchedulingError::Credential(CredentialError::RefreshFailed { .. })
            | SchedulingError::Provider { .. } => DisconnectReason::ProviderUnavailable,
            SchedulingError::Timeout { .. } => DisconnectReason::TimedOut,
            SchedulingError::Credential(CredentialError::Store(_))
            | SchedulingError::MalformedInput(_) => DisconnectReason::Internal,
        };
        Self {
            owner_id,
            reason,
            detail: err.to_string(),
        }
    }
}

/// Fans free/busy lookups out over participants with bounded parallelism.
#[derive(Clone)]
pub struct Aggregator {
    resolver: Arc<CredentialResolver>,
    provider: Arc<dyn CalendarProvider>,
    max_parallel: usize,
    fetch_timeout: Duration,
}

impl Aggregator {
    pub fn new(
        resolver: Arc<CredentialResolver>,
        provider: Arc<dyn CalendarProvider>,
        max_parallel: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            provider,
            max_parallel: max_parallel.max(1),
            fetch_timeout,
        }
    }

    /// Resolve credentials and fetch busy intervals for one owner, bounded by
    /// the per-owner timeout.
    pub async fn fetch_one(
        &self,
        owner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<OwnerBusy, SchedulingError> {
        fetch_owner(
            self.resolver.clone(),
            self.provider.clone(),
            self.fetch_timeout,
            owner_id,
            start,
            end,
        )
        .await
    }

    /// Fetch busy time for every owner. Never fails as a whole: owners whose
    /// lookup fails are reported in [`Aggregation::disconnected`]. Duplicate
    /// ids are queried once.
    pub async fn fetch_all(
        &self,
        owner_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Aggregation {
        let mut seen = HashSet::new();
        let owners: Vec<Uuid> = owner_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        debug!(
            "Fetching busy times for {} owners (parallelism {})",
            owners.len(),
            self.max_parallel
        );

        let permits = Arc::new(Semaphore::new(self.max_parallel));
        let handles: Vec<_> = owners
            .iter()
            .map(|&owner_id| {
                let permits = permits.clone();
                let resolver = self.resolver.clone();
                let provider = self.provider.clone();
                let fetch_timeout = self.fetch_timeout;
                let handle = tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    fetch_owner(resolver, provider, fetch_timeout, owner_id, start, end).await
                });
                (owner_id, handle)
            })
            .collect();

        let mut aggregation = Aggregation::default();
        for (owner_id, handle) in handles {
            match handle.await {
                Ok(Ok(owner_busy)) => aggregation.connected.push(owner_busy),
                Ok(Err(err)) => {
                    warn!("Excluding owner {} from aggregation: {}", owner_id, err);
                    aggregation
                        .disconnected
                        .push(DisconnectedOwner::from_error(owner_id, &err));
                }
                Err(join_err) => {
                    warn!("Busy-time task for owner {} failed: {}", owner_id, join_err);
                    aggregation.disconnected.push(DisconnectedOwner {
                        owner_id,
                        reason: DisconnectReason::Internal,
                        detail: "busy-time task failed".to_string(),
                    });
                }
            }
        }

        info!(
            "Aggregated busy times: {} connected, {} disconnected",
            aggregation.connected_count(),
            aggregation.disconnected_count()
        );
        aggregation
    }
}

async fn fetch_owner(
    resolver: Arc<CredentialResolver>,
    provider: Arc<dyn CalendarProvider>,
    fetch_timeout: Duration,
    owner_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<OwnerBusy, SchedulingError> {
    let work = async {
        let credential = resolver.resolve(owner_id).await?;
        let busy = provider
            .get_busy_times(&credential.access_token, &credential.account_email, start, end)
            .await
            .map_err(|source| SchedulingError::Provider { owner_id, source })?;
        Ok(OwnerBusy {
            owner_id,
            account_email: credential.account_email,
            busy,
        })
    };

    tokio::time::timeout(fetch_timeout, work)
        .await
        .map_err(|_| SchedulingError::Timeout { owner_id })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use convene_common::models::{BusyInterval, ExternalCalendarCredential};
    use convene_common::ProviderError;
    use convene_config::SchedulingConfig;
    use convene_db::InMemoryCredentialStore;
    use convene_gcal::mock::ScriptedCalendarProvider;

    fn connected(owner_id: Uuid, email: &str) -> ExternalCalendarCredential {
        ExternalCalendarCredential {
            owner_id,
            provider: "google".to_string(),
            access_token: format!("token-{}", email),
            refresh_token: Some("refresh".to_string()),
            expires_at: Utc::now() + ChronoDuration::hours(1),
            account_email: email.to_string(),
        }
    }

    fn aggregator(
        credentials: Vec<ExternalCalendarCredential>,
        provider: Arc<ScriptedCalendarProvider>,
        timeout: Duration,
    ) -> Aggregator {
        let store = Arc::new(InMemoryCredentialStore::with_credentials(credentials));
        let resolver = Arc::new(CredentialResolver::new(
            store,
            provider.clone(),
            &SchedulingConfig::default(),
        ));
        Aggregator::new(resolver, provider, 2, timeout)
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 17, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn one_failing_owner_does_not_abort_the_rest() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let busy = BusyInterval::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap(),
        );
        let provider = Arc::new(
            ScriptedCalendarProvider::new()
                .with_busy("a@example.com", vec![busy])
                .with_busy_error(
                    "c@example.com",
                    ProviderError::Api {
                        status: 500,
                        body: "backend".to_string(),
                    },
                ),
        );
        let aggregator = aggregator(
            vec![
                connected(a, "a@example.com"),
                connected(b, "b@example.com"),
                connected(c, "c@example.com"),
            ],
            provider,
            Duration::from_secs(5),
        );

        let (start, end) = window();
        let result = aggregator.fetch_all(&[a, b, c], start, end).await;

        assert_eq!(result.connected_count(), 2);
        assert_eq!(result.disconnected_count(), 1);
        assert_eq!(result.connected[0].owner_id, a);
        assert_eq!(result.connected[0].busy, vec![busy]);
        assert_eq!(result.connected[1].owner_id, b);
        assert_eq!(result.disconnected[0].owner_id, c);
        assert_eq!(result.disconnected[0].reason, DisconnectReason::ProviderUnavailable);
    }

    #[tokio::test]
    async fn unconnected_owner_is_reported_not_failed() {
        let (a, stranger) = (Uuid::new_v4(), Uuid::new_v4());
        let provider = Arc::new(ScriptedCalendarProvider::new());
        let aggregator = aggregator(
            vec![connected(a, "a@example.com")],
            provider,
            Duration::from_secs(5),
        );

        let (start, end) = window();
        let result = aggregator.fetch_all(&[a, stranger, a], start, end).await;

        assert_eq!(result.connected_count(), 1);
        assert_eq!(
            result.disconnected,
            vec![DisconnectedOwner {
                owner_id: stranger,
                reason: DisconnectReason::NotConnected,
                detail: format!("owner {} has not connected a calendar", stranger),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_owner_times_out_without_stalling_others() {
        let (fast, slow) = (Uuid::new_v4(), Uuid::new_v4());
        let provider = Arc::new(
            ScriptedCalendarProvider::new().with_delay("slow@example.com", Duration::from_secs(60)),
        );
        let aggregator = aggregator(
            vec![
                connected(fast, "fast@example.com"),
                connected(slow, "slow@example.com"),
            ],
            provider,
            Duration::from_secs(2),
        );

        let (start, end) = window();
        let result = aggregator.fetch_all(&[fast, slow], start, end).await;

        assert_eq!(result.connected.len(), 1);
        assert_eq!(result.connected[0].owner_id, fast);
        assert_eq!(result.disconnected[0].owner_id, slow);
        assert_eq!(result.disconnected[0].reason, DisconnectReason::TimedOut);
    }

    #[tokio::test]
    async fn tokens_are_used_per_owner() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let provider = Arc::new(ScriptedCalendarProvider::new());
        let aggregator = aggregator(
            vec![connected(a, "a@example.com"), connected(b, "b@example.com")],
            provider.clone(),
            Duration::from_secs(5),
        );

        let (start, end) = window();
        aggregator.fetch_all(&[a, b], start, end).await;

        let mut calls = provider.busy_calls();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                ("token-a@example.com".to_string(), "a@example.com".to_string()),
                ("token-b@example.com".to_string(), "b@example.com".to_string()),
            ]
        );
    }
}
