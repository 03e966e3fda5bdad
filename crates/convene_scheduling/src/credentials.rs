// --- File: crates/convene_scheduling/src/credentials.rs ---
//! Access-token lifecycle for participants' external calendar accounts.

use chrono::{DateTime, Duration, Utc};
use convene_common::models::ExternalCalendarCredential;
use convene_common::services::{CalendarProvider, CredentialStore};
use convene_common::{ProviderError, StoreError};
use convene_config::SchedulingConfig;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::CredentialError;
use crate::models::CalendarConnection;

/// A usable access token and the account it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub access_token: String,
    pub account_email: String,
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredential")
            .field("access_token", &"<redacted>")
            .field("account_email", &self.account_email)
            .finish()
    }
}

/// Returns valid access tokens, refreshing and persisting them when they are
/// about to expire.
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn CalendarProvider>,
    refresh_skew: Duration,
    refresh_timeout: std::time::Duration,
}

impl CredentialResolver {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn CalendarProvider>,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            store,
            provider,
            refresh_skew: Duration::minutes(config.refresh_skew_minutes),
            refresh_timeout: std::time::Duration::from_secs(config.fetch_timeout_secs.max(1)),
        }
    }

    pub async fn resolve(&self, owner_id: Uuid) -> Result<AccessCredential, CredentialError> {
        self.resolve_at(owner_id, Utc::now()).await
    }

    /// Like [`resolve`](Self::resolve) with an explicit clock.
    #[instrument(skip(self))]
    pub async fn resolve_at(
        &self,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AccessCredential, CredentialError> {
        let credential = self
            .store
            .get(owner_id, self.provider.provider_name())
            .await?
            .ok_or(CredentialError::NotConnected { owner_id })?;

        if credential.is_fresh(now, self.refresh_skew) {
            debug!("Using stored access token");
            return Ok(AccessCredential {
                access_token: credential.access_token,
                account_email: credential.account_email,
            });
        }

        let refreshed = self.refresh(credential, now).await?;
        Ok(AccessCredential {
            access_token: refreshed.access_token,
            account_email: refreshed.account_email,
        })
    }

    async fn refresh(
        &self,
        credential: ExternalCalendarCredential,
        now: DateTime<Utc>,
    ) -> Result<ExternalCalendarCredential, CredentialError> {
        let owner_id = credential.owner_id;
        let refresh_token = match credential.refresh_token.as_deref() {
            Some(token) if credential.has_refresh_token() => token.to_string(),
            _ => {
                warn!("Access token expired and no refresh token is stored");
                return Err(CredentialError::ReauthenticationRequired {
                    owner_id,
                    reason: "no refresh token stored".to_string(),
                });
            }
        };

        debug!("Access token expires at {}, refreshing", credential.expires_at);
        let grant = tokio::time::timeout(
            self.refresh_timeout,
            self.provider.refresh_access_token(&refresh_token),
        )
        .await
        .map_err(|_| CredentialError::RefreshFailed {
            owner_id,
            source: ProviderError::Transport("token refresh timed out".to_string()),
        })?
        .map_err(|source| match source {
            ProviderError::InvalidGrant(reason) => {
                CredentialError::ReauthenticationRequired { owner_id, reason }
            }
            source => CredentialError::RefreshFailed { owner_id, source },
        })?;

        let expires_at = Duration::try_seconds(grant.expires_in_secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| CredentialError::RefreshFailed {
                owner_id,
                source: ProviderError::MalformedResponse(format!(
                    "token lifetime of {} seconds is out of range",
                    grant.expires_in_secs
                )),
            })?;
        let updated = ExternalCalendarCredential {
            access_token: grant.access_token,
            expires_at,
            refresh_token: grant.refresh_token.or(credential.refresh_token),
            ..credential
        };
        self.store.save(&updated).await?;

        info!("Refreshed access token, valid until {}", updated.expires_at);
        Ok(updated)
    }

    /// Account email of an owner's connected calendar, without touching the
    /// access token.
    pub async fn connected_account(&self, owner_id: Uuid) -> Result<String, CredentialError> {
        self.store
            .get(owner_id, self.provider.provider_name())
            .await?
            .map(|credential| credential.account_email)
            .ok_or(CredentialError::NotConnected { owner_id })
    }

    /// Store a newly connected credential, replacing any previous one.
    pub async fn connect(&self, credential: &ExternalCalendarCredential) -> Result<(), StoreError> {
        self.store.save(credential).await
    }

    /// All calendars an owner has connected, across providers.
    pub async fn connected_accounts(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<CalendarConnection>, CredentialError> {
        let connections = self.store.list_for_owner(owner_id).await?;
        debug!("Owner {} has {} calendar connection(s)", owner_id, connections.len());
        Ok(connections.into_iter().map(CalendarConnection::from).collect())
    }

    /// Remove an owner's connection. Returns whether one existed.
    pub async fn disconnect(&self, owner_id: Uuid) -> Result<bool, StoreError> {
        self.store
            .delete(owner_id, self.provider.provider_name())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use convene_common::models::TokenGrant;
    use convene_db::InMemoryCredentialStore;
    use convene_gcal::mock::{ScriptedCalendarProvider, REFRESHED_TOKEN};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn credential(owner_id: Uuid, expires_at: DateTime<Utc>) -> ExternalCalendarCredential {
        ExternalCalendarCredential {
            owner_id,
            provider: "google".to_string(),
            access_token: "stored-token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at,
            account_email: "owner@example.com".to_string(),
        }
    }

    fn resolver(
        store: Arc<InMemoryCredentialStore>,
        provider: Arc<ScriptedCalendarProvider>,
    ) -> CredentialResolver {
        CredentialResolver::new(store, provider, &SchedulingConfig::default())
    }

    #[tokio::test]
    async fn fresh_token_is_returned_unchanged() {
        let owner = Uuid::new_v4();
        let store = Arc::new(InMemoryCredentialStore::with_credentials([credential(
            owner,
            now() + Duration::minutes(6),
        )]));
        let provider = Arc::new(ScriptedCalendarProvider::new());

        let resolved = resolver(store.clone(), provider.clone())
            .resolve_at(owner, now())
            .await
            .unwrap();

        assert_eq!(resolved.access_token, "stored-token");
        assert_eq!(resolved.account_email, "owner@example.com");
        assert_eq!(provider.refresh_calls(), 0);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn token_within_skew_is_refreshed_and_persisted() {
        let owner = Uuid::new_v4();
        let store = Arc::new(InMemoryCredentialStore::with_credentials([credential(
            owner,
            now() + Duration::minutes(4),
        )]));
        let provider = Arc::new(ScriptedCalendarProvider::new());

        let resolved = resolver(store.clone(), provider.clone())
            .resolve_at(owner, now())
            .await
            .unwrap();

        assert_eq!(resolved.access_token, REFRESHED_TOKEN);
        assert_eq!(provider.refresh_calls(), 1);

        let stored = store.get(owner, "google").await.unwrap().unwrap();
        assert_eq!(stored.access_token, REFRESHED_TOKEN);
        assert_eq!(stored.expires_at, now() + Duration::seconds(3600));
        // refresh token is kept when the provider does not rotate it
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let owner = Uuid::new_v4();
        let store = Arc::new(InMemoryCredentialStore::with_credentials([credential(
            owner,
            now() - Duration::hours(2),
        )]));
        let provider = Arc::new(ScriptedCalendarProvider::new().with_refresh_result(Ok(
            TokenGrant {
                access_token: "rotated-access".to_string(),
                expires_in_secs: 1800,
                refresh_token: Some("rotated-refresh".to_string()),
            },
        )));

        let resolved = resolver(store.clone(), provider.clone())
            .resolve_at(owner, now())
            .await
            .unwrap();

        assert_eq!(resolved.access_token, "rotated-access");
        let stored = store.get(owner, "google").await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("rotated-refresh"));
        assert_eq!(stored.expires_at, now() + Duration::minutes(30));
    }

    #[tokio::test]
    async fn out_of_range_token_lifetime_fails_without_saving() {
        let owner = Uuid::new_v4();
        let store = Arc::new(InMemoryCredentialStore::with_credentials([credential(
            owner,
            now() - Duration::minutes(1),
        )]));
        let provider = Arc::new(ScriptedCalendarProvider::new().with_refresh_result(Ok(
            TokenGrant {
                access_token: "rotated-access".to_string(),
                expires_in_secs: i64::MAX,
                refresh_token: None,
            },
        )));

        let err = resolver(store.clone(), provider)
            .resolve_at(owner, now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CredentialError::RefreshFailed {
                source: ProviderError::MalformedResponse(_),
                ..
            }
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn connected_accounts_hide_tokens_and_flag_missing_refresh() {
        let owner = Uuid::new_v4();
        let mut outlook = credential(owner, now() + Duration::hours(1));
        outlook.provider = "outlook".to_string();
        outlook.refresh_token = None;
        let store = Arc::new(InMemoryCredentialStore::with_credentials([
            credential(owner, now() + Duration::hours(1)),
            outlook,
            credential(Uuid::new_v4(), now()),
        ]));
        let resolver = resolver(store, Arc::new(ScriptedCalendarProvider::new()));

        let connections = resolver.connected_accounts(owner).await.unwrap();
        assert_eq!(
            connections,
            vec![
                CalendarConnection {
                    provider: "google".to_string(),
                    account_email: "owner@example.com".to_string(),
                    token_expires_at: now() + Duration::hours(1),
                    can_refresh: true,
                },
                CalendarConnection {
                    provider: "outlook".to_string(),
                    account_email: "owner@example.com".to_string(),
                    token_expires_at: now() + Duration::hours(1),
                    can_refresh: false,
                },
            ]
        );
        assert!(resolver.connected_accounts(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_is_not_connected() {
        let owner = Uuid::new_v4();
        let store = Arc::new(InMemoryCredentialStore::new());
        let provider = Arc::new(ScriptedCalendarProvider::new());

        let err = resolver(store, provider)
            .resolve_at(owner, now())
            .await
            .unwrap_err();
        assert_eq!(err, CredentialError::NotConnected { owner_id: owner });
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token_requires_reauthentication() {
        let owner = Uuid::new_v4();
        let mut stored = credential(owner, now() - Duration::minutes(1));
        stored.refresh_token = Some("  ".to_string());
        let store = Arc::new(InMemoryCredentialStore::with_credentials([stored]));
        let provider = Arc::new(ScriptedCalendarProvider::new());

        let err = resolver(store, provider.clone())
            .resolve_at(owner, now())
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::ReauthenticationRequired { .. }));
        assert_eq!(provider.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn revoked_refresh_token_requires_reauthentication() {
        let owner = Uuid::new_v4();
        let store = Arc::new(InMemoryCredentialStore::with_credentials([credential(
            owner,
            now() - Duration::minutes(1),
        )]));
        let provider = Arc::new(
            ScriptedCalendarProvider::new()
                .with_refresh_result(Err(ProviderError::InvalidGrant("invalid_grant".to_string()))),
        );

        let err = resolver(store.clone(), provider)
            .resolve_at(owner, now())
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::ReauthenticationRequired { .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn provider_outage_during_refresh_is_transient() {
        let owner = Uuid::new_v4();
        let store = Arc::new(InMemoryCredentialStore::with_credentials([credential(
            owner,
            now() - Duration::minutes(1),
        )]));
        let provider = Arc::new(ScriptedCalendarProvider::new().with_refresh_result(Err(
            ProviderError::Api {
                status: 503,
                body: "unavailable".to_string(),
            },
        )));

        let err = resolver(store, provider)
            .resolve_at(owner, now())
            .await
            .unwrap_err();
        match err {
            CredentialError::RefreshFailed { source, .. } => assert!(source.is_transient()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn disconnect_removes_the_connection() {
        let owner = Uuid::new_v4();
        let store = Arc::new(InMemoryCredentialStore::new());
        let provider = Arc::new(ScriptedCalendarProvider::new());
        let resolver = resolver(store, provider);

        resolver
            .connect(&credential(owner, now() + Duration::hours(1)))
            .await
            .unwrap();
        assert!(resolver.resolve_at(owner, now()).await.is_ok());

        assert!(resolver.disconnect(owner).await.unwrap());
        assert_eq!(
            resolver.resolve_at(owner, now()).await.unwrap_err(),
            CredentialError::NotConnected { owner_id: owner }
        );
    }
}
