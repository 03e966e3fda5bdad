//! SQL storage of external calendar credentials.

use crate::error::DbError;
use crate::repositories::{decode_ts, decode_uuid, encode_ts};
use crate::DbClient;
use convene_common::models::ExternalCalendarCredential;
use convene_common::services::{BoxFuture, CredentialStore};
use convene_common::StoreError;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};
use uuid::Uuid;

const TABLE: &str = "calendar_credentials";

#[derive(Debug, Clone)]
pub struct SqlCredentialRepository {
    db_client: DbClient,
}

impl SqlCredentialRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    /// Create the `calendar_credentials` table if it doesn't exist.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing calendar credential schema");

        let query = r#"
            CREATE TABLE IF NOT EXISTS calendar_credentials (
                owner_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                expires_at TEXT NOT NULL,
                account_email TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (owner_id, provider)
            )
        "#;

        self.db_client.execute(query).await?;

        info!("Calendar credential schema initialized successfully");
        Ok(())
    }

    pub async fn find(
        &self,
        owner_id: Uuid,
        provider: &str,
    ) -> Result<Option<ExternalCalendarCredential>, DbError> {
        let query = r#"
            SELECT owner_id, provider, access_token, refresh_token, expires_at, account_email
            FROM calendar_credentials
            WHERE owner_id = $1 AND provider = $2
        "#;

        let row = sqlx::query(query)
            .bind(owner_id.to_string())
            .bind(provider)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load calendar credential: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        row.map(|row| credential_from_row(&row)).transpose()
    }

    pub async fn upsert(&self, credential: &ExternalCalendarCredential) -> Result<(), DbError> {
        debug!(
            "Saving {} credential for owner {}",
            credential.provider, credential.owner_id
        );

        let query = r#"
            INSERT INTO calendar_credentials
                (owner_id, provider, access_token, refresh_token, expires_at, account_email, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (owner_id, provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                account_email = excluded.account_email,
                updated_at = excluded.updated_at
        "#;

        sqlx::query(query)
            .bind(credential.owner_id.to_string())
            .bind(credential.provider.clone())
            .bind(credential.access_token.clone())
            .bind(credential.refresh_token.clone())
            .bind(encode_ts(credential.expires_at))
            .bind(credential.account_email.clone())
            .bind(encode_ts(chrono::Utc::now()))
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to save calendar credential: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        Ok(())
    }

    pub async fn find_by_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ExternalCalendarCredential>, DbError> {
        let query = r#"
            SELECT owner_id, provider, access_token, refresh_token, expires_at, account_email
            FROM calendar_credentials
            WHERE owner_id = $1
            ORDER BY provider
        "#;

        let rows = sqlx::query(query)
            .bind(owner_id.to_string())
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to list calendar credentials: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        rows.iter().map(credential_from_row).collect()
    }

    pub async fn remove(&self, owner_id: Uuid, provider: &str) -> Result<bool, DbError> {
        let query = r#"
            DELETE FROM calendar_credentials
            WHERE owner_id = $1 AND provider = $2
        "#;

        let result = sqlx::query(query)
            .bind(owner_id.to_string())
            .bind(provider)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to delete calendar credential: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }
}

fn credential_from_row(row: &AnyRow) -> Result<ExternalCalendarCredential, DbError> {
    let owner_id: String = row.try_get("owner_id")?;
    let expires_at: String = row.try_get("expires_at")?;

    Ok(ExternalCalendarCredential {
        owner_id: decode_uuid(TABLE, &owner_id)?,
        provider: row.try_get("provider")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        expires_at: decode_ts(TABLE, &expires_at)?,
        account_email: row.try_get("account_email")?,
    })
}

impl CredentialStore for SqlCredentialRepository {
    fn get(
        &self,
        owner_id: Uuid,
        provider: &str,
    ) -> BoxFuture<'_, Option<ExternalCalendarCredential>, StoreError> {
        let provider = provider.to_string();
        Box::pin(async move { Ok(self.find(owner_id, &provider).await?) })
    }

    fn save(&self, credential: &ExternalCalendarCredential) -> BoxFuture<'_, (), StoreError> {
        let credential = credential.clone();
        Box::pin(async move { Ok(self.upsert(&credential).await?) })
    }

    fn delete(&self, owner_id: Uuid, provider: &str) -> BoxFuture<'_, bool, StoreError> {
        let provider = provider.to_string();
        Box::pin(async move { Ok(self.remove(owner_id, &provider).await?) })
    }

    fn list_for_owner(
        &self,
        owner_id: Uuid,
    ) -> BoxFuture<'_, Vec<ExternalCalendarCredential>, StoreError> {
        Box::pin(async move { Ok(self.find_by_owner(owner_id).await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::temp_db;
    use chrono::{Duration, TimeZone, Utc};

    fn credential(owner_id: Uuid) -> ExternalCalendarCredential {
        ExternalCalendarCredential {
            owner_id,
            provider: "google".to_string(),
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            expires_at: Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
            account_email: "host@example.com".to_string(),
        }
    }

    async fn repository() -> SqlCredentialRepository {
        let repo = SqlCredentialRepository::new(temp_db().await);
        repo.init_schema().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn save_then_get_returns_credential() {
        let repo = repository().await;
        let owner = Uuid::new_v4();
        repo.save(&credential(owner)).await.unwrap();

        let loaded = repo.get(owner, "google").await.unwrap().unwrap();
        assert_eq!(loaded, credential(owner));
        assert!(repo.get(owner, "outlook").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_existing_row_for_owner_and_provider() {
        let repo = repository().await;
        let owner = Uuid::new_v4();
        repo.save(&credential(owner)).await.unwrap();

        let mut refreshed = credential(owner);
        refreshed.access_token = "access-2".to_string();
        refreshed.expires_at += Duration::hours(1);
        refreshed.refresh_token = None;
        repo.save(&refreshed).await.unwrap();

        let loaded = repo.get(owner, "google").await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "access-2");
        assert_eq!(loaded.expires_at, refreshed.expires_at);
        assert_eq!(loaded.refresh_token, None);
    }

    #[tokio::test]
    async fn list_for_owner_returns_only_that_owners_connections() {
        let repo = repository().await;
        let (owner, other) = (Uuid::new_v4(), Uuid::new_v4());
        let mut outlook = credential(owner);
        outlook.provider = "outlook".to_string();
        outlook.account_email = "host@outlook.example".to_string();
        repo.save(&outlook).await.unwrap();
        repo.save(&credential(owner)).await.unwrap();
        repo.save(&credential(other)).await.unwrap();

        let listed = repo.list_for_owner(owner).await.unwrap();
        let providers: Vec<_> = listed.iter().map(|c| c.provider.as_str()).collect();
        assert_eq!(providers, vec!["google", "outlook"]);
        assert!(listed.iter().all(|c| c.owner_id == owner));
        assert!(repo.list_for_owner(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_existed() {
        let repo = repository().await;
        let owner = Uuid::new_v4();
        repo.save(&credential(owner)).await.unwrap();

        assert!(repo.delete(owner, "google").await.unwrap());
        assert!(!repo.delete(owner, "google").await.unwrap());
        assert!(repo.get(owner, "google").await.unwrap().is_none());
    }
}
