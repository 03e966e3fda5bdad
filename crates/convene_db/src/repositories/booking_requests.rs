//! SQL storage of booking requests.
//!
//! Status changes are conditional updates keyed on `status = 'pending'`, and a
//! decision in flight is marked through `claimed_at`, so concurrent accept or
//! decline calls for one request cannot both act on it.

use crate::error::DbError;
use crate::repositories::{decode_ts, decode_uuid, encode_ts};
use crate::DbClient;
use chrono::{DateTime, Utc};
use convene_common::models::{BookingRequest, BookingStatus};
use convene_common::services::{BoxFuture, BookingStore};
use convene_common::StoreError;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};
use uuid::Uuid;

const TABLE: &str = "booking_requests";

const SELECT_COLUMNS: &str = "id, host_id, title, proposed_start, proposed_end, timezone, status, \
     guest_name, guest_email, meeting_link, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct SqlBookingRequestRepository {
    db_client: DbClient,
}

impl SqlBookingRequestRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    /// Create the `booking_requests` table if it doesn't exist.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing booking request schema");

        let query = r#"
            CREATE TABLE IF NOT EXISTS booking_requests (
                id TEXT PRIMARY KEY,
                host_id TEXT NOT NULL,
                title TEXT NOT NULL,
                proposed_start TEXT NOT NULL,
                proposed_end TEXT NOT NULL,
                timezone TEXT NOT NULL,
                status TEXT NOT NULL,
                guest_name TEXT NOT NULL,
                guest_email TEXT NOT NULL,
                meeting_link TEXT,
                claimed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#;
        self.db_client.execute(query).await?;

        self.db_client
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_booking_requests_host_status \
                 ON booking_requests (host_id, status)",
            )
            .await?;

        info!("Booking request schema initialized successfully");
        Ok(())
    }

    pub async fn insert(&self, request: &BookingRequest) -> Result<(), DbError> {
        debug!("Inserting booking request {} for host {}", request.id, request.host_id);

        let query = r#"
            INSERT INTO booking_requests
                (id, host_id, title, proposed_start, proposed_end, timezone, status,
                 guest_name, guest_email, meeting_link, claimed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NULL, $11, $12)
        "#;

        sqlx::query(query)
            .bind(request.id.to_string())
            .bind(request.host_id.to_string())
            .bind(request.title.clone())
            .bind(encode_ts(request.proposed_start))
            .bind(encode_ts(request.proposed_end))
            .bind(request.timezone.clone())
            .bind(request.status.as_str())
            .bind(request.guest_name.clone())
            .bind(request.guest_email.clone())
            .bind(request.meeting_link.clone())
            .bind(encode_ts(request.created_at))
            .bind(encode_ts(request.updated_at))
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to insert booking request: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<BookingRequest>, DbError> {
        let query = format!("SELECT {} FROM booking_requests WHERE id = $1", SELECT_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load booking request: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        row.map(|row| request_from_row(&row)).transpose()
    }

    pub async fn find_pending_for_host(&self, host_id: Uuid) -> Result<Vec<BookingRequest>, DbError> {
        let query = format!(
            "SELECT {} FROM booking_requests WHERE host_id = $1 AND status = 'pending' \
             ORDER BY proposed_start ASC",
            SELECT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(host_id.to_string())
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to list booking requests: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        rows.iter().map(request_from_row).collect()
    }

    pub async fn try_claim(
        &self,
        id: Uuid,
        claimed_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let query = r#"
            UPDATE booking_requests
            SET claimed_at = $1
            WHERE id = $2
              AND status = 'pending'
              AND (claimed_at IS NULL OR claimed_at < $3)
        "#;

        let result = sqlx::query(query)
            .bind(encode_ts(claimed_at))
            .bind(id.to_string())
            .bind(encode_ts(stale_before))
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to claim booking request: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn finish(
        &self,
        id: Uuid,
        status: BookingStatus,
        meeting_link: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let query = r#"
            UPDATE booking_requests
            SET status = $1, meeting_link = $2, updated_at = $3, claimed_at = NULL
            WHERE id = $4 AND status = 'pending'
        "#;

        let result = sqlx::query(query)
            .bind(status.as_str())
            .bind(meeting_link)
            .bind(encode_ts(decided_at))
            .bind(id.to_string())
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to update booking request status: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn unclaim(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE booking_requests SET claimed_at = NULL WHERE id = $1")
            .bind(id.to_string())
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to release booking request claim: {}", e);
                DbError::QueryError(e.to_string())
            })?;
        Ok(())
    }
}

fn request_from_row(row: &AnyRow) -> Result<BookingRequest, DbError> {
    let id: String = row.try_get("id")?;
    let host_id: String = row.try_get("host_id")?;
    let proposed_start: String = row.try_get("proposed_start")?;
    let proposed_end: String = row.try_get("proposed_end")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(BookingRequest {
        id: decode_uuid(TABLE, &id)?,
        host_id: decode_uuid(TABLE, &host_id)?,
        title: row.try_get("title")?,
        proposed_start: decode_ts(TABLE, &proposed_start)?,
        proposed_end: decode_ts(TABLE, &proposed_end)?,
        timezone: row.try_get("timezone")?,
        status: status
            .parse::<BookingStatus>()
            .map_err(|message| DbError::DecodeError { table: TABLE, message })?,
        guest_name: row.try_get("guest_name")?,
        guest_email: row.try_get("guest_email")?,
        meeting_link: row.try_get("meeting_link")?,
        created_at: decode_ts(TABLE, &created_at)?,
        updated_at: decode_ts(TABLE, &updated_at)?,
    })
}

impl BookingStore for SqlBookingRequestRepository {
    fn create(&self, request: &BookingRequest) -> BoxFuture<'_, (), StoreError> {
        let request = request.clone();
        Box::pin(async move { Ok(self.insert(&request).await?) })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Option<BookingRequest>, StoreError> {
        Box::pin(async move { Ok(self.find(id).await?) })
    }

    fn list_pending_for_host(&self, host_id: Uuid) -> BoxFuture<'_, Vec<BookingRequest>, StoreError> {
        Box::pin(async move { Ok(self.find_pending_for_host(host_id).await?) })
    }

    fn claim_pending(
        &self,
        id: Uuid,
        claimed_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> BoxFuture<'_, bool, StoreError> {
        Box::pin(async move { Ok(self.try_claim(id, claimed_at, stale_before).await?) })
    }

    fn complete_decision(
        &self,
        id: Uuid,
        status: BookingStatus,
        meeting_link: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> BoxFuture<'_, bool, StoreError> {
        Box::pin(async move { Ok(self.finish(id, status, meeting_link, decided_at).await?) })
    }

    fn release_claim(&self, id: Uuid) -> BoxFuture<'_, (), StoreError> {
        Box::pin(async move { Ok(self.unclaim(id).await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::temp_db;
    use chrono::{Duration, TimeZone};

    fn request(host_id: Uuid, start_hour: u32) -> BookingRequest {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 3, 10, start_hour, 0, 0).unwrap();
        BookingRequest {
            id: Uuid::new_v4(),
            host_id,
            title: "Booking with Ada".to_string(),
            proposed_start: start,
            proposed_end: start + Duration::minutes(30),
            timezone: "Europe/Zurich".to_string(),
            status: BookingStatus::Pending,
            guest_name: "Ada".to_string(),
            guest_email: "ada@example.com".to_string(),
            meeting_link: None,
            created_at: created,
            updated_at: created,
        }
    }

    async fn repository() -> SqlBookingRequestRepository {
        let repo = SqlBookingRequestRepository::new(temp_db().await);
        repo.init_schema().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn create_then_get_returns_request() {
        let repo = repository().await;
        let req = request(Uuid::new_v4(), 9);
        repo.create(&req).await.unwrap();

        assert_eq!(repo.get(req.id).await.unwrap(), Some(req));
        assert_eq!(repo.get(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn pending_requests_are_listed_by_proposed_start() {
        let repo = repository().await;
        let host = Uuid::new_v4();
        let late = request(host, 15);
        let early = request(host, 9);
        let other_host = request(Uuid::new_v4(), 10);
        for req in [&late, &early, &other_host] {
            repo.create(req).await.unwrap();
        }

        let now = Utc::now();
        assert!(repo.claim_pending(late.id, now, now - Duration::minutes(2)).await.unwrap());
        assert!(repo
            .complete_decision(late.id, BookingStatus::Cancelled, None, now)
            .await
            .unwrap());

        let pending = repo.list_pending_for_host(host).await.unwrap();
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![early.id]);
    }

    #[tokio::test]
    async fn only_one_live_claim_is_granted() {
        let repo = repository().await;
        let req = request(Uuid::new_v4(), 9);
        repo.create(&req).await.unwrap();

        let now = Utc::now();
        let stale_before = now - Duration::minutes(2);
        assert!(repo.claim_pending(req.id, now, stale_before).await.unwrap());
        assert!(!repo.claim_pending(req.id, now, stale_before).await.unwrap());

        repo.release_claim(req.id).await.unwrap();
        assert!(repo.claim_pending(req.id, now, stale_before).await.unwrap());
    }

    #[tokio::test]
    async fn abandoned_claims_can_be_taken_over() {
        let repo = repository().await;
        let req = request(Uuid::new_v4(), 9);
        repo.create(&req).await.unwrap();

        let first = Utc::now() - Duration::minutes(10);
        assert!(repo
            .claim_pending(req.id, first, first - Duration::minutes(2))
            .await
            .unwrap());

        let now = Utc::now();
        assert!(repo.claim_pending(req.id, now, now - Duration::minutes(2)).await.unwrap());
    }

    #[tokio::test]
    async fn terminal_requests_do_not_transition_again() {
        let repo = repository().await;
        let req = request(Uuid::new_v4(), 9);
        repo.create(&req).await.unwrap();

        let now = Utc::now();
        assert!(repo.claim_pending(req.id, now, now - Duration::minutes(2)).await.unwrap());
        assert!(repo
            .complete_decision(
                req.id,
                BookingStatus::Scheduled,
                Some("https://meet.google.com/abc".to_string()),
                now,
            )
            .await
            .unwrap());

        assert!(!repo.claim_pending(req.id, now, now).await.unwrap());
        assert!(!repo
            .complete_decision(req.id, BookingStatus::Cancelled, None, now)
            .await
            .unwrap());

        let stored = repo.get(req.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Scheduled);
        assert_eq!(stored.meeting_link.as_deref(), Some("https://meet.google.com/abc"));
    }
}
