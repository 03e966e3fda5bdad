//! SQL repositories.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text so that string
//! comparison in SQL orders them chronologically on every backend.

pub mod booking_requests;
pub mod credentials;

pub use booking_requests::SqlBookingRequestRepository;
pub use credentials::SqlCredentialRepository;

use crate::error::DbError;
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(table: &'static str, raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DbError::DecodeError {
            table,
            message: format!("invalid timestamp '{}': {}", raw, e),
        })
}

pub(crate) fn decode_uuid(table: &'static str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::DecodeError {
        table,
        message: format!("invalid uuid '{}': {}", raw, e),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::DbClient;

    /// A fresh on-disk SQLite database under the system temp dir.
    pub async fn temp_db() -> DbClient {
        let path = std::env::temp_dir()
            .join(format!("convene-db-test-{}.db", uuid::Uuid::new_v4()));
        DbClient::from_url(&format!("sqlite:{}", path.display()))
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoded_timestamps_sort_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        assert!(encode_ts(earlier) < encode_ts(later));
        assert_eq!(decode_ts("t", &encode_ts(later)).unwrap(), later);
    }

    #[test]
    fn bad_values_become_decode_errors() {
        assert!(matches!(
            decode_ts("t", "yesterday"),
            Err(DbError::DecodeError { table: "t", .. })
        ));
        assert!(decode_uuid("t", "not-a-uuid").is_err());
    }
}
