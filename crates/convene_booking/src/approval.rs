// --- File: crates/convene_booking/src/approval.rs ---
//! Signed, short-lived approval tokens for host decisions.
//!
//! A token binds the host, the host's contact email, the request and the
//! decision it may be used for. Nothing is persisted; a token is valid when
//! its HS256 signature checks out and it has not expired.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::Decision;

pub const APPROVAL_PURPOSE: &str = "booking_approval";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalClaims {
    /// Host id.
    pub sub: String,
    pub email: String,
    pub purpose: String,
    /// Booking request id.
    pub rid: String,
    pub decision: Decision,
    pub iat: i64,
    pub exp: i64,
}

impl ApprovalClaims {
    pub fn host_id(&self) -> Result<Uuid, BookingError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| BookingError::Unauthorized("approval token has an invalid subject".into()))
    }

    pub fn request_id(&self) -> Result<Uuid, BookingError> {
        Uuid::parse_str(&self.rid)
            .map_err(|_| BookingError::Unauthorized("approval token has an invalid request".into()))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Clone)]
pub struct ApprovalTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for ApprovalTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalTokens")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ApprovalTokens {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, BookingError> {
        if secret.trim().is_empty() {
            return Err(BookingError::Configuration(
                "booking signing secret is empty".to_string(),
            ));
        }
        if ttl <= Duration::zero() {
            return Err(BookingError::Configuration(
                "approval token lifetime must be positive".to_string(),
            ));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(
        &self,
        host_id: Uuid,
        contact_email: &str,
        request_id: Uuid,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), BookingError> {
        let expires_at = now + self.ttl;
        let claims = ApprovalClaims {
            sub: host_id.to_string(),
            email: contact_email.to_string(),
            purpose: APPROVAL_PURPOSE.to_string(),
            rid: request_id.to_string(),
            decision,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| BookingError::Configuration(format!("failed to sign approval token: {}", e)))?;
        Ok((token, expires_at))
    }

    /// Check signature, purpose and expiry against `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<ApprovalClaims, BookingError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let claims = decode::<ApprovalClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| BookingError::Unauthorized("invalid approval token".to_string()))?
            .claims;

        if claims.purpose != APPROVAL_PURPOSE {
            return Err(BookingError::Unauthorized(
                "token was not issued for booking approval".to_string(),
            ));
        }
        if now.timestamp() >= claims.exp {
            return Err(BookingError::Unauthorized("approval token has expired".to_string()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn tokens() -> ApprovalTokens {
        ApprovalTokens::new("test-signing-secret", Duration::minutes(15)).unwrap()
    }

    #[test]
    fn issued_token_verifies_with_its_bindings() {
        let (host, request) = (Uuid::new_v4(), Uuid::new_v4());
        let (token, expires_at) = tokens()
            .issue(host, "host@example.com", request, Decision::Accept, now())
            .unwrap();

        assert_eq!(expires_at, now() + Duration::minutes(15));
        let claims = tokens().verify(&token, now() + Duration::minutes(14)).unwrap();
        assert_eq!(claims.host_id().unwrap(), host);
        assert_eq!(claims.request_id().unwrap(), request);
        assert_eq!(claims.email, "host@example.com");
        assert_eq!(claims.purpose, APPROVAL_PURPOSE);
        assert_eq!(claims.decision, Decision::Accept);
        assert_eq!(claims.expires_at(), expires_at);
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let (token, _) = tokens()
            .issue(Uuid::new_v4(), "host@example.com", Uuid::new_v4(), Decision::Decline, now())
            .unwrap();
        let err = tokens().verify(&token, now() + Duration::minutes(15)).unwrap_err();
        assert_eq!(err, BookingError::Unauthorized("approval token has expired".into()));
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let other = ApprovalTokens::new("someone-else", Duration::minutes(15)).unwrap();
        let (token, _) = other
            .issue(Uuid::new_v4(), "host@example.com", Uuid::new_v4(), Decision::Accept, now())
            .unwrap();
        assert!(matches!(tokens().verify(&token, now()), Err(BookingError::Unauthorized(_))));
        assert!(matches!(tokens().verify("not-a-jwt", now()), Err(BookingError::Unauthorized(_))));
    }

    #[test]
    fn token_for_another_purpose_is_rejected() {
        let claims = ApprovalClaims {
            sub: Uuid::new_v4().to_string(),
            email: "host@example.com".into(),
            purpose: "password_reset".into(),
            rid: Uuid::new_v4().to_string(),
            decision: Decision::Accept,
            iat: now().timestamp(),
            exp: (now() + Duration::minutes(15)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-signing-secret"),
        )
        .unwrap();
        assert!(matches!(tokens().verify(&token, now()), Err(BookingError::Unauthorized(_))));
    }

    #[test]
    fn empty_secret_is_a_configuration_error() {
        assert!(matches!(
            ApprovalTokens::new("  ", Duration::minutes(15)),
            Err(BookingError::Configuration(_))
        ));
    }
}
