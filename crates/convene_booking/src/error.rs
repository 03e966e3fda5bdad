use convene_common::{ConveneError, ProviderError, StoreError};
use convene_common::models::BookingStatus;
use convene_scheduling::CredentialError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Missing, invalid or expired approval token, or an actor that does not
    /// own the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid booking request: {0}")]
    MalformedInput(String),

    /// The request already left `pending`, or another decision is in flight.
    #[error("booking request {request_id} has already been decided ({status})")]
    AlreadyDecided { request_id: Uuid, status: BookingStatus },

    #[error("booking request {0} not found")]
    NotFound(Uuid),

    #[error("host {0} does not take bookings")]
    UnknownHost(Uuid),

    #[error("booking configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("creating the calendar event failed: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BookingError> for ConveneError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Unauthorized(_) => ConveneError::AuthError(err.to_string()),
            BookingError::MalformedInput(msg) => ConveneError::ValidationError(msg),
            BookingError::AlreadyDecided { .. } => ConveneError::ConflictError(err.to_string()),
            BookingError::NotFound(_) | BookingError::UnknownHost(_) => {
                ConveneError::NotFoundError(err.to_string())
            }
            BookingError::Configuration(msg) => ConveneError::ConfigError(msg),
            BookingError::Credential(inner) => inner.into(),
            BookingError::Provider(inner) => inner.into(),
            BookingError::Store(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convene_common::HttpStatusCode;

    #[test]
    fn booking_errors_map_to_http_statuses() {
        let id = Uuid::new_v4();
        let cases: Vec<(BookingError, u16)> = vec![
            (BookingError::Unauthorized("expired".into()), 401),
            (BookingError::MalformedInput("empty window".into()), 400),
            (
                BookingError::AlreadyDecided {
                    request_id: id,
                    status: BookingStatus::Scheduled,
                },
                409,
            ),
            (BookingError::NotFound(id), 404),
            (BookingError::UnknownHost(id), 404),
            (
                BookingError::Provider(ProviderError::Api {
                    status: 503,
                    body: "backend".into(),
                }),
                503,
            ),
            (
                BookingError::Credential(CredentialError::NotConnected { owner_id: id }),
                409,
            ),
        ];

        for (err, status) in cases {
            let converted: ConveneError = err.into();
            assert_eq!(converted.status_code(), status, "{}", converted);
        }
    }
}
