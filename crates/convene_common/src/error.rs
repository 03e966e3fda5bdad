// --- File: crates/convene_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type for all Convene errors.
///
/// Crate-specific errors implement `From<SpecificError> for ConveneError` so
/// that the HTTP layer only has to know about this type.
#[derive(Error, Debug)]
pub enum ConveneError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during authentication or authorization
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
        retryable: bool,
    },

    /// Error occurred due to a conflict (e.g., a request that was already decided)
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to a timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for ConveneError {
    fn status_code(&self) -> u16 {
        match self {
            ConveneError::HttpError(_) => 500,
            ConveneError::ParseError(_) => 502,
            ConveneError::ConfigError(_) => 500,
            ConveneError::AuthError(_) => 401,
            ConveneError::ValidationError(_) => 400,
            ConveneError::DatabaseError(_) => 500,
            ConveneError::ExternalServiceError { retryable, .. } => {
                if *retryable {
                    503
                } else {
                    502
                }
            }
            ConveneError::ConflictError(_) => 409,
            ConveneError::NotFoundError(_) => 404,
            ConveneError::TimeoutError(_) => 504,
            ConveneError::InternalError(_) => 500,
        }
    }
}

/// Failures talking to an external calendar provider.
///
/// Messages carry the provider's status and payload, never the bearer token
/// or refresh token used for the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("calendar provider request failed: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("calendar provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider answered 2xx but the payload did not have the expected shape.
    #[error("malformed calendar provider response: {0}")]
    MalformedResponse(String),

    /// The refresh token was rejected; the owner has to connect again.
    #[error("calendar provider rejected the refresh token: {0}")]
    InvalidGrant(String),

    /// The call succeeded but the provider could not answer for this account
    /// (e.g. `notFound`, `backendError`).
    #[error("calendar provider could not query the account: {reason}")]
    AccountError { reason: String },
}

impl ProviderError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Api { status, .. } => *status >= 500 || *status == 429,
            ProviderError::AccountError { reason } => reason == "backendError",
            ProviderError::MalformedResponse(_) | ProviderError::InvalidGrant(_) => false,
        }
    }
}

impl From<ProviderError> for ConveneError {
    fn from(err: ProviderError) -> Self {
        let retryable = err.is_transient();
        match err {
            ProviderError::MalformedResponse(msg) => {
                ConveneError::ParseError(format!("calendar provider: {}", msg))
            }
            ProviderError::InvalidGrant(msg) => ConveneError::AuthError(format!(
                "calendar connection must be re-authorized: {}",
                msg
            )),
            other => ConveneError::ExternalServiceError {
                service_name: "calendar provider".to_string(),
                message: other.to_string(),
                retryable,
            },
        }
    }
}

/// Failure reported by a credential or booking store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("storage error: {0}")]
pub struct StoreError(pub String);

impl From<StoreError> for ConveneError {
    fn from(err: StoreError) -> Self {
        ConveneError::DatabaseError(err.0)
    }
}

// Common error conversions
impl From<reqwest::Error> for ConveneError {
    fn from(err: reqwest::Error) -> Self {
        ConveneError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for ConveneError {
    fn from(err: serde_json::Error) -> Self {
        ConveneError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for ConveneError {
    fn from(err: std::io::Error) -> Self {
        ConveneError::InternalError(err.to_string())
    }
}

pub fn config_error<T: fmt::Display>(message: T) -> ConveneError {
    ConveneError::ConfigError(message.to_string())
}
