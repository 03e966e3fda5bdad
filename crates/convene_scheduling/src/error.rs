// --- File: crates/convene_scheduling/src/error.rs ---
use convene_common::{ConveneError, ProviderError, StoreError};
use thiserror::Error;
use uuid::Uuid;

/// Why a participant's credential could not be turned into an access token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No stored credential for this owner and provider.
    #[error("owner {owner_id} has not connected a calendar")]
    NotConnected { owner_id: Uuid },

    /// Permanent: the owner has to connect their calendar again.
    #[error("calendar connection of owner {owner_id} must be re-authorized: {reason}")]
    ReauthenticationRequired { owner_id: Uuid, reason: String },

    /// The refresh call failed; retrying later may succeed.
    #[error("refreshing the access token of owner {owner_id} failed: {source}")]
    RefreshFailed {
        owner_id: Uuid,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CredentialError> for ConveneError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotConnected { .. } | CredentialError::ReauthenticationRequired { .. } => {
                ConveneError::ConflictError(err.to_string())
            }
            CredentialError::RefreshFailed { ref source, .. } => ConveneError::ExternalServiceError {
                service_name: "calendar token refresh".to_string(),
                retryable: source.is_transient(),
                message: err.to_string(),
            },
            CredentialError::Store(store) => store.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// Rejected before any external call was made.
    #[error("invalid request: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("fetching busy times for owner {owner_id} failed: {source}")]
    Provider {
        owner_id: Uuid,
        #[source]
        source: ProviderError,
    },

    #[error("fetching busy times for owner {owner_id} timed out")]
    Timeout { owner_id: Uuid },
}

impl From<SchedulingError> for ConveneError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::MalformedInput(msg) => ConveneError::ValidationError(msg),
            SchedulingError::Credential(inner) => inner.into(),
            SchedulingError::Provider { source, .. } => source.into(),
            SchedulingError::Timeout { .. } => ConveneError::TimeoutError(err.to_string()),
        }
    }
}
