// File: crates/convene_gcal/src/auth.rs
//! OAuth refresh-token exchange against Google's token endpoint.

use convene_common::models::TokenGrant;
use convene_common::ProviderError;
use convene_config::GoogleConfig;
use reqwest::Client;
use tracing::{debug, warn};

use crate::payloads::{RefreshTokenForm, TokenResponse};
use crate::provider::{transport_error, truncate_body};

/// Exchange `refresh_token` for a new access token.
///
/// `invalid_grant` (revoked or expired refresh token) maps to
/// [`ProviderError::InvalidGrant`]; every other non-success answer keeps its
/// status and payload.
pub async fn refresh_access_token(
    client: &Client,
    config: &GoogleConfig,
    refresh_token: &str,
) -> Result<TokenGrant, ProviderError> {
    debug!("Refreshing Google access token");

    let form = RefreshTokenForm {
        client_id: &config.client_id,
        client_secret: &config.client_secret,
        refresh_token,
        grant_type: "refresh_token",
    };

    let response = client
        .post(&config.token_url)
        .form(&form)
        .send()
        .await
        .map_err(transport_error)?;

    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        let parsed = serde_json::from_str::<TokenResponse>(&body).ok();
        if let Some(token_error) = parsed.as_ref().and_then(|r| r.error.as_deref()) {
            if token_error == "invalid_grant" {
                let message = parsed
                    .as_ref()
                    .and_then(TokenResponse::error_message)
                    .unwrap_or_else(|| token_error.to_string());
                warn!("Google rejected refresh token: {}", message);
                return Err(ProviderError::InvalidGrant(message));
            }
        }
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    serde_json::from_str::<TokenResponse>(&body)
        .map_err(|e| ProviderError::MalformedResponse(format!("token response: {}", e)))?
        .into_grant()
}
