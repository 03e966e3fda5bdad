// --- File: crates/convene_common/src/http.rs ---
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{ConveneError, HttpStatusCode};

pub mod client;

/// Extension trait for ConveneError to convert it to an Axum HTTP response.
pub trait IntoHttpResponse {
    /// Converts the error into an Axum HTTP response.
    fn into_http_response(self) -> Response;
}

impl IntoHttpResponse for ConveneError {
    fn into_http_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "code": status_code.as_u16(),
            }
        }));

        (status_code, body).into_response()
    }
}

impl IntoResponse for ConveneError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

/// Converts a `Result<T, E>` into a JSON handler result, mapping the error
/// through `ConveneError`.
pub fn handle_json_result<T, E>(result: Result<T, E>) -> Result<Json<T>, Response>
where
    T: serde::Serialize,
    E: Into<ConveneError>,
{
    result.map(Json).map_err(|err| err.into().into_response())
}
