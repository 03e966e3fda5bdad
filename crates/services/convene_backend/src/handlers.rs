// --- File: crates/services/convene_backend/src/handlers.rs ---
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use convene_booking::{Decision, ProposeBooking};
use convene_common::models::BookingRequest;
use convene_common::{handle_json_result, ConveneError};
use convene_scheduling::{
    CalendarConnection, FindSlotsRequest, FindSlotsResponse, FreeBusyOverview,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app_state::AppState;

/// Header carrying the authenticated user id, set by the fronting proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<bool>,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match &state.db {
        Some(db) => Some(db.is_healthy().await),
        None => None,
    };
    Json(HealthResponse {
        status: "ok",
        database,
    })
}

pub async fn find_slots_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FindSlotsRequest>,
) -> Result<Json<FindSlotsResponse>, Response> {
    handle_json_result(state.scheduling.find_available_slots(&request).await)
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FreeBusyRequest {
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub owner_ids: Vec<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// With a single `ownerId` credential and provider errors are returned as
/// errors; with `ownerIds` unreachable owners are listed in the response.
pub async fn free_busy_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FreeBusyRequest>,
) -> Result<Json<FreeBusyOverview>, ConveneError> {
    match (request.owner_id, request.owner_ids.is_empty()) {
        (Some(owner_id), true) => {
            let owner = state
                .scheduling
                .get_free_busy(owner_id, request.start, request.end)
                .await?;
            Ok(Json(FreeBusyOverview {
                owners: vec![owner],
                disconnected_owners: Vec::new(),
            }))
        }
        (None, false) => Ok(Json(
            state
                .scheduling
                .get_free_busy_many(&request.owner_ids, request.start, request.end)
                .await?,
        )),
        _ => Err(ConveneError::ValidationError(
            "provide either ownerId or ownerIds".to_string(),
        )),
    }
}

pub async fn propose_booking_handler(
    State(state): State<Arc<AppState>>,
    Path(host_id): Path<Uuid>,
    Json(proposal): Json<ProposeBooking>,
) -> Result<Response, ConveneError> {
    let request = state.booking.propose_booking(host_id, proposal).await?;
    info!("Booking request {} proposed to host {}", request.id, host_id);
    Ok((StatusCode::CREATED, Json(request)).into_response())
}

fn authenticated_user(headers: &HeaderMap) -> Result<Uuid, ConveneError> {
    let value = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ConveneError::AuthError("missing user identity".to_string()))?;
    Uuid::parse_str(value.trim())
        .map_err(|_| ConveneError::AuthError("invalid user identity".to_string()))
}

pub async fn list_connections_handler(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<CalendarConnection>>, ConveneError> {
    let user_id = authenticated_user(&headers)?;
    if user_id != owner_id {
        warn!("User {} tried to list connections of owner {}", user_id, owner_id);
        return Err(ConveneError::AuthError(
            "only the owner can list their connections".to_string(),
        ));
    }
    Ok(Json(state.scheduling.list_connections(owner_id).await?))
}

pub async fn list_pending_handler(
    State(state): State<Arc<AppState>>,
    Path(host_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingRequest>>, ConveneError> {
    let user_id = authenticated_user(&headers)?;
    if user_id != host_id {
        warn!("User {} tried to list requests of host {}", user_id, host_id);
        return Err(ConveneError::AuthError(
            "only the host can list their requests".to_string(),
        ));
    }
    Ok(Json(state.booking.list_pending_requests(host_id).await?))
}

#[derive(Deserialize, Debug)]
pub struct ApprovalQuery {
    pub token: String,
}

async fn decide(
    state: &AppState,
    request_id: Uuid,
    token: &str,
    decision: Decision,
) -> Result<Json<BookingRequest>, Response> {
    handle_json_result(state.booking.decide_booking(request_id, token, decision).await)
}

pub async fn accept_booking_handler(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    Query(query): Query<ApprovalQuery>,
) -> Result<Json<BookingRequest>, Response> {
    decide(&state, request_id, &query.token, Decision::Accept).await
}

pub async fn decline_booking_handler(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    Query(query): Query<ApprovalQuery>,
) -> Result<Json<BookingRequest>, Response> {
    decide(&state, request_id, &query.token, Decision::Decline).await
}
