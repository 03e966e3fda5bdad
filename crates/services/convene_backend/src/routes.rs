// --- File: crates/services/convene_backend/src/routes.rs ---
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::handlers::{
    accept_booking_handler, decline_booking_handler, find_slots_handler, free_busy_handler,
    health_handler, list_connections_handler, list_pending_handler, propose_booking_handler,
};

/// All API routes, nested under `/api`.
pub fn routes(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/scheduling/slots", post(find_slots_handler))
        .route("/scheduling/free-busy", post(free_busy_handler))
        .route(
            "/scheduling/owners/{owner_id}/connections",
            get(list_connections_handler),
        )
        .route(
            "/booking/hosts/{host_id}/requests",
            post(propose_booking_handler).get(list_pending_handler),
        )
        .route("/booking/requests/{id}/accept", get(accept_booking_handler))
        .route("/booking/requests/{id}/decline", get(decline_booking_handler))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}
