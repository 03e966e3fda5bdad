// File: services/convene_backend/src/lib.rs
pub mod app_state;
pub mod handlers;
pub mod notifier;
pub mod routes;

pub use app_state::AppState;
pub use routes::routes;
