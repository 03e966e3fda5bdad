// File: services/convene_backend/src/main.rs
use convene_backend::{routes, AppState};
use convene_common::{log_error, log_result, logging};
use convene_config::load_config;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let config = match load_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            log_error(e, "Failed to load config");
            return ExitCode::FAILURE;
        }
    };

    let (state, _notification_worker) = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            log_error(e, "Failed to initialize services");
            return ExitCode::FAILURE;
        }
    };

    let app = routes(Arc::new(state));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match log_result(
        TcpListener::bind(&addr).await,
        &format!("Starting server at http://{}", addr),
        &format!("Failed to bind {}", addr),
    ) {
        Ok(listener) => listener,
        Err(_) => return ExitCode::FAILURE,
    };
    info!("API endpoints available at http://{}/api", addr);

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        log_error(e, "Server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
