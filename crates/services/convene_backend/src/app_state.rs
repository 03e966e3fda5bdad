// --- File: crates/services/convene_backend/src/app_state.rs ---
use convene_booking::{spawn_notification_worker, BookingService, NotificationDispatcher};
use convene_common::services::{BookingStore, CalendarProvider, CredentialStore, NotificationService};
use convene_common::{config_error, ConveneError};
use convene_config::AppConfig;
use convene_db::{DbClient, SqlBookingRequestRepository, SqlCredentialRepository};
use convene_gcal::GoogleCalendarProvider;
use convene_scheduling::SchedulingService;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::notifier::LoggingNotificationService;

/// Application state that is shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub scheduling: SchedulingService,
    pub booking: BookingService,
    /// Absent when the stores are not database backed.
    pub db: Option<DbClient>,
}

/// Collaborators the services are built from.
pub struct AppParts {
    pub credentials: Arc<dyn CredentialStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub provider: Arc<dyn CalendarProvider>,
    pub notifications: Arc<dyn NotificationService>,
    pub db: Option<DbClient>,
}

impl AppState {
    /// Wire the services and start the notification worker.
    pub fn from_parts(
        config: Arc<AppConfig>,
        parts: AppParts,
    ) -> Result<(Self, JoinHandle<()>), ConveneError> {
        let scheduling = SchedulingService::new(
            parts.credentials,
            parts.provider.clone(),
            config.scheduling.clone(),
        );

        let (dispatcher, rx) = NotificationDispatcher::channel();
        let booking = BookingService::new(
            parts.bookings,
            scheduling.resolver(),
            parts.provider,
            dispatcher,
            config.booking.clone(),
        )?;
        let worker = spawn_notification_worker(rx, parts.notifications);

        Ok((
            Self {
                config,
                scheduling,
                booking,
                db: parts.db,
            },
            worker,
        ))
    }

    /// Database-backed state with the Google provider and log-only email.
    pub async fn new(config: Arc<AppConfig>) -> Result<(Self, JoinHandle<()>), ConveneError> {
        let db = DbClient::new(&config)
            .await
            .map_err(|e| ConveneError::DatabaseError(e.to_string()))?;

        let credentials = SqlCredentialRepository::new(db.clone());
        let bookings = SqlBookingRequestRepository::new(db.clone());
        credentials
            .init_schema()
            .await
            .map_err(|e| ConveneError::DatabaseError(e.to_string()))?;
        bookings
            .init_schema()
            .await
            .map_err(|e| ConveneError::DatabaseError(e.to_string()))?;
        info!("Database schema ready");

        let google = config
            .google
            .clone()
            .ok_or_else(|| config_error("google configuration section is missing"))?;
        let provider = GoogleCalendarProvider::new(google)?;

        Self::from_parts(
            config,
            AppParts {
                credentials: Arc::new(credentials),
                bookings: Arc::new(bookings),
                provider: Arc::new(provider),
                notifications: Arc::new(LoggingNotificationService),
                db: Some(db),
            },
        )
    }
}
