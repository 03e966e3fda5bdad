//! Storage for Convene.
//!
//! A database-agnostic [`DbClient`] over an SQLx `Any` pool, SQL repositories
//! for calendar credentials and booking requests, and in-memory stores with the
//! same contracts for tests and single-process setups.
//!
//! # Example
//!
//! ```rust,no_run
//! use convene_config::AppConfig;
//! use convene_db::{DbClient, SqlBookingRequestRepository, SqlCredentialRepository};
//!
//! async fn setup_db() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::default();
//!     let db_client = DbClient::new(&config).await?;
//!     SqlCredentialRepository::new(db_client.clone()).init_schema().await?;
//!     SqlBookingRequestRepository::new(db_client).init_schema().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod memory;
pub mod repositories;

pub use client::DbClient;
pub use error::DbError;
pub use memory::{InMemoryBookingStore, InMemoryCredentialStore};
pub use repositories::{SqlBookingRequestRepository, SqlCredentialRepository};
