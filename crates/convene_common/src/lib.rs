// --- File: crates/convene_common/src/lib.rs ---

pub mod error; // Error handling
pub mod http; // HTTP utilities
pub mod logging; // Logging utilities
pub mod models; // Shared domain models
pub mod services; // Service abstractions

// Re-export error types and utilities for easier access
pub use error::{config_error, ConveneError, HttpStatusCode, ProviderError, StoreError};

// Re-export HTTP utilities for easier access
pub use http::{client::create_client, handle_json_result, IntoHttpResponse};

// Re-export logging utilities for easier access
pub use logging::{init, init_with_level, log_error, log_result};
