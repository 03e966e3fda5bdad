// --- File: crates/convene_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8086,
        }
    }
}

// --- Database Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite:data/convene.db, overridable via CONVENE__DATABASE__URL
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }
}

// --- Google Calendar Config ---
// client_secret is normally "secret_from_env" and resolved from GOOGLE_CLIENT_SECRET.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_freebusy_url")]
    pub freebusy_url: String,
    #[serde(default = "default_events_url")]
    pub events_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub create_meet_links: bool,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: default_token_url(),
            freebusy_url: default_freebusy_url(),
            events_url: default_events_url(),
            request_timeout_secs: default_request_timeout_secs(),
            create_meet_links: false,
        }
    }
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_freebusy_url() -> String {
    "https://www.googleapis.com/calendar/v3/freeBusy".to_string()
}

fn default_events_url() -> String {
    "https://www.googleapis.com/calendar/v3/calendars/primary/events".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

// --- Slot search ---
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Tokens expiring within this many minutes are refreshed before use.
    pub refresh_skew_minutes: i64,
    pub max_parallel_fetches: usize,
    /// Upper bound for resolving and fetching one participant.
    pub fetch_timeout_secs: u64,
    pub default_timezone: String,
    pub default_days_ahead: i64,
    pub max_days_ahead: i64,
    pub default_duration_minutes: i64,
    pub max_results: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            refresh_skew_minutes: 5,
            max_parallel_fetches: 8,
            fetch_timeout_secs: 10,
            default_timezone: "UTC".to_string(),
            default_days_ahead: 7,
            max_days_ahead: 60,
            default_duration_minutes: 60,
            max_results: 10,
        }
    }
}

// --- Booking requests ---
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BookingConfig {
    pub signing_secret: String,
    pub approval_ttl_minutes: i64,
    /// Base URL used when rendering accept/decline links for hosts.
    pub public_base_url: String,
    pub default_timezone: String,
    pub decision_claim_ttl_secs: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            approval_ttl_minutes: 15,
            public_base_url: "http://localhost:8086".to_string(),
            default_timezone: "UTC".to_string(),
            decision_claim_ttl_secs: 120,
        }
    }
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub google: Option<GoogleConfig>,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub booking: BookingConfig,
}
