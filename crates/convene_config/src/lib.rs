//! Runtime configuration for Convene.
//!
//! Configuration is layered from `config/default.toml`, an optional
//! `config/{RUN_ENV}.toml`, and `CONVENE__*` environment variables. Any string
//! value equal to `"secret_from_env"` is replaced by the environment variable
//! named after its key path, e.g. `google.client_secret` -> `GOOGLE_CLIENT_SECRET`.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub mod models;
pub use models::*;

/// Marker value that defers a setting to the process environment.
pub const SECRET_MARKER: &str = "secret_from_env";

/// Default prefix for configuration environment variables.
pub const DEFAULT_PREFIX: &str = "CONVENE";

/// Loads the application configuration from the default config directory.
///
/// The directory can be moved with `CONVENE_CONFIG_DIR`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();
    let config_dir = env::var("CONVENE_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));
    load_config_from(&config_dir)
}

/// Loads the application configuration from `config_dir`.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env::var("PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string());

    let default_path = config_dir.join("default");
    let env_path = config_dir.join(&run_env);
    debug!(
        "Loading configuration from {} (RUN_ENV={})",
        config_dir.display(),
        run_env
    );

    let builder = Config::builder()
        .add_source(File::from(default_path).required(false))
        .add_source(File::from(env_path).required(false))
        .add_source(
            Environment::with_prefix(&prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let raw_config: AppConfig = builder.build()?.try_deserialize()?;
    apply_env_overrides_from_marker(raw_config)
}

/// Recursively replaces all marker string values with environment variable values.
fn inject_env_secrets(value: &mut Value) {
    fn walk(path: &mut Vec<String>, obj: &mut Value) {
        match obj {
            Value::Object(map) => {
                for (k, v) in map.iter_mut() {
                    path.push(k.clone());
                    walk(path, v);
                    path.pop();
                }
            }
            Value::String(s) if s == SECRET_MARKER => {
                let env_key = path.join("_").to_uppercase();
                match env::var(&env_key) {
                    Ok(env_val) => *obj = Value::String(env_val),
                    Err(_) => warn!("env var {} not found for {}", env_key, SECRET_MARKER),
                }
            }
            _ => {}
        }
    }

    walk(&mut Vec::new(), value);
}

/// Applies environment overrides based on marker values in the serialized config.
pub fn apply_env_overrides_from_marker(config: AppConfig) -> Result<AppConfig, ConfigError> {
    let mut json = serde_json::to_value(&config)
        .map_err(|e| ConfigError::Message(format!("failed to serialize config: {e}")))?;
    inject_env_secrets(&mut json);
    serde_json::from_value(json)
        .map_err(|e| ConfigError::Message(format!("failed to rebuild config: {e}")))
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Loads the dotenv file once per process and returns the path that was used.
///
/// `DOTENV_OVERRIDE` takes precedence over a first CLI argument starting with
/// `.env`, which takes precedence over `.env`.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path_override = env::var("DOTENV_OVERRIDE").ok();
    let dotenv_path_arg = env::args().nth(1).filter(|s| s.starts_with(".env"));

    let dotenv_path = dotenv_path_override
        .or(dotenv_path_arg)
        .unwrap_or_else(|| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn marker_values_are_replaced_from_environment() {
        env::set_var("GOOGLE_CLIENT_SECRET", "from-env");
        let config = AppConfig {
            google: Some(GoogleConfig {
                client_id: "client".to_string(),
                client_secret: SECRET_MARKER.to_string(),
                ..GoogleConfig::default()
            }),
            ..AppConfig::default()
        };

        let resolved = apply_env_overrides_from_marker(config).unwrap();
        let google = resolved.google.unwrap();
        assert_eq!(google.client_secret, "from-env");
        assert_eq!(google.client_id, "client");
    }

    #[test]
    fn missing_marker_env_var_leaves_marker_in_place() {
        let mut value = serde_json::json!({ "booking": { "unset_key_for_test": SECRET_MARKER } });
        inject_env_secrets(&mut value);
        assert_eq!(value["booking"]["unset_key_for_test"], SECRET_MARKER);
    }

    #[test]
    fn loads_defaults_from_toml_file() {
        let dir = env::temp_dir().join(format!("convene-config-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("default.toml"),
            r#"
[server]
host = "0.0.0.0"
port = 9000

[scheduling]
max_parallel_fetches = 3
default_timezone = "Europe/Zurich"

[booking]
signing_secret = "s3cret"
"#,
        )
        .unwrap();

        let config = load_config_from(&dir).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.scheduling.max_parallel_fetches, 3);
        assert_eq!(config.scheduling.default_timezone, "Europe/Zurich");
        // untouched fields keep their defaults
        assert_eq!(config.scheduling.refresh_skew_minutes, 5);
        assert_eq!(config.booking.approval_ttl_minutes, 15);
        assert!(config.google.is_none());

        fs::remove_dir_all(&dir).ok();
    }
}
