//! Runtime configuration for the job service
//!
//! Provides multi-tier resolution with Database → ENV → TOML priority for
//! settings that can be changed while the service runs.

use crate::models::ValidatorMode;
use archivist_common::config::TomlConfig;
use archivist_common::Result;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the CSV validator mode
pub const VALIDATOR_MODE_ENV: &str = "ARCHIVIST_CSV_VALIDATOR_MODE";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";
pub const DEFAULT_WORKER_COUNT: usize = 2;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_CULTURE: &str = "en";

/// Static settings taken from the TOML file at startup
#[derive(Debug, Clone, PartialEq)]
pub struct JobsConfig {
    pub bind_address: String,
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub culture: String,
    pub csv_transform_command: Option<String>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            worker_count: DEFAULT_WORKER_COUNT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            culture: DEFAULT_CULTURE.to_string(),
            csv_transform_command: None,
        }
    }
}

impl JobsConfig {
    pub fn from_toml(toml: &TomlConfig) -> Self {
        let defaults = Self::default();
        Self {
            bind_address: toml.bind_address.clone().unwrap_or(defaults.bind_address),
            worker_count: toml.worker_count.unwrap_or(defaults.worker_count).max(1),
            poll_interval: toml
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            culture: toml.culture.clone().unwrap_or(defaults.culture),
            csv_transform_command: toml
                .csv_transform_command
                .clone()
                .filter(|command| !command.trim().is_empty()),
        }
    }
}

fn parse_mode(source: &str, value: &str) -> Option<ValidatorMode> {
    match ValidatorMode::from_str(value) {
        Ok(mode) => Some(mode),
        Err(e) => {
            warn!(source, value, error = %e, "Ignoring invalid CSV validator mode");
            None
        }
    }
}

/// Resolve the CSV validator mode
///
/// **Priority:** Database → ENV → TOML → `off`
///
/// Resolved per job so a change made through the settings API applies to
/// the next import without a restart.
pub async fn resolve_validator_mode(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<ValidatorMode> {
    if let Some(mode) = crate::db::settings::get_csv_validator_mode(db).await? {
        return Ok(mode);
    }

    if let Ok(value) = std::env::var(VALIDATOR_MODE_ENV) {
        if let Some(mode) = parse_mode("environment", &value) {
            info!(mode = %mode, "CSV validator mode loaded from environment variable");
            return Ok(mode);
        }
    }

    if let Some(value) = toml_config.csv_validator_default_import_behaviour.as_deref() {
        if let Some(mode) = parse_mode("TOML", value) {
            return Ok(mode);
        }
    }

    Ok(ValidatorMode::Off)
}
