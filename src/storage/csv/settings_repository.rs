//! Global configuration storage.
//!
//! A single `global_config.yaml` at the data directory root holds the
//! settings shared by every kid: the household timezone and the date the
//! last daily reset ran. The `SettingsStorage` trait lives here rather than
//! in `traits.rs` because the config is a singleton, not a row collection.

use anyhow::Result;
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;

use super::connection::CsvConnection;

const DATA_FORMAT_VERSION: u32 = 1;

/// Household-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// IANA timezone name, e.g. "America/New_York". Invalid values are
    /// tolerated at read time and fall back to UTC when resolved.
    pub timezone: String,
    /// Local date the daily reset last ran, or `None` if it never has.
    pub last_reset_date: Option<NaiveDate>,
    pub data_format_version: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            timezone: "UTC".to_string(),
            last_reset_date: None,
            data_format_version: DATA_FORMAT_VERSION,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Global configuration operations.
pub trait SettingsStorage: Send + Sync {
    /// Load the config, materializing defaults if the file does not exist.
    fn get_global_config(&self) -> Result<GlobalConfig>;

    /// Persist a new timezone name.
    fn set_timezone(&self, timezone: &str) -> Result<()>;

    /// Record the local date the daily reset ran.
    fn set_last_reset_date(&self, date: NaiveDate) -> Result<()>;
}

/// File-based settings repository backed by `global_config.yaml`.
#[derive(Clone)]
pub struct SettingsRepository {
    connection: Arc<CsvConnection>,
}

impl SettingsRepository {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        Self { connection }
    }

    fn save(&self, config: &GlobalConfig) -> Result<()> {
        let yaml = serde_yaml::to_string(config)?;
        self.connection
            .write_atomic(&self.connection.global_config_path(), yaml.as_bytes())?;
        debug!("Saved global config (timezone: {})", config.timezone);
        Ok(())
    }
}

impl SettingsStorage for SettingsRepository {
    fn get_global_config(&self) -> Result<GlobalConfig> {
        let path = self.connection.global_config_path();
        if !path.exists() {
            let config = GlobalConfig::default();
            self.save(&config)?;
            info!("Created default global config at {:?}", path);
            return Ok(config);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    fn set_timezone(&self, timezone: &str) -> Result<()> {
        let mut config = self.get_global_config()?;
        config.timezone = timezone.to_string();
        config.updated_at = chrono::Utc::now().to_rfc3339();
        self.save(&config)
    }

    fn set_last_reset_date(&self, date: NaiveDate) -> Result<()> {
        let mut config = self.get_global_config()?;
        config.last_reset_date = Some(date);
        config.updated_at = chrono::Utc::now().to_rfc3339();
        self.save(&config)
    }
}
