//! Household settings: timezone and reset bookkeeping.

use chrono::NaiveDate;
use chrono_tz::Tz;
use log::info;
use std::sync::{Arc, RwLock};

use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::csv::{CsvConnection, GlobalConfig, SettingsRepository, SettingsStorage};

/// Service for the global configuration shared by every kid.
///
/// The timezone is read on every scheduling decision, so it is cached in
/// memory and the cache is invalidated synchronously on write. A stale zone
/// would silently shift day boundaries.
#[derive(Clone)]
pub struct SettingsService {
    settings_repository: SettingsRepository,
    timezone_cache: Arc<RwLock<Option<String>>>,
}

impl SettingsService {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        Self {
            settings_repository: SettingsRepository::new(connection),
            timezone_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// The configured IANA timezone name. The name is not validated here;
    /// scheduling resolves it with a UTC fallback.
    pub fn timezone(&self) -> DomainResult<String> {
        if let Some(tz) = self.timezone_cache.read().unwrap().clone() {
            return Ok(tz);
        }
        let config = self.settings_repository.get_global_config()?;
        *self.timezone_cache.write().unwrap() = Some(config.timezone.clone());
        Ok(config.timezone)
    }

    /// Change the household timezone. Unlike reads, writes reject unknown
    /// zone names outright so a typo cannot be persisted.
    pub fn set_timezone(&self, timezone: &str) -> DomainResult<()> {
        if timezone.parse::<Tz>().is_err() {
            return Err(DomainError::invalid_state(format!(
                "Unknown timezone: {}",
                timezone
            )));
        }

        self.settings_repository.set_timezone(timezone)?;
        *self.timezone_cache.write().unwrap() = Some(timezone.to_string());
        info!("Timezone changed to {}", timezone);
        Ok(())
    }

    pub fn global_config(&self) -> DomainResult<GlobalConfig> {
        Ok(self.settings_repository.get_global_config()?)
    }

    /// Local date the daily reset last ran.
    pub fn last_reset_date(&self) -> DomainResult<Option<NaiveDate>> {
        Ok(self.settings_repository.get_global_config()?.last_reset_date)
    }

    pub fn set_last_reset_date(&self, date: NaiveDate) -> DomainResult<()> {
        self.settings_repository.set_last_reset_date(date)?;
        Ok(())
    }
}
