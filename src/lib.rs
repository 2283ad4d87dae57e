//! # Kids Points Tracker
//!
//! Core library for a family chores dashboard: kids complete daily routines
//! to earn points and spend them on rewards. Everything is stored in plain
//! CSV and YAML files under one data directory, services are synchronous,
//! and any UI or device integration sits on top of [`Backend`].
//!
//! The day boundary is decided by a single household timezone. Completions
//! reset once per local day; points, once earned, never reset.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

pub mod domain;
pub mod storage;

pub use storage::csv::CsvConnection;

use domain::clock::{Clock, SystemClock};
use domain::locks::KidLocks;
use domain::notify::{DisplayNotifier, NoopNotifier};

/// Main backend struct that orchestrates all services.
pub struct Backend {
    pub kid_service: domain::KidService,
    pub routine_service: domain::RoutineService,
    pub schedule_service: domain::ScheduleService,
    pub ledger_service: domain::LedgerService,
    pub reset_service: domain::ResetService,
    pub reward_service: domain::RewardService,
    pub redemption_service: domain::RedemptionService,
    pub settings_service: domain::SettingsService,
}

impl Backend {
    /// Create a backend over a data directory with the system clock and no
    /// display integration.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let connection = Arc::new(CsvConnection::new(data_dir)?);
        Ok(Self::with_parts(
            connection,
            Arc::new(SystemClock),
            Arc::new(NoopNotifier),
        ))
    }

    /// Create a backend with explicit clock and notifier, for tests and for
    /// embedders that push state to a display.
    pub fn with_parts(
        connection: Arc<CsvConnection>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn DisplayNotifier>,
    ) -> Self {
        let locks = KidLocks::new();
        let settings_service = domain::SettingsService::new(connection.clone());

        let kid_service =
            domain::KidService::new(connection.clone(), locks.clone(), notifier.clone());
        let routine_service = domain::RoutineService::new(
            connection.clone(),
            clock.clone(),
            settings_service.clone(),
            locks.clone(),
            notifier.clone(),
        );
        let schedule_service = domain::ScheduleService::new(
            connection.clone(),
            clock.clone(),
            settings_service.clone(),
            locks.clone(),
        );
        let ledger_service = domain::LedgerService::new(
            connection.clone(),
            clock.clone(),
            settings_service.clone(),
            locks.clone(),
            notifier.clone(),
        );
        let reset_service = domain::ResetService::new(
            connection.clone(),
            clock,
            settings_service.clone(),
            locks.clone(),
            notifier.clone(),
        );
        let reward_service = domain::RewardService::new(connection.clone());
        let redemption_service = domain::RedemptionService::new(connection, locks, notifier);

        Backend {
            kid_service,
            routine_service,
            schedule_service,
            ledger_service,
            reset_service,
            reward_service,
            redemption_service,
            settings_service,
        }
    }
}
