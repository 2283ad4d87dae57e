//! The daily reset: clearing yesterday's completions at the day boundary.

use log::info;
use std::sync::{Arc, Mutex};

use crate::domain::clock::{self, Clock};
use crate::domain::commands::reset::ResetOutcome;
use crate::domain::errors::DomainResult;
use crate::domain::locks::KidLocks;
use crate::domain::notify::DisplayNotifier;
use crate::domain::settings_service::SettingsService;
use crate::storage::csv::{CsvConnection, KidRepository, RoutineRepository};
use crate::storage::traits::{KidStorage, RoutineStorage};

/// Service that clears recurring completions once per local day.
///
/// The whole attempt runs under a single global lock, and the persisted
/// `last_reset_date` acts as a compare-and-set: whoever observes today
/// already recorded walks away without touching anything. Any number of
/// triggers (a scheduled midnight job, opportunistic checks on reads) can
/// call in; the mass clear happens at most once per day.
///
/// One-off routines (those with an override date) are exempt. They exist
/// for exactly one date, so their completion is a permanent record, not a
/// daily state.
#[derive(Clone)]
pub struct ResetService {
    routine_repository: RoutineRepository,
    kid_repository: KidRepository,
    clock: Arc<dyn Clock>,
    settings: SettingsService,
    locks: KidLocks,
    reset_lock: Arc<Mutex<()>>,
    notifier: Arc<dyn DisplayNotifier>,
}

impl ResetService {
    pub fn new(
        connection: Arc<CsvConnection>,
        clock: Arc<dyn Clock>,
        settings: SettingsService,
        locks: KidLocks,
        notifier: Arc<dyn DisplayNotifier>,
    ) -> Self {
        Self {
            routine_repository: RoutineRepository::new(connection.clone()),
            kid_repository: KidRepository::new(connection),
            clock,
            settings,
            locks,
            reset_lock: Arc::new(Mutex::new(())),
            notifier,
        }
    }

    /// Run the daily reset if it has not run for the current local day yet.
    pub fn check_and_reset_if_needed(&self) -> DomainResult<ResetOutcome> {
        let _guard = self.reset_lock.lock().unwrap();

        let tz = self.settings.timezone()?;
        let today = clock::today(self.clock.now_utc(), &tz);

        if self.settings.last_reset_date()? == Some(today) {
            return Ok(ResetOutcome::AlreadyReset);
        }

        // Each kid's routines file is rewritten whole, so the clear takes
        // that kid's lock to serialize with any in-flight toggle.
        let kids = self.kid_repository.list_kids()?;
        let mut routines_cleared = 0u32;
        for kid in &kids {
            let lock = self.locks.lock_for(&kid.id);
            let _kid_guard = lock.lock().unwrap();
            routines_cleared += self
                .routine_repository
                .clear_recurring_completion_for_kid(&kid.id)?;
        }
        self.settings.set_last_reset_date(today)?;
        info!(
            "Daily reset for {}: cleared {} completions",
            today, routines_cleared
        );

        for kid in &kids {
            self.notifier.display_state_changed(&kid.id);
        }

        Ok(ResetOutcome::Reset { routines_cleared })
    }
}
