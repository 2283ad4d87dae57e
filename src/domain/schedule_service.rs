//! Resolution of which routines are on a kid's plate today.

use log::debug;
use std::sync::Arc;

use crate::domain::clock::{self, Clock};
use crate::domain::commands::schedule::TodayPoints;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::locks::KidLocks;
use crate::domain::models::routine::Routine;
use crate::domain::settings_service::SettingsService;
use crate::storage::csv::{CsvConnection, KidRepository, RoutineRepository};
use crate::storage::traits::{KidStorage, RoutineStorage};

/// Service that resolves a kid's schedule for the current local day.
///
/// Routines pinned to today's date take precedence outright: if any exist,
/// they alone are the day's list and the weekday recurrences are suppressed
/// ("a one-time task replaces the normal day"). Only when no override
/// matches today does the weekday set decide. A routine pinned to another
/// date is never scheduled today, whatever its weekday set says.
#[derive(Clone)]
pub struct ScheduleService {
    routine_repository: RoutineRepository,
    kid_repository: KidRepository,
    clock: Arc<dyn Clock>,
    settings: SettingsService,
    locks: KidLocks,
}

impl ScheduleService {
    pub fn new(
        connection: Arc<CsvConnection>,
        clock: Arc<dyn Clock>,
        settings: SettingsService,
        locks: KidLocks,
    ) -> Self {
        Self {
            routine_repository: RoutineRepository::new(connection.clone()),
            kid_repository: KidRepository::new(connection),
            clock,
            settings,
            locks,
        }
    }

    /// Today's routines for one kid, ordered by start time (ties broken by
    /// id so the order is stable).
    ///
    /// Completions left over from a previous day are cleared and persisted
    /// on the way through, so a schedule read after a missed reset still
    /// shows a fresh day. Clearing never touches point balances.
    pub fn todays_routines(&self, kid_id: &str) -> DomainResult<Vec<Routine>> {
        if self.kid_repository.get_kid(kid_id)?.is_none() {
            return Err(DomainError::not_found("kid", kid_id));
        }

        let now = self.clock.now_utc();
        let tz = self.settings.timezone()?;
        let today = clock::today(now, &tz);
        let weekday = clock::weekday_index(now, &tz);

        // Persisting a stale-completion clear rewrites the kid's routines
        // file, so the read-and-clear runs under the kid's lock.
        let lock = self.locks.lock_for(kid_id);
        let _guard = lock.lock().unwrap();

        let mut overrides = Vec::new();
        let mut recurring = Vec::new();
        for mut routine in self.routine_repository.list_routines(kid_id)? {
            if routine.has_stale_completion(today) {
                debug!(
                    "Clearing stale completion on {} (completed {:?})",
                    routine.id, routine.completed_date
                );
                routine.clear_completion();
                self.routine_repository.update_routine(&routine)?;
            }

            match routine.date_override {
                Some(date) if date == today => overrides.push(routine),
                Some(_) => {}
                None if routine.days_of_week.contains(&weekday) => recurring.push(routine),
                None => {}
            }
        }

        let mut scheduled = if overrides.is_empty() {
            recurring
        } else {
            overrides
        };
        scheduled.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(scheduled)
    }

    /// The next incomplete routine whose start time has not passed yet, if
    /// any. Drives the "up next" display slot.
    pub fn next_routine(&self, kid_id: &str) -> DomainResult<Option<Routine>> {
        let now_time = clock::clock_time(self.clock.now_utc(), &self.settings.timezone()?);
        Ok(self
            .todays_routines(kid_id)?
            .into_iter()
            .find(|r| !r.completed && r.start_time.as_str() >= now_time.as_str()))
    }

    /// Earned and total points over today's schedule.
    pub fn today_points(&self, kid_id: &str) -> DomainResult<TodayPoints> {
        let routines = self.todays_routines(kid_id)?;
        let total = routines.iter().map(|r| r.points).sum();
        let earned = routines
            .iter()
            .filter(|r| r.completed)
            .map(|r| r.points)
            .sum();
        Ok(TodayPoints { earned, total })
    }
}
