//! The completion ledger: toggles, penalties, and the point movements they
//! cause.
//!
//! Every operation here is a read-modify-write across two files (the kid's
//! counters and the routine row), so each runs under that kid's lock and
//! writes the kid first. If the routine write then fails the kid write is
//! rolled back, leaving both sides as they were.

use chrono::Utc;
use log::{error, info};
use std::sync::Arc;

use crate::domain::clock::{self, Clock};
use crate::domain::commands::ledger::{PenaltyOutcome, ToggleOutcome};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::locks::KidLocks;
use crate::domain::notify::DisplayNotifier;
use crate::domain::settings_service::SettingsService;
use crate::storage::csv::{CsvConnection, KidRepository, RoutineRepository};
use crate::storage::traits::{KidStorage, RoutineStorage};

#[derive(Clone)]
pub struct LedgerService {
    routine_repository: RoutineRepository,
    kid_repository: KidRepository,
    clock: Arc<dyn Clock>,
    settings: SettingsService,
    locks: KidLocks,
    notifier: Arc<dyn DisplayNotifier>,
}

impl LedgerService {
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
            notifier,
        }
    }

    /// Flip a routine's completion state for today and move the kid's
    /// lifetime points accordingly.
    ///
    /// A completion left over from a previous day is cleared first without
    /// any deduction; the toggle then operates on the fresh state, so the
    /// kid is credited for completing it today rather than debited for a
    /// day-old completion.
    pub fn toggle_routine(&self, routine_id: &str) -> DomainResult<ToggleOutcome> {
        let mut routine = self
            .routine_repository
            .get_routine(routine_id)?
            .ok_or_else(|| DomainError::not_found("routine", routine_id))?;

        let lock = self.locks.lock_for(&routine.kid_id);
        let _guard = lock.lock().unwrap();

        // Reload under the lock: another toggle may have won the race.
        routine = self
            .routine_repository
            .get_routine(routine_id)?
            .ok_or_else(|| DomainError::not_found("routine", routine_id))?;
        let mut kid = self
            .kid_repository
            .get_kid(&routine.kid_id)?
            .ok_or_else(|| DomainError::not_found("kid", &routine.kid_id))?;

        let now = self.clock.now_utc();
        let today = clock::today(now, &self.settings.timezone()?);
        if routine.has_stale_completion(today) {
            routine.clear_completion();
        }

        let kid_before = kid.clone();
        if routine.completed {
            routine.completed = false;
            routine.completed_date = None;
            kid.lifetime_points = (kid.lifetime_points - routine.points).max(0);
            info!(
                "Un-completed {} for {}: -{} points",
                routine.id, kid.id, routine.points
            );
        } else {
            routine.completed = true;
            routine.completed_date = Some(today);
            kid.lifetime_points += routine.points;
            info!(
                "Completed {} for {}: +{} points",
                routine.id, kid.id, routine.points
            );
        }
        routine.updated_at = Utc::now();
        kid.updated_at = Utc::now();

        self.kid_repository.update_kid(&kid)?;
        if let Err(e) = self.routine_repository.update_routine(&routine) {
            error!("Routine write failed after kid write, rolling back: {}", e);
            self.kid_repository.update_kid(&kid_before)?;
            return Err(e.into());
        }

        self.notifier.display_state_changed(&kid.id);
        Ok(ToggleOutcome { routine, kid })
    }

    /// Apply the half-credit penalty to a routine completed today: the
    /// routine goes back to incomplete, but instead of the full refund an
    /// un-complete toggle would give, only half the points come back off,
    /// rounded down and never below a zero balance. The other half stays
    /// earned.
    pub fn reduce_points(
        &self,
        routine_id: &str,
        reason: Option<&str>,
    ) -> DomainResult<PenaltyOutcome> {
        let routine = self
            .routine_repository
            .get_routine(routine_id)?
            .ok_or_else(|| DomainError::not_found("routine", routine_id))?;

        let lock = self.locks.lock_for(&routine.kid_id);
        let _guard = lock.lock().unwrap();

        let mut routine = self
            .routine_repository
            .get_routine(routine_id)?
            .ok_or_else(|| DomainError::not_found("routine", routine_id))?;
        let mut kid = self
            .kid_repository
            .get_kid(&routine.kid_id)?
            .ok_or_else(|| DomainError::not_found("kid", &routine.kid_id))?;

        let today = clock::today(self.clock.now_utc(), &self.settings.timezone()?);
        if routine.has_stale_completion(today) {
            // The completion belongs to another day; nothing to penalize.
            // The clear still changes what a display shows.
            routine.clear_completion();
            routine.updated_at = Utc::now();
            self.routine_repository.update_routine(&routine)?;
            self.notifier.display_state_changed(&routine.kid_id);
            return Err(DomainError::invalid_state(
                "Routine is not completed today",
            ));
        }
        if !routine.completed {
            return Err(DomainError::invalid_state(
                "Routine is not completed today",
            ));
        }

        let penalty = routine.points / 2;
        let kid_before = kid.clone();
        let before = kid.lifetime_points;
        kid.lifetime_points = (kid.lifetime_points - penalty).max(0);
        let points_reduced = before - kid.lifetime_points;
        routine.clear_completion();
        routine.updated_at = Utc::now();
        kid.updated_at = Utc::now();

        self.kid_repository.update_kid(&kid)?;
        if let Err(e) = self.routine_repository.update_routine(&routine) {
            error!("Routine write failed after kid write, rolling back: {}", e);
            self.kid_repository.update_kid(&kid_before)?;
            return Err(e.into());
        }

        info!(
            "Penalty on {} for {}: -{} points (reason: {})",
            routine.id,
            kid.id,
            points_reduced,
            reason.unwrap_or("none")
        );
        self.notifier.display_state_changed(&kid.id);
        Ok(PenaltyOutcome {
            routine,
            kid,
            points_reduced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::FixedClock;
    use crate::domain::commands::kid::CreateKidCommand;
    use crate::domain::commands::routine::CreateRoutineCommand;
    use crate::domain::kid_service::KidService;
    use crate::domain::notify::{NoopNotifier, RecordingNotifier};
    use crate::domain::routine_service::RoutineService;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;

    struct Fixture {
        ledger: LedgerService,
        kids: KidService,
        clock: Arc<FixedClock>,
        notifier: RecordingNotifier,
        kid_id: String,
        routine_id: String,
        _tmp: TempDir,
    }

    fn setup_with_points(points: i64) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let connection = Arc::new(CsvConnection::new(tmp.path()).unwrap());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 16, 12, 0, 0).unwrap(),
        ));
        let settings = SettingsService::new(connection.clone());
        let locks = KidLocks::new();
        let notifier = RecordingNotifier::new();

        let kids = KidService::new(connection.clone(), locks.clone(), Arc::new(NoopNotifier));
        let kid_id = kids
            .create_kid(CreateKidCommand {
                name: "Emma".to_string(),
                avatar: None,
            })
            .unwrap()
            .id;

        let routines = RoutineService::new(
            connection.clone(),
            clock.clone(),
            settings.clone(),
            locks.clone(),
            Arc::new(NoopNotifier),
        );
        let routine_id = routines
            .create_routine(CreateRoutineCommand {
                kid_id: kid_id.clone(),
                title: "Brush Teeth".to_string(),
                description: String::new(),
                points,
                start_time: "07:15".to_string(),
                end_time: None,
                days_of_week: vec![0, 1, 2, 3, 4, 5, 6],
                date_override: None,
            })
            .unwrap()
            .id;

        let ledger = LedgerService::new(
            connection,
            clock.clone(),
            settings,
            locks,
            Arc::new(notifier.clone()),
        );
        Fixture {
            ledger,
            kids,
            clock,
            notifier,
            kid_id,
            routine_id,
            _tmp: tmp,
        }
    }

    #[test]
    fn test_toggle_awards_and_revokes() {
        let f = setup_with_points(5);

        let done = f.ledger.toggle_routine(&f.routine_id).unwrap();
        assert!(done.routine.completed);
        assert_eq!(
            done.routine.completed_date,
            Some(NaiveDate::from_ymd_opt(2025, 6, 16).unwrap())
        );
        assert_eq!(done.kid.lifetime_points, 5);

        let undone = f.ledger.toggle_routine(&f.routine_id).unwrap();
        assert!(!undone.routine.completed);
        assert!(undone.routine.completed_date.is_none());
        assert_eq!(undone.kid.lifetime_points, 0);
    }

    #[test]
    fn test_toggle_notifies_display() {
        let f = setup_with_points(5);
        f.ledger.toggle_routine(&f.routine_id).unwrap();
        assert_eq!(f.notifier.notified_kids(), vec![f.kid_id.clone()]);
    }

    #[test]
    fn test_toggle_after_day_change_credits_fresh_completion() {
        let f = setup_with_points(5);

        f.ledger.toggle_routine(&f.routine_id).unwrap();

        // Next day: the old completion is stale. Toggling completes the
        // routine for the new day instead of un-completing yesterday's.
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 17, 8, 0, 0).unwrap());
        let outcome = f.ledger.toggle_routine(&f.routine_id).unwrap();
        assert!(outcome.routine.completed);
        assert_eq!(
            outcome.routine.completed_date,
            Some(NaiveDate::from_ymd_opt(2025, 6, 17).unwrap())
        );
        // Yesterday's 5 stay earned; today's 5 are added.
        assert_eq!(outcome.kid.lifetime_points, 10);
    }

    #[test]
    fn test_revoke_never_drives_balance_negative() {
        let f = setup_with_points(5);
        f.ledger.toggle_routine(&f.routine_id).unwrap();

        // Drain the balance out from under the completion.
        f.kids
            .adjust_lifetime_points(crate::domain::commands::kid::AdjustPointsCommand {
                kid_id: f.kid_id.clone(),
                delta: -5,
                reason: None,
            })
            .unwrap();

        let undone = f.ledger.toggle_routine(&f.routine_id).unwrap();
        assert_eq!(undone.kid.lifetime_points, 0);
    }

    #[test]
    fn test_penalty_halves_rounding_down_and_uncompletes() {
        let f = setup_with_points(5);
        f.ledger.toggle_routine(&f.routine_id).unwrap();

        let outcome = f
            .ledger
            .reduce_points(&f.routine_id, Some("rushed through it"))
            .unwrap();
        assert_eq!(outcome.points_reduced, 2);
        // Half of 5 rounds down: 3 of the earned 5 stay.
        assert_eq!(outcome.kid.lifetime_points, 3);
        assert!(!outcome.routine.completed);
        assert!(outcome.routine.completed_date.is_none());
    }

    #[test]
    fn test_penalty_differs_from_uncomplete_toggle() {
        let f = setup_with_points(4);
        f.ledger.toggle_routine(&f.routine_id).unwrap();
        let toggled = f.ledger.toggle_routine(&f.routine_id).unwrap();
        // A full toggle round-trip refunds everything.
        assert_eq!(toggled.kid.lifetime_points, 0);

        f.ledger.toggle_routine(&f.routine_id).unwrap();
        let penalized = f.ledger.reduce_points(&f.routine_id, None).unwrap();
        // The penalty only claws back half.
        assert_eq!(penalized.kid.lifetime_points, 2);
    }

    #[test]
    fn test_penalty_on_incomplete_routine_fails() {
        let f = setup_with_points(5);
        assert!(matches!(
            f.ledger.reduce_points(&f.routine_id, None).unwrap_err(),
            DomainError::InvalidState(_)
        ));
    }

    #[test]
    fn test_penalty_on_stale_completion_clears_without_deduction() {
        let f = setup_with_points(5);
        f.ledger.toggle_routine(&f.routine_id).unwrap();

        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 17, 8, 0, 0).unwrap());
        assert!(f.ledger.reduce_points(&f.routine_id, None).is_err());

        // Balance untouched, completion cleared.
        let kid = f.kids.get_kid(&f.kid_id).unwrap();
        assert_eq!(kid.lifetime_points, 5);

        // The cleared completion is a visible change: the display hears
        // about it even though the penalty itself was rejected.
        assert_eq!(
            f.notifier.notified_kids(),
            vec![f.kid_id.clone(), f.kid_id.clone()]
        );
    }

    #[test]
    fn test_toggle_missing_routine_is_not_found() {
        let f = setup_with_points(5);
        assert!(matches!(
            f.ledger.toggle_routine("routine::missing").unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }
}
