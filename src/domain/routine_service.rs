//! Routine definitions: the tasks a kid can complete for points.

use chrono::Utc;
use log::info;
use std::sync::Arc;

use crate::domain::clock::{self, Clock};
use crate::domain::commands::routine::{CreateRoutineCommand, UpdateRoutineCommand};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::locks::KidLocks;
use crate::domain::models::routine::Routine;
use crate::domain::notify::DisplayNotifier;
use crate::domain::settings_service::SettingsService;
use crate::storage::csv::{CsvConnection, KidRepository, RoutineRepository};
use crate::storage::traits::{KidStorage, RoutineStorage};

/// Service for routine CRUD.
///
/// A routine is either recurring (non-empty weekday set) or a one-off pinned
/// to a single date; it must be one or the other. When an override date is
/// set the weekday set is ignored by scheduling.
///
/// Every write here rewrites the kid's whole routines file, so each runs
/// under that kid's lock to serialize with toggles and penalties on the
/// same file.
#[derive(Clone)]
pub struct RoutineService {
    routine_repository: RoutineRepository,
    kid_repository: KidRepository,
    clock: Arc<dyn Clock>,
    settings: SettingsService,
    locks: KidLocks,
    notifier: Arc<dyn DisplayNotifier>,
}

impl RoutineService {
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

    pub fn create_routine(&self, command: CreateRoutineCommand) -> DomainResult<Routine> {
        if self.kid_repository.get_kid(&command.kid_id)?.is_none() {
            return Err(DomainError::not_found("kid", &command.kid_id));
        }

        let title = command.title.trim().to_string();
        let days_of_week = Self::normalize_days(command.days_of_week)?;
        Self::validate_definition(
            &title,
            command.points,
            &command.start_time,
            command.end_time.as_deref(),
            &days_of_week,
            command.date_override.is_some(),
        )?;

        let now = Utc::now();
        let routine = Routine {
            id: Routine::generate_id(),
            kid_id: command.kid_id,
            title,
            description: command.description,
            points: command.points,
            start_time: command.start_time,
            end_time: command.end_time,
            days_of_week,
            date_override: command.date_override,
            completed: false,
            completed_date: None,
            created_at: now,
            updated_at: now,
        };

        let lock = self.locks.lock_for(&routine.kid_id);
        let _guard = lock.lock().unwrap();
        self.routine_repository.store_routine(&routine)?;
        info!("Created routine: {} ({})", routine.title, routine.id);
        self.notifier.display_state_changed(&routine.kid_id);
        Ok(routine)
    }

    pub fn get_routine(&self, routine_id: &str) -> DomainResult<Routine> {
        self.routine_repository
            .get_routine(routine_id)?
            .ok_or_else(|| DomainError::not_found("routine", routine_id))
    }

    /// One kid's routines ordered by start time.
    pub fn list_routines(&self, kid_id: &str) -> DomainResult<Vec<Routine>> {
        if self.kid_repository.get_kid(kid_id)?.is_none() {
            return Err(DomainError::not_found("kid", kid_id));
        }
        Ok(self.routine_repository.list_routines(kid_id)?)
    }

    /// Update a routine's definition. Completion state is not editable here,
    /// but a completion left over from a previous day is cleared on the way
    /// through rather than written back stale.
    pub fn update_routine(&self, command: UpdateRoutineCommand) -> DomainResult<Routine> {
        let routine = self.get_routine(&command.routine_id)?;

        let lock = self.locks.lock_for(&routine.kid_id);
        let _guard = lock.lock().unwrap();

        // Reload under the lock: a toggle may have landed in between.
        let mut routine = self.get_routine(&command.routine_id)?;

        let tz = self.settings.timezone()?;
        let today = clock::today(self.clock.now_utc(), &tz);
        if routine.has_stale_completion(today) {
            routine.clear_completion();
        }

        if let Some(title) = command.title {
            routine.title = title.trim().to_string();
        }
        if let Some(description) = command.description {
            routine.description = description;
        }
        if let Some(points) = command.points {
            routine.points = points;
        }
        if let Some(start_time) = command.start_time {
            routine.start_time = start_time;
        }
        if let Some(end_time) = command.end_time {
            routine.end_time = end_time;
        }
        if let Some(days) = command.days_of_week {
            routine.days_of_week = Self::normalize_days(days)?;
        }
        if let Some(date_override) = command.date_override {
            routine.date_override = date_override;
        }

        Self::validate_definition(
            &routine.title,
            routine.points,
            &routine.start_time,
            routine.end_time.as_deref(),
            &routine.days_of_week,
            routine.date_override.is_some(),
        )?;

        routine.updated_at = Utc::now();
        self.routine_repository.update_routine(&routine)?;
        info!("Updated routine: {} ({})", routine.title, routine.id);
        self.notifier.display_state_changed(&routine.kid_id);
        Ok(routine)
    }

    pub fn delete_routine(&self, routine_id: &str) -> DomainResult<()> {
        let routine = self.get_routine(routine_id)?;

        let lock = self.locks.lock_for(&routine.kid_id);
        let _guard = lock.lock().unwrap();
        self.routine_repository.delete_routine(routine_id)?;
        info!("Deleted routine: {}", routine_id);
        self.notifier.display_state_changed(&routine.kid_id);
        Ok(())
    }

    /// Deduplicate and sort a weekday set, rejecting indices past Saturday.
    fn normalize_days(mut days: Vec<u8>) -> DomainResult<Vec<u8>> {
        if days.iter().any(|&d| d > 6) {
            return Err(DomainError::invalid_state(
                "Weekday index must be 0-6 (Sunday = 0)",
            ));
        }
        days.sort_unstable();
        days.dedup();
        Ok(days)
    }

    fn validate_definition(
        title: &str,
        points: i64,
        start_time: &str,
        end_time: Option<&str>,
        days_of_week: &[u8],
        has_override: bool,
    ) -> DomainResult<()> {
        if title.is_empty() {
            return Err(DomainError::invalid_state("Routine title cannot be empty"));
        }
        if title.len() > 100 {
            return Err(DomainError::invalid_state(
                "Routine title cannot exceed 100 characters",
            ));
        }
        if points <= 0 {
            return Err(DomainError::invalid_state(
                "Routine points must be positive",
            ));
        }
        if !clock::is_valid_clock_time(start_time) {
            return Err(DomainError::invalid_state(format!(
                "Invalid start time {:?}, expected HH:MM",
                start_time
            )));
        }
        if let Some(end) = end_time {
            if !clock::is_valid_clock_time(end) {
                return Err(DomainError::invalid_state(format!(
                    "Invalid end time {:?}, expected HH:MM",
                    end
                )));
            }
        }
        if days_of_week.is_empty() && !has_override {
            return Err(DomainError::invalid_state(
                "Routine needs recurrence days or an override date",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::FixedClock;
    use crate::domain::commands::kid::CreateKidCommand;
    use crate::domain::kid_service::KidService;
    use crate::domain::locks::KidLocks;
    use crate::domain::notify::NoopNotifier;
    use chrono::{NaiveDate, TimeZone};
    use tempfile::TempDir;

    fn setup() -> (RoutineService, String, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let connection = Arc::new(CsvConnection::new(temp_dir.path()).unwrap());
        let clock = Arc::new(FixedClock::new(
            chrono::Utc.with_ymd_and_hms(2025, 6, 16, 12, 0, 0).unwrap(),
        ));
        let settings = SettingsService::new(connection.clone());
        let locks = KidLocks::new();
        let kid_service = KidService::new(
            connection.clone(),
            locks.clone(),
            Arc::new(NoopNotifier),
        );
        let kid = kid_service
            .create_kid(CreateKidCommand {
                name: "Emma".to_string(),
                avatar: None,
            })
            .unwrap();
        let service =
            RoutineService::new(connection, clock, settings, locks, Arc::new(NoopNotifier));
        (service, kid.id, temp_dir)
    }

    fn base_command(kid_id: &str) -> CreateRoutineCommand {
        CreateRoutineCommand {
            kid_id: kid_id.to_string(),
            title: "Brush Teeth".to_string(),
            description: String::new(),
            points: 3,
            start_time: "07:15".to_string(),
            end_time: None,
            days_of_week: vec![1, 2, 3, 4, 5],
            date_override: None,
        }
    }

    #[test]
    fn test_create_routine_for_missing_kid_fails() {
        let (service, _kid_id, _tmp) = setup();
        let err = service.create_routine(base_command("kid::missing")).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn test_create_routine_validates_definition() {
        let (service, kid_id, _tmp) = setup();

        let mut cmd = base_command(&kid_id);
        cmd.points = 0;
        assert!(service.create_routine(cmd).is_err());

        let mut cmd = base_command(&kid_id);
        cmd.start_time = "7:15".to_string();
        assert!(service.create_routine(cmd).is_err());

        let mut cmd = base_command(&kid_id);
        cmd.days_of_week = vec![7];
        assert!(service.create_routine(cmd).is_err());

        let mut cmd = base_command(&kid_id);
        cmd.days_of_week = vec![];
        assert!(service.create_routine(cmd).is_err());
    }

    #[test]
    fn test_one_off_routine_needs_no_weekdays() {
        let (service, kid_id, _tmp) = setup();
        let mut cmd = base_command(&kid_id);
        cmd.days_of_week = vec![];
        cmd.date_override = Some(NaiveDate::from_ymd_opt(2025, 6, 16).unwrap());
        let routine = service.create_routine(cmd).unwrap();
        assert!(routine.days_of_week.is_empty());
        assert!(routine.date_override.is_some());
    }

    #[test]
    fn test_weekdays_are_deduplicated_and_sorted() {
        let (service, kid_id, _tmp) = setup();
        let mut cmd = base_command(&kid_id);
        cmd.days_of_week = vec![5, 1, 3, 1];
        let routine = service.create_routine(cmd).unwrap();
        assert_eq!(routine.days_of_week, vec![1, 3, 5]);
    }

    #[test]
    fn test_update_clears_stale_completion() {
        let (service, kid_id, _tmp) = setup();
        let created = service.create_routine(base_command(&kid_id)).unwrap();

        // Simulate a completion from a previous day that the reset missed.
        let mut stale = created.clone();
        stale.completed = true;
        stale.completed_date = Some(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        service.routine_repository.update_routine(&stale).unwrap();

        let updated = service
            .update_routine(UpdateRoutineCommand {
                routine_id: created.id.clone(),
                points: Some(5),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.points, 5);
        assert!(!updated.completed);
        assert!(updated.completed_date.is_none());
    }

    #[test]
    fn test_update_can_clear_override() {
        let (service, kid_id, _tmp) = setup();
        let mut cmd = base_command(&kid_id);
        cmd.date_override = Some(NaiveDate::from_ymd_opt(2025, 6, 16).unwrap());
        let created = service.create_routine(cmd).unwrap();

        let updated = service
            .update_routine(UpdateRoutineCommand {
                routine_id: created.id.clone(),
                date_override: Some(None),
                ..Default::default()
            })
            .unwrap();
        assert!(updated.date_override.is_none());

        // Clearing the override while also emptying the weekdays is invalid.
        let err = service
            .update_routine(UpdateRoutineCommand {
                routine_id: created.id,
                days_of_week: Some(vec![]),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn test_definition_edits_do_not_lose_concurrent_toggles() {
        use crate::domain::ledger_service::LedgerService;

        let temp_dir = TempDir::new().unwrap();
        let connection = Arc::new(CsvConnection::new(temp_dir.path()).unwrap());
        let clock = Arc::new(FixedClock::new(
            chrono::Utc.with_ymd_and_hms(2025, 6, 16, 12, 0, 0).unwrap(),
        ));
        let settings = SettingsService::new(connection.clone());
        let locks = KidLocks::new();
        let kids = KidService::new(connection.clone(), locks.clone(), Arc::new(NoopNotifier));
        let kid = kids
            .create_kid(CreateKidCommand {
                name: "Emma".to_string(),
                avatar: None,
            })
            .unwrap();
        let routines = RoutineService::new(
            connection.clone(),
            clock.clone(),
            settings.clone(),
            locks.clone(),
            Arc::new(NoopNotifier),
        );
        let ledger = LedgerService::new(
            connection,
            clock,
            settings,
            locks,
            Arc::new(NoopNotifier),
        );

        let toggled = routines.create_routine(base_command(&kid.id)).unwrap();
        let mut other = base_command(&kid.id);
        other.title = "Tidy Room".to_string();
        other.start_time = "18:00".to_string();
        let edited = routines.create_routine(other).unwrap();

        // Editing one routine rewrites the kid's whole routines file; done
        // while the other routine is being toggled, it must never write a
        // pre-toggle snapshot back. Toggle pairs net to zero, so any lost
        // completion shows up as a leftover balance.
        let toggler = ledger.clone();
        let toggled_id = toggled.id.clone();
        let handle = std::thread::spawn(move || {
            for _ in 0..20 {
                toggler.toggle_routine(&toggled_id).unwrap();
                toggler.toggle_routine(&toggled_id).unwrap();
            }
        });
        for i in 0..20 {
            routines
                .update_routine(UpdateRoutineCommand {
                    routine_id: edited.id.clone(),
                    title: Some(format!("Tidy Room {}", i)),
                    ..Default::default()
                })
                .unwrap();
        }
        handle.join().unwrap();

        assert!(!routines.get_routine(&toggled.id).unwrap().completed);
        assert_eq!(kids.get_kid(&kid.id).unwrap().lifetime_points, 0);
    }

    #[test]
    fn test_delete_missing_routine_is_not_found() {
        let (service, _kid_id, _tmp) = setup();
        assert!(matches!(
            service.delete_routine("routine::missing").unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }
}
