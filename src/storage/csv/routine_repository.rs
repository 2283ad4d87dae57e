use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use super::connection::CsvConnection;
use super::kid_repository::KidRepository;
use crate::domain::models::routine::Routine;
use crate::storage::traits::RoutineStorage;

const ROUTINES_HEADER: [&str; 13] = [
    "id",
    "kid_id",
    "title",
    "description",
    "points",
    "start_time",
    "end_time",
    "days_of_week",
    "date_override",
    "completed",
    "completed_date",
    "created_at",
    "updated_at",
];

/// File-based routine repository: one `routines.csv` inside each kid's
/// directory. The weekday set is stored as a JSON array in a single column,
/// matching how the rest of the row stays flat.
#[derive(Clone)]
pub struct RoutineRepository {
    connection: Arc<CsvConnection>,
    kid_repository: KidRepository,
}

impl RoutineRepository {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        let kid_repository = KidRepository::new(connection.clone());
        Self {
            connection,
            kid_repository,
        }
    }

    fn routines_file_path(&self, directory_name: &str) -> PathBuf {
        self.connection
            .kid_directory(directory_name)
            .join("routines.csv")
    }

    /// All kid directory names under the data directory.
    fn kid_directories(&self) -> Result<Vec<String>> {
        let base_dir = self.connection.base_directory();
        if !base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(base_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                dirs.push(name.to_string());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn read_routines(&self, directory_name: &str) -> Result<Vec<Routine>> {
        let file_path = self.routines_file_path(directory_name);
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&file_path)?;
        let mut csv_reader = ReaderBuilder::new().from_reader(contents.as_bytes());

        let mut routines = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            match Self::parse_record(&record) {
                Ok(routine) => routines.push(routine),
                Err(e) => warn!(
                    "Skipping malformed routine row in {}: {}",
                    directory_name, e
                ),
            }
        }
        Ok(routines)
    }

    fn write_routines(&self, directory_name: &str, routines: &[Routine]) -> Result<()> {
        let mut csv_writer = WriterBuilder::new().from_writer(Vec::new());
        csv_writer.write_record(ROUTINES_HEADER)?;

        for routine in routines {
            let record = [
                routine.id.clone(),
                routine.kid_id.clone(),
                routine.title.clone(),
                routine.description.clone(),
                routine.points.to_string(),
                routine.start_time.clone(),
                routine.end_time.clone().unwrap_or_default(),
                serde_json::to_string(&routine.days_of_week)?,
                routine
                    .date_override
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                routine.completed.to_string(),
                routine
                    .completed_date
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                routine.created_at.to_rfc3339(),
                routine.updated_at.to_rfc3339(),
            ];
            csv_writer.write_record(&record)?;
        }

        let bytes = csv_writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush routines csv: {}", e))?;
        let file_path = self.routines_file_path(directory_name);
        self.connection.write_atomic(&file_path, &bytes)?;
        debug!(
            "Wrote {} routines to {}/routines.csv",
            routines.len(),
            directory_name
        );
        Ok(())
    }

    fn parse_record(record: &csv::StringRecord) -> Result<Routine> {
        let field = |i: usize| record.get(i).unwrap_or("").to_string();

        let parse_date = |s: &str| -> Result<Option<NaiveDate>> {
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .with_context(|| format!("invalid date: {}", s))?,
                ))
            }
        };

        let end_time = field(6);
        Ok(Routine {
            id: field(0),
            kid_id: field(1),
            title: field(2),
            description: field(3),
            points: field(4).parse().context("invalid points")?,
            start_time: field(5),
            end_time: if end_time.is_empty() {
                None
            } else {
                Some(end_time)
            },
            days_of_week: serde_json::from_str(&field(7)).context("invalid days_of_week")?,
            date_override: parse_date(&field(8))?,
            completed: field(9) == "true",
            completed_date: parse_date(&field(10))?,
            created_at: chrono::DateTime::parse_from_rfc3339(&field(11))
                .context("invalid created_at")?
                .with_timezone(&chrono::Utc),
            updated_at: chrono::DateTime::parse_from_rfc3339(&field(12))
                .context("invalid updated_at")?
                .with_timezone(&chrono::Utc),
        })
    }

    fn directory_for_kid(&self, kid_id: &str) -> Result<String> {
        self.kid_repository
            .find_directory_by_kid_id(kid_id)?
            .ok_or_else(|| anyhow::anyhow!("No directory for kid: {}", kid_id))
    }
}

impl RoutineStorage for RoutineRepository {
    fn store_routine(&self, routine: &Routine) -> Result<()> {
        let dir_name = self.directory_for_kid(&routine.kid_id)?;
        let mut routines = self.read_routines(&dir_name)?;
        routines.push(routine.clone());
        self.write_routines(&dir_name, &routines)
    }

    fn get_routine(&self, routine_id: &str) -> Result<Option<Routine>> {
        for dir_name in self.kid_directories()? {
            let routines = self.read_routines(&dir_name)?;
            if let Some(routine) = routines.into_iter().find(|r| r.id == routine_id) {
                return Ok(Some(routine));
            }
        }
        Ok(None)
    }

    fn list_routines(&self, kid_id: &str) -> Result<Vec<Routine>> {
        let dir_name = match self.kid_repository.find_directory_by_kid_id(kid_id)? {
            Some(dir) => dir,
            None => return Ok(Vec::new()),
        };
        let mut routines = self.read_routines(&dir_name)?;
        routines.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(routines)
    }

    fn list_all_routines(&self) -> Result<Vec<Routine>> {
        let mut all = Vec::new();
        for dir_name in self.kid_directories()? {
            all.extend(self.read_routines(&dir_name)?);
        }
        Ok(all)
    }

    fn update_routine(&self, routine: &Routine) -> Result<()> {
        let dir_name = self.directory_for_kid(&routine.kid_id)?;
        let mut routines = self.read_routines(&dir_name)?;

        let slot = routines
            .iter_mut()
            .find(|r| r.id == routine.id)
            .ok_or_else(|| anyhow::anyhow!("Routine not found for update: {}", routine.id))?;
        *slot = routine.clone();

        self.write_routines(&dir_name, &routines)
    }

    fn delete_routine(&self, routine_id: &str) -> Result<bool> {
        for dir_name in self.kid_directories()? {
            let mut routines = self.read_routines(&dir_name)?;
            let before = routines.len();
            routines.retain(|r| r.id != routine_id);
            if routines.len() < before {
                self.write_routines(&dir_name, &routines)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn clear_recurring_completion_for_kid(&self, kid_id: &str) -> Result<u32> {
        let dir_name = match self.kid_repository.find_directory_by_kid_id(kid_id)? {
            Some(dir) => dir,
            None => return Ok(0),
        };

        let mut routines = self.read_routines(&dir_name)?;
        let mut cleared = 0u32;
        for routine in routines.iter_mut() {
            if routine.date_override.is_none()
                && (routine.completed || routine.completed_date.is_some())
            {
                routine.clear_completion();
                cleared += 1;
            }
        }
        if cleared > 0 {
            self.write_routines(&dir_name, &routines)?;
            info!("Cleared {} routine completions for {}", cleared, kid_id);
        }
        Ok(cleared)
    }
}
