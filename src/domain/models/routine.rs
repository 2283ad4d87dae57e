use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain model for a routine task owned by one kid.
///
/// A routine either recurs on a weekday set (`days_of_week`, 0-6 with
/// Sunday = 0) or is pinned to a single date via `date_override`. When an
/// override is set the weekday set is ignored for scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub kid_id: String,
    pub title: String,
    pub description: String,
    /// Points awarded when the routine is completed. Always positive.
    pub points: i64,
    /// Wall-clock start as zero-padded "HH:MM"; ordered lexicographically.
    pub start_time: String,
    pub end_time: Option<String>,
    pub days_of_week: Vec<u8>,
    pub date_override: Option<NaiveDate>,
    pub completed: bool,
    /// Date the last completion happened, used to spot completions that
    /// leaked across a day boundary.
    pub completed_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Routine {
    pub fn generate_id() -> String {
        format!("routine::{}", Uuid::new_v4())
    }

    /// True when the routine is marked complete but the completion belongs
    /// to a different day, meaning the daily reset never caught it.
    pub fn has_stale_completion(&self, today: NaiveDate) -> bool {
        self.completed && self.completed_date != Some(today)
    }

    /// Clear completion state. Never touches any point balance: points
    /// earned on the day of completion stay earned.
    pub fn clear_completion(&mut self) {
        self.completed = false;
        self.completed_date = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_routine(completed: bool, completed_date: Option<NaiveDate>) -> Routine {
        let now = Utc::now();
        Routine {
            id: Routine::generate_id(),
            kid_id: "kid::test".to_string(),
            title: "Brush Teeth".to_string(),
            description: String::new(),
            points: 3,
            start_time: "07:15".to_string(),
            end_time: None,
            days_of_week: vec![0, 1, 2, 3, 4, 5, 6],
            date_override: None,
            completed,
            completed_date,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_stale_completion_detection() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        assert!(sample_routine(true, Some(yesterday)).has_stale_completion(today));
        assert!(sample_routine(true, None).has_stale_completion(today));
        assert!(!sample_routine(true, Some(today)).has_stale_completion(today));
        assert!(!sample_routine(false, None).has_stale_completion(today));
    }

    #[test]
    fn test_clear_completion() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut routine = sample_routine(true, Some(today));
        routine.clear_completion();
        assert!(!routine.completed);
        assert!(routine.completed_date.is_none());
    }
}
