//! Domain-level command and result types.
//!
//! These structs are the inputs and outputs of the domain services. Any
//! surrounding HTTP or UI layer is responsible for mapping its own DTOs to
//! these internal types.

pub mod kid {
    use crate::domain::models::kid::Kid;

    /// Input for creating a new kid.
    #[derive(Debug, Clone)]
    pub struct CreateKidCommand {
        pub name: String,
        pub avatar: Option<String>,
    }

    /// Input for updating a kid's profile fields.
    #[derive(Debug, Clone)]
    pub struct UpdateKidCommand {
        pub kid_id: String,
        pub name: Option<String>,
        pub avatar: Option<String>,
    }

    /// Input for an administrative point adjustment, positive or negative.
    #[derive(Debug, Clone)]
    pub struct AdjustPointsCommand {
        pub kid_id: String,
        pub delta: i64,
        pub reason: Option<String>,
    }

    /// Result of an adjustment: the kid after the clamped delta was applied.
    #[derive(Debug, Clone)]
    pub struct AdjustPointsResult {
        pub kid: Kid,
        pub applied_delta: i64,
    }
}

pub mod routine {
    use chrono::NaiveDate;

    /// Input for creating a new routine.
    #[derive(Debug, Clone)]
    pub struct CreateRoutineCommand {
        pub kid_id: String,
        pub title: String,
        pub description: String,
        pub points: i64,
        pub start_time: String,
        pub end_time: Option<String>,
        pub days_of_week: Vec<u8>,
        pub date_override: Option<NaiveDate>,
    }

    /// Input for updating a routine's definition. `None` leaves a field
    /// unchanged; `date_override` uses a double `Option` so it can be
    /// explicitly cleared.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateRoutineCommand {
        pub routine_id: String,
        pub title: Option<String>,
        pub description: Option<String>,
        pub points: Option<i64>,
        pub start_time: Option<String>,
        pub end_time: Option<Option<String>>,
        pub days_of_week: Option<Vec<u8>>,
        pub date_override: Option<Option<NaiveDate>>,
    }
}

pub mod reward {
    /// Input for creating a new reward.
    #[derive(Debug, Clone)]
    pub struct CreateRewardCommand {
        pub title: String,
        pub description: String,
        pub points_cost: i64,
        pub icon: Option<String>,
        pub available: bool,
        /// None (or empty string, which is normalized to None) offers the
        /// reward to every kid.
        pub kid_id: Option<String>,
    }

    /// Input for updating a reward definition.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateRewardCommand {
        pub reward_id: String,
        pub title: Option<String>,
        pub description: Option<String>,
        pub points_cost: Option<i64>,
        pub icon: Option<Option<String>>,
        pub available: Option<bool>,
        pub kid_id: Option<Option<String>>,
    }
}

pub mod ledger {
    use crate::domain::models::kid::Kid;
    use crate::domain::models::routine::Routine;

    /// Result of toggling a routine: both sides of the transition.
    #[derive(Debug, Clone)]
    pub struct ToggleOutcome {
        pub routine: Routine,
        pub kid: Kid,
    }

    /// Result of a half-credit penalty.
    #[derive(Debug, Clone)]
    pub struct PenaltyOutcome {
        pub routine: Routine,
        pub kid: Kid,
        pub points_reduced: i64,
    }
}

pub mod reset {
    /// Result of a daily-reset attempt.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ResetOutcome {
        /// The reset already ran for the current local day; nothing changed.
        AlreadyReset,
        /// The reset ran and cleared this many recurring completions.
        Reset { routines_cleared: u32 },
    }
}

pub mod schedule {
    /// Today's point totals over the resolved routine list.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TodayPoints {
        pub earned: i64,
        pub total: i64,
    }
}
