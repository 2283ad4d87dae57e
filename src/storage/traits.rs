//! Storage abstraction traits.
//!
//! The domain layer works against these traits so the file-based backend
//! can be swapped for any transactional row store without touching the
//! business rules. All operations are synchronous.

use anyhow::Result;

use crate::domain::models::kid::Kid;
use crate::domain::models::redemption::{Redemption, RedemptionStatus};
use crate::domain::models::reward::Reward;
use crate::domain::models::routine::Routine;

/// Kid storage operations.
pub trait KidStorage: Send + Sync {
    /// Store a new kid.
    fn store_kid(&self, kid: &Kid) -> Result<()>;

    /// Retrieve a specific kid by id.
    fn get_kid(&self, kid_id: &str) -> Result<Option<Kid>>;

    /// List all kids ordered by name.
    fn list_kids(&self) -> Result<Vec<Kid>>;

    /// Update an existing kid.
    fn update_kid(&self, kid: &Kid) -> Result<()>;

    /// Delete a kid and everything stored under their directory.
    fn delete_kid(&self, kid_id: &str) -> Result<()>;
}

/// Routine storage operations.
pub trait RoutineStorage: Send + Sync {
    /// Store a new routine under its kid.
    fn store_routine(&self, routine: &Routine) -> Result<()>;

    /// Retrieve a routine by id, searching every kid.
    fn get_routine(&self, routine_id: &str) -> Result<Option<Routine>>;

    /// List one kid's routines ordered by start time.
    fn list_routines(&self, kid_id: &str) -> Result<Vec<Routine>>;

    /// List every routine across all kids.
    fn list_all_routines(&self) -> Result<Vec<Routine>>;

    /// Update an existing routine.
    fn update_routine(&self, routine: &Routine) -> Result<()>;

    /// Delete a routine. Returns true if it existed.
    fn delete_routine(&self, routine_id: &str) -> Result<bool>;

    /// Clear completion state on every one of a kid's routines without a
    /// date override. Returns how many routines were actually cleared.
    /// This is the daily reset's per-kid update, so the caller can hold
    /// that kid's lock around it.
    fn clear_recurring_completion_for_kid(&self, kid_id: &str) -> Result<u32>;
}

/// Reward catalog storage operations.
pub trait RewardStorage: Send + Sync {
    /// Store a new reward.
    fn store_reward(&self, reward: &Reward) -> Result<()>;

    /// Retrieve a reward by id.
    fn get_reward(&self, reward_id: &str) -> Result<Option<Reward>>;

    /// List the whole catalog ordered by cost.
    fn list_rewards(&self) -> Result<Vec<Reward>>;

    /// Update an existing reward.
    fn update_reward(&self, reward: &Reward) -> Result<()>;

    /// Delete a reward. Returns true if it existed.
    fn delete_reward(&self, reward_id: &str) -> Result<bool>;

    /// Delete every reward scoped to a kid (cascade on kid deletion).
    fn delete_rewards_for_kid(&self, kid_id: &str) -> Result<u32>;
}

/// Redemption history storage operations.
///
/// Redemption records are immutable apart from their status, so there is no
/// general update method.
pub trait RedemptionStorage: Send + Sync {
    /// Store a new redemption record.
    fn store_redemption(&self, redemption: &Redemption) -> Result<()>;

    /// Retrieve a redemption by id.
    fn get_redemption(&self, redemption_id: &str) -> Result<Option<Redemption>>;

    /// List all redemptions, most recent first.
    fn list_redemptions(&self) -> Result<Vec<Redemption>>;

    /// List one kid's redemptions, most recent first.
    fn list_redemptions_for_kid(&self, kid_id: &str) -> Result<Vec<Redemption>>;

    /// Update only the status of a redemption. Returns the updated record
    /// if it existed.
    fn update_redemption_status(
        &self,
        redemption_id: &str,
        status: RedemptionStatus,
    ) -> Result<Option<Redemption>>;

    /// Delete a redemption. Returns true if it existed.
    fn delete_redemption(&self, redemption_id: &str) -> Result<bool>;

    /// Delete every redemption belonging to a kid (cascade on kid deletion).
    fn delete_redemptions_for_kid(&self, kid_id: &str) -> Result<u32>;
}
