//! Redeeming points for rewards, and the history that leaves behind.

use chrono::Utc;
use log::{error, info};
use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::locks::KidLocks;
use crate::domain::models::redemption::{Redemption, RedemptionStatus};
use crate::domain::notify::DisplayNotifier;
use crate::storage::csv::{
    CsvConnection, KidRepository, RedemptionRepository, RewardRepository,
};
use crate::storage::traits::{KidStorage, RedemptionStorage, RewardStorage};

/// Service for spending points on rewards.
///
/// Every precondition is checked before any write: an error return means
/// neither the kid's counters nor the history changed. The history row
/// snapshots the cost at redemption time, so repricing a reward later never
/// rewrites what was already spent.
#[derive(Clone)]
pub struct RedemptionService {
    redemption_repository: RedemptionRepository,
    reward_repository: RewardRepository,
    kid_repository: KidRepository,
    locks: KidLocks,
    notifier: Arc<dyn DisplayNotifier>,
}

impl RedemptionService {
    pub fn new(
        connection: Arc<CsvConnection>,
        locks: KidLocks,
        notifier: Arc<dyn DisplayNotifier>,
    ) -> Self {
        Self {
            redemption_repository: RedemptionRepository::new(connection.clone()),
            reward_repository: RewardRepository::new(connection.clone()),
            kid_repository: KidRepository::new(connection),
            locks,
            notifier,
        }
    }

    /// Redeem a reward for a kid, debiting its cost from their balance.
    ///
    /// Checked in order: the kid exists, the reward exists, the reward is
    /// currently offered to this kid, the balance covers the cost. The
    /// first failed check wins and nothing is written.
    pub fn redeem(&self, kid_id: &str, reward_id: &str) -> DomainResult<Redemption> {
        let lock = self.locks.lock_for(kid_id);
        let _guard = lock.lock().unwrap();

        let mut kid = self
            .kid_repository
            .get_kid(kid_id)?
            .ok_or_else(|| DomainError::not_found("kid", kid_id))?;
        let reward = self
            .reward_repository
            .get_reward(reward_id)?
            .ok_or_else(|| DomainError::not_found("reward", reward_id))?;

        // A reward scoped to another kid reads as unavailable, not as
        // missing: it exists, this kid just cannot have it.
        if !reward.is_offered_to(kid_id) {
            return Err(DomainError::Unavailable(reward.title.clone()));
        }

        let available = kid.available_points();
        if available < reward.points_cost {
            return Err(DomainError::InsufficientPoints {
                available,
                required: reward.points_cost,
            });
        }

        let redemption = Redemption {
            id: Redemption::generate_id(),
            kid_id: kid.id.clone(),
            reward_id: reward.id.clone(),
            points_spent: reward.points_cost,
            redeemed_at: Utc::now(),
            status: RedemptionStatus::Completed,
        };

        self.redemption_repository.store_redemption(&redemption)?;
        kid.redeemed_points += reward.points_cost;
        kid.updated_at = Utc::now();
        if let Err(e) = self.kid_repository.update_kid(&kid) {
            error!("Debit failed after history write, rolling back: {}", e);
            self.redemption_repository.delete_redemption(&redemption.id)?;
            return Err(e.into());
        }

        info!(
            "{} redeemed {} for {} points ({} left)",
            kid.id,
            reward.title,
            redemption.points_spent,
            kid.available_points()
        );
        self.notifier.display_state_changed(&kid.id);
        Ok(redemption)
    }

    pub fn get_redemption(&self, redemption_id: &str) -> DomainResult<Redemption> {
        self.redemption_repository
            .get_redemption(redemption_id)?
            .ok_or_else(|| DomainError::not_found("redemption", redemption_id))
    }

    pub fn list_redemptions(&self) -> DomainResult<Vec<Redemption>> {
        Ok(self.redemption_repository.list_redemptions()?)
    }

    pub fn list_redemptions_for_kid(&self, kid_id: &str) -> DomainResult<Vec<Redemption>> {
        if self.kid_repository.get_kid(kid_id)?.is_none() {
            return Err(DomainError::not_found("kid", kid_id));
        }
        Ok(self.redemption_repository.list_redemptions_for_kid(kid_id)?)
    }

    /// Move a redemption through its fulfillment states. This is parent
    /// bookkeeping; the points were spent at redemption time either way.
    pub fn update_status(
        &self,
        redemption_id: &str,
        status: RedemptionStatus,
    ) -> DomainResult<Redemption> {
        self.redemption_repository
            .update_redemption_status(redemption_id, status)?
            .ok_or_else(|| DomainError::not_found("redemption", redemption_id))
    }

    /// Remove a redemption from the history. The spent points stay spent;
    /// deleting the record is not a refund.
    pub fn delete_redemption(&self, redemption_id: &str) -> DomainResult<()> {
        if !self.redemption_repository.delete_redemption(redemption_id)? {
            return Err(DomainError::not_found("redemption", redemption_id));
        }
        info!("Deleted redemption: {}", redemption_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commands::kid::{AdjustPointsCommand, CreateKidCommand};
    use crate::domain::commands::reward::CreateRewardCommand;
    use crate::domain::kid_service::KidService;
    use crate::domain::notify::NoopNotifier;
    use crate::domain::reward_service::RewardService;
    use tempfile::TempDir;

    struct Fixture {
        redemptions: RedemptionService,
        kids: KidService,
        rewards: RewardService,
        kid_id: String,
        _tmp: TempDir,
    }

    fn setup() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let connection = Arc::new(CsvConnection::new(tmp.path()).unwrap());
        let locks = KidLocks::new();
        let kids = KidService::new(connection.clone(), locks.clone(), Arc::new(NoopNotifier));
        let kid_id = kids
            .create_kid(CreateKidCommand {
                name: "Emma".to_string(),
                avatar: None,
            })
            .unwrap()
            .id;
        Fixture {
            redemptions: RedemptionService::new(
                connection.clone(),
                locks,
                Arc::new(NoopNotifier),
            ),
            kids,
            rewards: RewardService::new(connection),
            kid_id,
            _tmp: tmp,
        }
    }

    fn give_points(f: &Fixture, points: i64) {
        f.kids
            .adjust_lifetime_points(AdjustPointsCommand {
                kid_id: f.kid_id.clone(),
                delta: points,
                reason: None,
            })
            .unwrap();
    }

    fn add_reward(f: &Fixture, title: &str, cost: i64, available: bool, kid_id: Option<String>) -> String {
        f.rewards
            .create_reward(CreateRewardCommand {
                title: title.to_string(),
                description: String::new(),
                points_cost: cost,
                icon: None,
                available,
                kid_id,
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_redeem_debits_and_records() {
        let f = setup();
        give_points(&f, 25);
        let reward_id = add_reward(&f, "Ice Cream", 10, true, None);

        let redemption = f.redemptions.redeem(&f.kid_id, &reward_id).unwrap();
        assert_eq!(redemption.points_spent, 10);
        assert_eq!(redemption.status, RedemptionStatus::Completed);

        let kid = f.kids.get_kid(&f.kid_id).unwrap();
        assert_eq!(kid.lifetime_points, 25);
        assert_eq!(kid.redeemed_points, 10);
        assert_eq!(kid.available_points(), 15);
    }

    #[test]
    fn test_redeem_missing_reward_is_not_found() {
        let f = setup();
        give_points(&f, 25);
        assert!(matches!(
            f.redemptions.redeem(&f.kid_id, "reward::missing").unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }

    #[test]
    fn test_redeem_unavailable_reward_fails_before_balance_check() {
        let f = setup();
        // Zero balance AND unavailable: the availability error wins.
        let reward_id = add_reward(&f, "Retired", 10, false, None);
        assert!(matches!(
            f.redemptions.redeem(&f.kid_id, &reward_id).unwrap_err(),
            DomainError::Unavailable(_)
        ));
    }

    #[test]
    fn test_redeem_reward_scoped_to_other_kid_is_unavailable() {
        let f = setup();
        give_points(&f, 100);
        let liam = f
            .kids
            .create_kid(CreateKidCommand {
                name: "Liam".to_string(),
                avatar: None,
            })
            .unwrap()
            .id;
        let reward_id = add_reward(&f, "Liam Trip", 10, true, Some(liam));

        assert!(matches!(
            f.redemptions.redeem(&f.kid_id, &reward_id).unwrap_err(),
            DomainError::Unavailable(_)
        ));
    }

    #[test]
    fn test_insufficient_points_leaves_everything_untouched() {
        let f = setup();
        give_points(&f, 5);
        let reward_id = add_reward(&f, "Sleepover", 100, true, None);

        let err = f.redemptions.redeem(&f.kid_id, &reward_id).unwrap_err();
        match err {
            DomainError::InsufficientPoints { available, required } => {
                assert_eq!(available, 5);
                assert_eq!(required, 100);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(f.kids.get_kid(&f.kid_id).unwrap().redeemed_points, 0);
        assert!(f.redemptions.list_redemptions().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_survives_reprice() {
        let f = setup();
        give_points(&f, 25);
        let reward_id = add_reward(&f, "Ice Cream", 10, true, None);
        let redemption = f.redemptions.redeem(&f.kid_id, &reward_id).unwrap();

        f.rewards
            .update_reward(crate::domain::commands::reward::UpdateRewardCommand {
                reward_id,
                points_cost: Some(99),
                ..Default::default()
            })
            .unwrap();

        let reread = f.redemptions.get_redemption(&redemption.id).unwrap();
        assert_eq!(reread.points_spent, 10);
    }

    #[test]
    fn test_status_updates() {
        let f = setup();
        give_points(&f, 25);
        let reward_id = add_reward(&f, "Ice Cream", 10, true, None);
        let redemption = f.redemptions.redeem(&f.kid_id, &reward_id).unwrap();

        let approved = f
            .redemptions
            .update_status(&redemption.id, RedemptionStatus::Approved)
            .unwrap();
        assert_eq!(approved.status, RedemptionStatus::Approved);

        assert!(matches!(
            f.redemptions
                .update_status("redemption::missing", RedemptionStatus::Completed)
                .unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }

    #[test]
    fn test_delete_keeps_points_spent() {
        let f = setup();
        give_points(&f, 25);
        let reward_id = add_reward(&f, "Ice Cream", 10, true, None);
        let redemption = f.redemptions.redeem(&f.kid_id, &reward_id).unwrap();

        f.redemptions.delete_redemption(&redemption.id).unwrap();
        assert!(f.redemptions.list_redemptions().unwrap().is_empty());
        // Deleting the record is not a refund.
        assert_eq!(f.kids.get_kid(&f.kid_id).unwrap().redeemed_points, 10);

        assert!(matches!(
            f.redemptions.delete_redemption(&redemption.id).unwrap_err(),
            DomainError::NotFound { .. }
        ));
    }
}
