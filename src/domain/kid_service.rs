//! Kid profiles and the lifetime point ledger.

use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;

use crate::domain::commands::kid::{
    AdjustPointsCommand, AdjustPointsResult, CreateKidCommand, UpdateKidCommand,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::locks::KidLocks;
use crate::domain::models::kid::Kid;
use crate::domain::notify::DisplayNotifier;
use crate::storage::csv::{
    CsvConnection, KidRepository, RedemptionRepository, RewardRepository,
};
use crate::storage::traits::{KidStorage, RedemptionStorage, RewardStorage};

/// Service for managing kids and administrative point adjustments.
#[derive(Clone)]
pub struct KidService {
    kid_repository: KidRepository,
    reward_repository: RewardRepository,
    redemption_repository: RedemptionRepository,
    locks: KidLocks,
    notifier: Arc<dyn DisplayNotifier>,
}

impl KidService {
    pub fn new(
        connection: Arc<CsvConnection>,
        locks: KidLocks,
        notifier: Arc<dyn DisplayNotifier>,
    ) -> Self {
        Self {
            kid_repository: KidRepository::new(connection.clone()),
            reward_repository: RewardRepository::new(connection.clone()),
            redemption_repository: RedemptionRepository::new(connection),
            locks,
            notifier,
        }
    }

    /// Create a new kid with a zeroed ledger.
    pub fn create_kid(&self, command: CreateKidCommand) -> DomainResult<Kid> {
        let name = command.name.trim().to_string();
        Self::validate_name(&name)?;

        let now = Utc::now();
        let kid = Kid {
            id: Kid::generate_id(),
            name,
            avatar: command.avatar,
            lifetime_points: 0,
            redeemed_points: 0,
            created_at: now,
            updated_at: now,
        };

        self.kid_repository.store_kid(&kid)?;
        info!("Created kid: {} ({})", kid.name, kid.id);
        Ok(kid)
    }

    pub fn get_kid(&self, kid_id: &str) -> DomainResult<Kid> {
        self.kid_repository
            .get_kid(kid_id)?
            .ok_or_else(|| DomainError::not_found("kid", kid_id))
    }

    pub fn list_kids(&self) -> DomainResult<Vec<Kid>> {
        Ok(self.kid_repository.list_kids()?)
    }

    /// Update a kid's profile fields. Point counters are never touched here;
    /// those move only through toggles, penalties, adjustments and
    /// redemptions. The whole row is rewritten regardless, counters
    /// included, so the read-modify-write runs under the kid's lock like
    /// any balance operation.
    pub fn update_kid(&self, command: UpdateKidCommand) -> DomainResult<Kid> {
        let lock = self.locks.lock_for(&command.kid_id);
        let _guard = lock.lock().unwrap();

        let mut kid = self.get_kid(&command.kid_id)?;

        if let Some(name) = command.name {
            let name = name.trim().to_string();
            Self::validate_name(&name)?;
            kid.name = name;
        }
        if let Some(avatar) = command.avatar {
            kid.avatar = if avatar.is_empty() { None } else { Some(avatar) };
        }
        kid.updated_at = Utc::now();

        self.kid_repository.update_kid(&kid)?;
        info!("Updated kid: {} ({})", kid.name, kid.id);
        Ok(kid)
    }

    /// Delete a kid along with their routines, scoped rewards and redemption
    /// history.
    pub fn delete_kid(&self, kid_id: &str) -> DomainResult<()> {
        let kid = self.get_kid(kid_id)?;

        // Routines live inside the kid's directory and go with it.
        self.kid_repository.delete_kid(kid_id)?;
        let rewards = self.reward_repository.delete_rewards_for_kid(kid_id)?;
        let redemptions = self.redemption_repository.delete_redemptions_for_kid(kid_id)?;

        info!(
            "Deleted kid {} ({}) with {} scoped rewards and {} redemptions",
            kid.name, kid.id, rewards, redemptions
        );
        Ok(())
    }

    /// Apply an administrative adjustment to a kid's lifetime points. The
    /// balance is floored at zero, so the applied delta can be smaller in
    /// magnitude than the requested one.
    pub fn adjust_lifetime_points(
        &self,
        command: AdjustPointsCommand,
    ) -> DomainResult<AdjustPointsResult> {
        let lock = self.locks.lock_for(&command.kid_id);
        let _guard = lock.lock().unwrap();

        let mut kid = self.get_kid(&command.kid_id)?;
        let before = kid.lifetime_points;
        kid.lifetime_points = (kid.lifetime_points + command.delta).max(0);
        let applied_delta = kid.lifetime_points - before;
        kid.updated_at = Utc::now();

        self.kid_repository.update_kid(&kid)?;

        if applied_delta != command.delta {
            warn!(
                "Adjustment for {} clamped from {} to {}",
                kid.id, command.delta, applied_delta
            );
        }
        info!(
            "Adjusted lifetime points for {} by {} (reason: {})",
            kid.id,
            applied_delta,
            command.reason.as_deref().unwrap_or("none")
        );

        self.notifier.display_state_changed(&kid.id);
        Ok(AdjustPointsResult { kid, applied_delta })
    }

    fn validate_name(name: &str) -> DomainResult<()> {
        if name.is_empty() {
            return Err(DomainError::invalid_state("Kid name cannot be empty"));
        }
        if name.len() > 100 {
            return Err(DomainError::invalid_state(
                "Kid name cannot exceed 100 characters",
            ));
        }
        Ok(())
    }
}
