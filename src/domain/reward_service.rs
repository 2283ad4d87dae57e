//! Reward catalog management.

use chrono::Utc;
use log::info;
use std::sync::Arc;

use crate::domain::commands::reward::{CreateRewardCommand, UpdateRewardCommand};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::reward::Reward;
use crate::storage::csv::{CsvConnection, KidRepository, RewardRepository};
use crate::storage::traits::{KidStorage, RewardStorage};

/// Service for the reward catalog. Rewards are either offered to every kid
/// or scoped to one; redemption eligibility is decided here via
/// [`Reward::is_offered_to`].
#[derive(Clone)]
pub struct RewardService {
    reward_repository: RewardRepository,
    kid_repository: KidRepository,
}

impl RewardService {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        Self {
            reward_repository: RewardRepository::new(connection.clone()),
            kid_repository: KidRepository::new(connection),
        }
    }

    pub fn create_reward(&self, command: CreateRewardCommand) -> DomainResult<Reward> {
        let title = command.title.trim().to_string();
        Self::validate_title(&title)?;
        Self::validate_cost(command.points_cost)?;
        let kid_id = self.normalize_kid_scope(command.kid_id)?;

        let now = Utc::now();
        let reward = Reward {
            id: Reward::generate_id(),
            title,
            description: command.description,
            points_cost: command.points_cost,
            icon: command.icon,
            available: command.available,
            kid_id,
            created_at: now,
            updated_at: now,
        };

        self.reward_repository.store_reward(&reward)?;
        info!("Created reward: {} ({})", reward.title, reward.id);
        Ok(reward)
    }

    pub fn get_reward(&self, reward_id: &str) -> DomainResult<Reward> {
        self.reward_repository
            .get_reward(reward_id)?
            .ok_or_else(|| DomainError::not_found("reward", reward_id))
    }

    /// The whole catalog ordered by cost, including unavailable and scoped
    /// rewards. Parent-facing view.
    pub fn list_rewards(&self) -> DomainResult<Vec<Reward>> {
        Ok(self.reward_repository.list_rewards()?)
    }

    /// Rewards a specific kid can currently redeem, cheapest first.
    /// Kid-facing view.
    pub fn available_for_kid(&self, kid_id: &str) -> DomainResult<Vec<Reward>> {
        if self.kid_repository.get_kid(kid_id)?.is_none() {
            return Err(DomainError::not_found("kid", kid_id));
        }
        let mut rewards = self.reward_repository.list_rewards()?;
        rewards.retain(|r| r.is_offered_to(kid_id));
        Ok(rewards)
    }

    pub fn update_reward(&self, command: UpdateRewardCommand) -> DomainResult<Reward> {
        let mut reward = self.get_reward(&command.reward_id)?;

        if let Some(title) = command.title {
            let title = title.trim().to_string();
            Self::validate_title(&title)?;
            reward.title = title;
        }
        if let Some(description) = command.description {
            reward.description = description;
        }
        if let Some(points_cost) = command.points_cost {
            Self::validate_cost(points_cost)?;
            reward.points_cost = points_cost;
        }
        if let Some(icon) = command.icon {
            reward.icon = icon;
        }
        if let Some(available) = command.available {
            reward.available = available;
        }
        if let Some(kid_id) = command.kid_id {
            reward.kid_id = self.normalize_kid_scope(kid_id)?;
        }
        reward.updated_at = Utc::now();

        self.reward_repository.update_reward(&reward)?;
        info!("Updated reward: {} ({})", reward.title, reward.id);
        Ok(reward)
    }

    pub fn delete_reward(&self, reward_id: &str) -> DomainResult<()> {
        if !self.reward_repository.delete_reward(reward_id)? {
            return Err(DomainError::not_found("reward", reward_id));
        }
        info!("Deleted reward: {}", reward_id);
        Ok(())
    }

    /// An empty kid id means "offered to everyone" and is stored as `None`.
    /// A concrete id must name an existing kid.
    fn normalize_kid_scope(&self, kid_id: Option<String>) -> DomainResult<Option<String>> {
        match kid_id {
            None => Ok(None),
            Some(id) if id.is_empty() => Ok(None),
            Some(id) => {
                if self.kid_repository.get_kid(&id)?.is_none() {
                    return Err(DomainError::not_found("kid", id));
                }
                Ok(Some(id))
            }
        }
    }

    fn validate_title(title: &str) -> DomainResult<()> {
        if title.is_empty() {
            return Err(DomainError::invalid_state("Reward title cannot be empty"));
        }
        if title.len() > 100 {
            return Err(DomainError::invalid_state(
                "Reward title cannot exceed 100 characters",
            ));
        }
        Ok(())
    }

    // Zero-cost rewards are allowed; they are freebies a parent can gate
    // with the availability flag.
    fn validate_cost(points_cost: i64) -> DomainResult<()> {
        if points_cost < 0 {
            return Err(DomainError::invalid_state(
                "Reward cost cannot be negative",
            ));
        }
        Ok(())
    }
}
