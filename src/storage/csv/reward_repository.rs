use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, warn};
use std::fs;
use std::sync::Arc;

use super::connection::CsvConnection;
use crate::domain::models::reward::Reward;
use crate::storage::traits::RewardStorage;

const REWARDS_HEADER: [&str; 9] = [
    "id",
    "title",
    "description",
    "points_cost",
    "icon",
    "available",
    "kid_id",
    "created_at",
    "updated_at",
];

/// File-based reward catalog: a single `rewards.csv` at the data directory
/// root, holding both global rewards and kid-scoped ones (empty `kid_id`
/// column means global).
#[derive(Clone)]
pub struct RewardRepository {
    connection: Arc<CsvConnection>,
}

impl RewardRepository {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        Self { connection }
    }

    fn read_rewards(&self) -> Result<Vec<Reward>> {
        let file_path = self.connection.rewards_file_path();
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&file_path)?;
        let mut csv_reader = ReaderBuilder::new().from_reader(contents.as_bytes());

        let mut rewards = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            match Self::parse_record(&record) {
                Ok(reward) => rewards.push(reward),
                Err(e) => warn!("Skipping malformed reward row: {}", e),
            }
        }
        Ok(rewards)
    }

    fn write_rewards(&self, rewards: &[Reward]) -> Result<()> {
        let mut csv_writer = WriterBuilder::new().from_writer(Vec::new());
        csv_writer.write_record(REWARDS_HEADER)?;

        for reward in rewards {
            let record = [
                reward.id.clone(),
                reward.title.clone(),
                reward.description.clone(),
                reward.points_cost.to_string(),
                reward.icon.clone().unwrap_or_default(),
                reward.available.to_string(),
                reward.kid_id.clone().unwrap_or_default(),
                reward.created_at.to_rfc3339(),
                reward.updated_at.to_rfc3339(),
            ];
            csv_writer.write_record(&record)?;
        }

        let bytes = csv_writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush rewards csv: {}", e))?;
        self.connection
            .write_atomic(&self.connection.rewards_file_path(), &bytes)?;
        debug!("Wrote {} rewards to rewards.csv", rewards.len());
        Ok(())
    }

    fn parse_record(record: &csv::StringRecord) -> Result<Reward> {
        let field = |i: usize| record.get(i).unwrap_or("").to_string();

        let icon = field(4);
        let kid_id = field(6);
        Ok(Reward {
            id: field(0),
            title: field(1),
            description: field(2),
            points_cost: field(3).parse().context("invalid points_cost")?,
            icon: if icon.is_empty() { None } else { Some(icon) },
            available: field(5) == "true",
            kid_id: if kid_id.is_empty() { None } else { Some(kid_id) },
            created_at: chrono::DateTime::parse_from_rfc3339(&field(7))
                .context("invalid created_at")?
                .with_timezone(&chrono::Utc),
            updated_at: chrono::DateTime::parse_from_rfc3339(&field(8))
                .context("invalid updated_at")?
                .with_timezone(&chrono::Utc),
        })
    }
}

impl RewardStorage for RewardRepository {
    fn store_reward(&self, reward: &Reward) -> Result<()> {
        let mut rewards = self.read_rewards()?;
        rewards.push(reward.clone());
        self.write_rewards(&rewards)
    }

    fn get_reward(&self, reward_id: &str) -> Result<Option<Reward>> {
        Ok(self
            .read_rewards()?
            .into_iter()
            .find(|r| r.id == reward_id))
    }

    fn list_rewards(&self) -> Result<Vec<Reward>> {
        let mut rewards = self.read_rewards()?;
        rewards.sort_by(|a, b| {
            a.points_cost
                .cmp(&b.points_cost)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(rewards)
    }

    fn update_reward(&self, reward: &Reward) -> Result<()> {
        let mut rewards = self.read_rewards()?;
        let slot = rewards
            .iter_mut()
            .find(|r| r.id == reward.id)
            .ok_or_else(|| anyhow::anyhow!("Reward not found for update: {}", reward.id))?;
        *slot = reward.clone();
        self.write_rewards(&rewards)
    }

    fn delete_reward(&self, reward_id: &str) -> Result<bool> {
        let mut rewards = self.read_rewards()?;
        let before = rewards.len();
        rewards.retain(|r| r.id != reward_id);
        if rewards.len() < before {
            self.write_rewards(&rewards)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn delete_rewards_for_kid(&self, kid_id: &str) -> Result<u32> {
        let mut rewards = self.read_rewards()?;
        let before = rewards.len();
        rewards.retain(|r| r.kid_id.as_deref() != Some(kid_id));
        let removed = (before - rewards.len()) as u32;
        if removed > 0 {
            self.write_rewards(&rewards)?;
        }
        Ok(removed)
    }
}
