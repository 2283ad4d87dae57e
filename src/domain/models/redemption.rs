use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state of a redemption, parent-managed after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionStatus {
    Pending,
    Approved,
    Completed,
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RedemptionStatus::Pending => "pending",
            RedemptionStatus::Approved => "approved",
            RedemptionStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for RedemptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RedemptionStatus::Pending),
            "approved" => Ok(RedemptionStatus::Approved),
            "completed" => Ok(RedemptionStatus::Completed),
            other => Err(format!("unknown redemption status: {}", other)),
        }
    }
}

/// Immutable historical record of a reward spend.
///
/// `points_spent` snapshots the reward's cost at redemption time; later
/// price changes never alter the history. Only `status` may be updated
/// after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: String,
    pub kid_id: String,
    pub reward_id: String,
    pub points_spent: i64,
    pub redeemed_at: DateTime<Utc>,
    pub status: RedemptionStatus,
}

impl Redemption {
    pub fn generate_id() -> String {
        format!("redemption::{}", Uuid::new_v4())
    }
}
