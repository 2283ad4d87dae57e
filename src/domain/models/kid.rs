use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain model for a kid and their point ledger.
///
/// `lifetime_points` is the running total of everything ever earned,
/// `redeemed_points` the running total of everything ever spent. The
/// spendable balance is derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kid {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub lifetime_points: i64,
    pub redeemed_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Kid {
    pub fn generate_id() -> String {
        format!("kid::{}", Uuid::new_v4())
    }

    /// Spendable balance: lifetime minus redeemed, floored at zero.
    pub fn available_points(&self) -> i64 {
        (self.lifetime_points - self.redeemed_points).max(0)
    }
}
