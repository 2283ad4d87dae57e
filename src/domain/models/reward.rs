use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain model for a redeemable reward in the catalog.
///
/// `kid_id = None` means the reward is offered to every kid; otherwise it is
/// scoped to a single kid. `available` is the parent's on/off gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: String,
    pub title: String,
    pub description: String,
    pub points_cost: i64,
    pub icon: Option<String>,
    pub available: bool,
    pub kid_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    pub fn generate_id() -> String {
        format!("reward::{}", Uuid::new_v4())
    }

    /// Whether this reward can currently be redeemed by the given kid.
    pub fn is_offered_to(&self, kid_id: &str) -> bool {
        self.available && self.kid_id.as_deref().map_or(true, |scoped| scoped == kid_id)
    }
}
