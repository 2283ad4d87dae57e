//! Domain error types surfaced to callers of the service layer.

use thiserror::Error;

pub type DomainResult<T> = std::result::Result<T, DomainError>;

/// Errors produced by the domain services.
///
/// Every balance-affecting check runs before any write, so a returned error
/// means no mutation was applied. Timezone resolution problems are not
/// represented here: scheduling falls back to UTC instead of failing.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("reward is not available: {0}")]
    Unavailable(String),

    #[error("not enough points: {available} available, {required} required")]
    InsufficientPoints { available: i64, required: i64 },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DomainError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        DomainError::InvalidState(reason.into())
    }
}
