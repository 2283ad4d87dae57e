//! Business logic for the kids points tracker.
//!
//! Services are thin, cloneable structs over the storage repositories. Each
//! owns one concern: profiles and adjustments (`kid_service`), routine
//! definitions (`routine_service`), today's schedule (`schedule_service`),
//! the completion ledger (`ledger_service`), the daily reset
//! (`reset_service`), the reward catalog (`reward_service`), spending
//! (`redemption_service`), and household settings (`settings_service`).

pub mod clock;
pub mod commands;
pub mod errors;
pub mod kid_service;
pub mod ledger_service;
pub mod locks;
pub mod models;
pub mod notify;
pub mod redemption_service;
pub mod reset_service;
pub mod reward_service;
pub mod routine_service;
pub mod schedule_service;
pub mod settings_service;

pub use errors::{DomainError, DomainResult};
pub use kid_service::KidService;
pub use ledger_service::LedgerService;
pub use redemption_service::RedemptionService;
pub use reset_service::ResetService;
pub use reward_service::RewardService;
pub use routine_service::RoutineService;
pub use schedule_service::ScheduleService;
pub use settings_service::SettingsService;
