//! # CSV Storage Module
//!
//! File-based storage backend for the kids points tracker. The domain layer
//! is storage-agnostic; this backend keeps everything in plain CSV and YAML
//! files so the data stays inspectable and portable.
//!
//! ## Layout
//!
//! ```text
//! data/
//! ├── global_config.yaml        timezone + last reset date
//! ├── rewards.csv               reward catalog (global and kid-scoped)
//! ├── redemptions.csv           redemption history
//! └── {kid_name}/
//!     ├── kid.yaml              identity + point counters
//!     └── routines.csv          the kid's routine definitions
//! ```
//!
//! All writes go through a temp file followed by a rename, so a crash never
//! leaves a half-written file behind.

pub mod connection;
pub mod kid_repository;
pub mod redemption_repository;
pub mod reward_repository;
pub mod routine_repository;
pub mod settings_repository;

pub use connection::CsvConnection;
pub use kid_repository::KidRepository;
pub use redemption_repository::RedemptionRepository;
pub use reward_repository::RewardRepository;
pub use routine_repository::RoutineRepository;
pub use settings_repository::{GlobalConfig, SettingsRepository, SettingsStorage};
