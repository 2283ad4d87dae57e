//! Storage layer: trait abstractions plus the CSV/YAML file backend.

pub mod csv;
pub mod traits;

pub use csv::CsvConnection;
pub use traits::{KidStorage, RedemptionStorage, RewardStorage, RoutineStorage};
