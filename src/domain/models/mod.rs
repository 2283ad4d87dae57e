pub mod kid;
pub mod redemption;
pub mod routine;
pub mod reward;
