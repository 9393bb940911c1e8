//! Shared value types and repository contracts

pub mod types;
pub mod traits;
