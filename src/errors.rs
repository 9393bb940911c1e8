//! Error types for the jackpot engine
//!
//! Every failure the engine can surface is a variant of [`JackpotError`].
//! Callers that only care about the broad category (for example to pick an
//! HTTP status) use [`JackpotError::kind`] instead of matching variants.

use crate::common::types::{ContributionStrategyKind, RewardStrategyKind};
use std::fmt;

/// Root error type for all jackpot operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JackpotError {
    #[error("No matching jackpot found for ID: {jackpot_id}")]
    JackpotNotFound { jackpot_id: String },

    #[error("Bet not found: {bet_id}")]
    BetNotFound { bet_id: String },

    #[error("Jackpot {jackpot_id} has no configuration")]
    MissingConfig { jackpot_id: String },

    #[error("No contribution strategy registered for kind: {0}")]
    UnknownContributionStrategy(ContributionStrategyKind),

    #[error("No reward strategy registered for kind: {0}")]
    UnknownRewardStrategy(RewardStrategyKind),

    #[error("Invalid configuration for {strategy}: {reason}")]
    InvalidConfig { strategy: String, reason: String },

    #[error("Failed to update jackpot {jackpot_id} after {attempts} attempts due to concurrent modification")]
    ConcurrencyExhausted { jackpot_id: String, attempts: u32 },

    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Rejected jackpot update: {0}")]
    InvariantViolation(String),

    #[error("History write failed: {0}")]
    History(String),

    #[error("Bet pipeline is closed")]
    PipelineClosed,
}

/// Broad error category, stable across variant additions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidConfig,
    UnknownStrategy,
    ConcurrencyExhausted,
    InvalidInput,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "NOT_FOUND"),
            ErrorKind::InvalidConfig => write!(f, "INVALID_CONFIG"),
            ErrorKind::UnknownStrategy => write!(f, "UNKNOWN_STRATEGY"),
            ErrorKind::ConcurrencyExhausted => write!(f, "CONCURRENCY_EXHAUSTED"),
            ErrorKind::InvalidInput => write!(f, "INVALID_INPUT"),
            ErrorKind::Internal => write!(f, "INTERNAL_ERROR"),
        }
    }
}

impl JackpotError {
    pub fn jackpot_not_found(jackpot_id: impl Into<String>) -> Self {
        Self::JackpotNotFound {
            jackpot_id: jackpot_id.into(),
        }
    }

    pub fn invalid_config(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            JackpotError::JackpotNotFound { .. } | JackpotError::BetNotFound { .. } => ErrorKind::NotFound,
            JackpotError::MissingConfig { .. } | JackpotError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            JackpotError::UnknownContributionStrategy(_) | JackpotError::UnknownRewardStrategy(_) => {
                ErrorKind::UnknownStrategy
            }
            JackpotError::ConcurrencyExhausted { .. } => ErrorKind::ConcurrencyExhausted,
            JackpotError::InvalidBet(_) | JackpotError::Configuration(_) => ErrorKind::InvalidInput,
            JackpotError::InvariantViolation(_) | JackpotError::History(_) | JackpotError::PipelineClosed => {
                ErrorKind::Internal
            }
        }
    }

    /// Only lost-update exhaustion is worth retrying from the caller's side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JackpotError::ConcurrencyExhausted { .. })
    }
}

impl From<toml::de::Error> for JackpotError {
    fn from(e: toml::de::Error) -> Self {
        JackpotError::Configuration(e.to_string())
    }
}

impl From<std::io::Error> for JackpotError {
    fn from(e: std::io::Error) -> Self {
        JackpotError::Configuration(format!("Failed to read configuration: {}", e))
    }
}

// Convenience type alias for Results
pub type JackpotResult<T> = Result<T, JackpotError>;
