//! Jackpot - progressive jackpot engine
//!
//! Bets feed a configurable share of their stake into a jackpot pool and are
//! then drawn against a configurable win chance. A winning bet takes the pool,
//! which resets to its initial value. Every pool change goes through an
//! optimistic compare-and-swap commit with bounded retry, so concurrent bets
//! on the same jackpot never lose an update.

pub mod common;
pub mod config;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod pipeline;
pub mod provisioning;
pub mod rng;
pub mod storage;
pub mod strategies;

pub use common::traits::{BetRepository, ContributionRepository, JackpotRepository, RandomSource, RewardRepository};
pub use common::types::{
    Bet, ContributionOutcome, ContributionStrategyKind, Jackpot, JackpotConfig, JackpotContribution, JackpotReward,
    RewardEvaluation, RewardStrategyKind,
};
pub use config::{EngineConfig, JackpotSeed};
pub use engine::JackpotEngine;
pub use errors::{ErrorKind, JackpotError, JackpotResult};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use pipeline::{BetPipeline, BetService, BetSettlement, SettlementHandle};
pub use provisioning::{bootstrap, provision_jackpots, InMemoryBackend};
pub use strategies::StrategyRegistry;
