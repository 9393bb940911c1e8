//! Contribution and reward strategies, and the registry the engine dispatches through

pub mod contribution;
pub mod reward;

pub use contribution::{ContributionStrategy, FixedContribution, VariableContribution, MIN_VARIABLE_RATE};
pub use reward::{FixedChanceReward, RewardStrategy, VariableChanceReward, WinChance};

use crate::common::types::{ContributionStrategyKind, RewardStrategyKind};
use crate::errors::{JackpotError, JackpotResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only lookup from strategy kind to implementation.
///
/// Built once at startup and shared across concurrent calls without locking.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    contribution: HashMap<ContributionStrategyKind, Arc<dyn ContributionStrategy>>,
    reward: HashMap<RewardStrategyKind, Arc<dyn RewardStrategy>>,
}

impl StrategyRegistry {
    /// Registry with nothing in it
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy
    pub fn standard() -> Self {
        Self::empty()
            .with_contribution(Arc::new(FixedContribution))
            .with_contribution(Arc::new(VariableContribution))
            .with_reward(Arc::new(FixedChanceReward))
            .with_reward(Arc::new(VariableChanceReward))
    }

    pub fn with_contribution(mut self, strategy: Arc<dyn ContributionStrategy>) -> Self {
        self.contribution.insert(strategy.kind(), strategy);
        self
    }

    pub fn with_reward(mut self, strategy: Arc<dyn RewardStrategy>) -> Self {
        self.reward.insert(strategy.kind(), strategy);
        self
    }

    pub fn contribution(&self, kind: ContributionStrategyKind) -> JackpotResult<Arc<dyn ContributionStrategy>> {
        self.contribution
            .get(&kind)
            .cloned()
            .ok_or(JackpotError::UnknownContributionStrategy(kind))
    }

    pub fn reward(&self, kind: RewardStrategyKind) -> JackpotResult<Arc<dyn RewardStrategy>> {
        self.reward
            .get(&kind)
            .cloned()
            .ok_or(JackpotError::UnknownRewardStrategy(kind))
    }
}
