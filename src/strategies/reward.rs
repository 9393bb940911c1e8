//! Reward strategies: does this bet win the whole pool?

use crate::common::traits::RandomSource;
use crate::common::types::{scaled_pool, JackpotConfig, RewardStrategyKind};
use crate::errors::{JackpotError, JackpotResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Probability of a win for one draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WinChance {
    /// Win without drawing
    Certain,
    /// Win iff `draw < p`
    Probability(Decimal),
}

pub trait RewardStrategy: Send + Sync {
    fn kind(&self) -> RewardStrategyKind;

    /// Check that the fields this strategy reads are present and positive
    fn validate(&self, config: &JackpotConfig) -> JackpotResult<()>;

    /// Chance of winning against the given pool. Assumes `validate` passed.
    fn win_chance(&self, stake_amount: Decimal, current_pool: Decimal, config: &JackpotConfig) -> WinChance;

    /// One uniform draw against the win chance.
    ///
    /// An invalid config is logged and treated as a loss here; the engine
    /// validates first so it never reaches this path.
    fn check_win(
        &self,
        stake_amount: Decimal,
        current_pool: Decimal,
        config: &JackpotConfig,
        rng: &dyn RandomSource,
    ) -> bool {
        if let Err(e) = self.validate(config) {
            warn!(strategy = %self.kind(), error = %e, "reward strategy misconfigured, treating as loss");
            return false;
        }

        match self.win_chance(stake_amount, current_pool, config) {
            WinChance::Certain => {
                debug!(strategy = %self.kind(), %current_pool, "win is certain");
                true
            }
            WinChance::Probability(chance) => {
                let draw = rng.next_f64();
                let wins = draw < chance.to_f64().unwrap_or(0.0);
                debug!(strategy = %self.kind(), %current_pool, %chance, draw, wins, "reward draw");
                wins
            }
        }
    }
}

/// Constant chance per bet
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedChanceReward;

impl RewardStrategy for FixedChanceReward {
    fn kind(&self) -> RewardStrategyKind {
        RewardStrategyKind::FixedChance
    }

    fn validate(&self, config: &JackpotConfig) -> JackpotResult<()> {
        if config.fixed_reward_chance <= Decimal::ZERO {
            return Err(JackpotError::invalid_config(
                "fixed chance reward",
                "fixed_reward_chance must be positive",
            ));
        }
        Ok(())
    }

    fn win_chance(&self, _stake_amount: Decimal, _current_pool: Decimal, config: &JackpotConfig) -> WinChance {
        WinChance::Probability(config.fixed_reward_chance)
    }
}

/// Chance grows with the pool and becomes certain at the configured limit
#[derive(Debug, Default, Clone, Copy)]
pub struct VariableChanceReward;

impl RewardStrategy for VariableChanceReward {
    fn kind(&self) -> RewardStrategyKind {
        RewardStrategyKind::VariableChance
    }

    fn validate(&self, config: &JackpotConfig) -> JackpotResult<()> {
        if config.variable_reward_initial_chance <= Decimal::ZERO
            || config.variable_reward_increase_rate <= Decimal::ZERO
        {
            return Err(JackpotError::invalid_config(
                "variable chance reward",
                "variable_reward_initial_chance and variable_reward_increase_rate must be positive",
            ));
        }
        if config.variable_reward_chance_limit.is_none() {
            return Err(JackpotError::invalid_config(
                "variable chance reward",
                "variable_reward_chance_limit is required",
            ));
        }
        Ok(())
    }

    fn win_chance(&self, _stake_amount: Decimal, current_pool: Decimal, config: &JackpotConfig) -> WinChance {
        if let Some(limit) = config.variable_reward_chance_limit {
            if current_pool >= limit {
                return WinChance::Certain;
            }
        }

        // Overflow only happens far past a chance of one
        let chance = scaled_pool(current_pool)
            .checked_mul(config.variable_reward_increase_rate)
            .and_then(|increase| config.variable_reward_initial_chance.checked_add(increase))
            .map_or(Decimal::ONE, |chance| chance.min(Decimal::ONE));
        WinChance::Probability(chance)
    }
}
