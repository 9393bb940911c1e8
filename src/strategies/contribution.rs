//! Contribution strategies: how much of a stake flows into the pool

use crate::common::types::{round_money, scaled_pool, ContributionStrategyKind, JackpotConfig};
use crate::errors::{JackpotError, JackpotResult};
use rust_decimal::Decimal;
use tracing::debug;

/// Lower bound on the variable rate (0.1%), so large pools still grow
pub const MIN_VARIABLE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// `stake * rate`, failing instead of overflowing on absurd stakes
fn share_of_stake(stake_amount: Decimal, rate: Decimal) -> JackpotResult<Decimal> {
    stake_amount
        .checked_mul(rate)
        .map(round_money)
        .ok_or_else(|| JackpotError::InvalidBet(format!("stake {} is too large to contribute", stake_amount)))
}

/// Deterministic contribution calculation
pub trait ContributionStrategy: Send + Sync {
    fn kind(&self) -> ContributionStrategyKind;

    /// Amount to add to the pool for this stake, rounded to cents
    fn compute(&self, stake_amount: Decimal, current_pool: Decimal, config: &JackpotConfig) -> JackpotResult<Decimal>;
}

/// `stake * fixed_rate`
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedContribution;

impl ContributionStrategy for FixedContribution {
    fn kind(&self) -> ContributionStrategyKind {
        ContributionStrategyKind::Fixed
    }

    fn compute(&self, stake_amount: Decimal, _current_pool: Decimal, config: &JackpotConfig) -> JackpotResult<Decimal> {
        let rate = config.fixed_contribution_rate;
        if rate.is_zero() {
            return Err(JackpotError::invalid_config(
                "fixed contribution",
                "fixed_contribution_rate must be non-zero",
            ));
        }

        let contribution = share_of_stake(stake_amount, rate)?;
        debug!(%stake_amount, %rate, %contribution, "fixed contribution computed");
        Ok(contribution)
    }
}

/// Rate shrinks as the pool grows: `max(initial - (pool / 1000) * decrease, 0.001)`
#[derive(Debug, Default, Clone, Copy)]
pub struct VariableContribution;

impl VariableContribution {
    pub fn effective_rate(current_pool: Decimal, config: &JackpotConfig) -> JackpotResult<Decimal> {
        scaled_pool(current_pool)
            .checked_mul(config.variable_contribution_decrease_rate)
            .and_then(|decrease| config.variable_contribution_initial_rate.checked_sub(decrease))
            .map(|rate| rate.max(MIN_VARIABLE_RATE))
            .ok_or_else(|| {
                JackpotError::invalid_config(
                    "variable contribution",
                    format!("rate overflows at pool {}", current_pool),
                )
            })
    }
}

impl ContributionStrategy for VariableContribution {
    fn kind(&self) -> ContributionStrategyKind {
        ContributionStrategyKind::Variable
    }

    fn compute(&self, stake_amount: Decimal, current_pool: Decimal, config: &JackpotConfig) -> JackpotResult<Decimal> {
        if config.variable_contribution_initial_rate.is_zero() || config.variable_contribution_decrease_rate.is_zero() {
            return Err(JackpotError::invalid_config(
                "variable contribution",
                "variable_contribution_initial_rate and variable_contribution_decrease_rate must be non-zero",
            ));
        }

        let rate = Self::effective_rate(current_pool, config)?;
        let contribution = share_of_stake(stake_amount, rate)?;
        debug!(%stake_amount, %current_pool, effective_rate = %rate, %contribution, "variable contribution computed");
        Ok(contribution)
    }
}
