//! Shared value types for the jackpot engine
//!
//! All types here are immutable snapshots. An "update" to a jackpot is always
//! a new [`Jackpot`] value handed to the store's commit path.

use crate::errors::{JackpotError, JackpotResult};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Every this-many units in the pool shifts a variable rate by one step.
pub const POOL_SCALING_FACTOR: Decimal = Decimal::ONE_THOUSAND;

/// Fractional digits kept on money amounts
pub const MONEY_SCALE: u32 = 2;

/// Fractional digits kept on the scaled pool before it is multiplied by a rate
pub const POOL_FACTOR_SCALE: u32 = 4;

/// Round a money amount to cents, half-up.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `pool / 1000`, rounded half-up to four places.
pub fn scaled_pool(pool: Decimal) -> Decimal {
    (pool / POOL_SCALING_FACTOR)
        .round_dp_with_strategy(POOL_FACTOR_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Contribution algorithm selected by a jackpot configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStrategyKind {
    Fixed,
    Variable,
}

impl fmt::Display for ContributionStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributionStrategyKind::Fixed => write!(f, "fixed"),
            ContributionStrategyKind::Variable => write!(f, "variable"),
        }
    }
}

/// Reward algorithm selected by a jackpot configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RewardStrategyKind {
    FixedChance,
    VariableChance,
}

impl fmt::Display for RewardStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardStrategyKind::FixedChance => write!(f, "fixed_chance"),
            RewardStrategyKind::VariableChance => write!(f, "variable_chance"),
        }
    }
}

/// A user's bet against one jackpot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bet {
    pub id: String,
    pub user_id: String,
    pub jackpot_id: String,
    pub stake_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Bet {
    /// Build a bet with explicit identity, rejecting blank ids and non-positive stakes
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        jackpot_id: impl Into<String>,
        stake_amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> JackpotResult<Self> {
        let bet = Self {
            id: id.into(),
            user_id: user_id.into(),
            jackpot_id: jackpot_id.into(),
            stake_amount,
            created_at,
        };
        bet.validate()?;
        Ok(bet)
    }

    /// Build a bet with a fresh UUID v4 id and the current time
    pub fn place(
        user_id: impl Into<String>,
        jackpot_id: impl Into<String>,
        stake_amount: Decimal,
    ) -> JackpotResult<Self> {
        Self::new(Uuid::new_v4().to_string(), user_id, jackpot_id, stake_amount, Utc::now())
    }

    pub fn validate(&self) -> JackpotResult<()> {
        if self.id.trim().is_empty() {
            return Err(JackpotError::InvalidBet("bet id must not be blank".to_string()));
        }
        if self.user_id.trim().is_empty() {
            return Err(JackpotError::InvalidBet("user id must not be blank".to_string()));
        }
        if self.jackpot_id.trim().is_empty() {
            return Err(JackpotError::InvalidBet("jackpot id must not be blank".to_string()));
        }
        if self.stake_amount <= Decimal::ZERO {
            return Err(JackpotError::InvalidBet(format!(
                "stake amount must be positive, got {}",
                self.stake_amount
            )));
        }
        Ok(())
    }
}

/// Strategy selection and parameters for a jackpot.
///
/// Only the fields relevant to the declared strategy kinds are read; the rest
/// stay zero (or `None`) and are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JackpotConfig {
    pub contribution_strategy: ContributionStrategyKind,
    pub reward_strategy: RewardStrategyKind,
    #[serde(default)]
    pub fixed_contribution_rate: Decimal,
    #[serde(default)]
    pub variable_contribution_initial_rate: Decimal,
    #[serde(default)]
    pub variable_contribution_decrease_rate: Decimal,
    #[serde(default)]
    pub fixed_reward_chance: Decimal,
    #[serde(default)]
    pub variable_reward_initial_chance: Decimal,
    #[serde(default)]
    pub variable_reward_increase_rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_reward_chance_limit: Option<Decimal>,
}

impl JackpotConfig {
    pub fn new(contribution_strategy: ContributionStrategyKind, reward_strategy: RewardStrategyKind) -> Self {
        Self {
            contribution_strategy,
            reward_strategy,
            fixed_contribution_rate: Decimal::ZERO,
            variable_contribution_initial_rate: Decimal::ZERO,
            variable_contribution_decrease_rate: Decimal::ZERO,
            fixed_reward_chance: Decimal::ZERO,
            variable_reward_initial_chance: Decimal::ZERO,
            variable_reward_increase_rate: Decimal::ZERO,
            variable_reward_chance_limit: None,
        }
    }

    pub fn with_fixed_contribution(mut self, rate: Decimal) -> Self {
        self.fixed_contribution_rate = rate;
        self
    }

    pub fn with_variable_contribution(mut self, initial_rate: Decimal, decrease_rate: Decimal) -> Self {
        self.variable_contribution_initial_rate = initial_rate;
        self.variable_contribution_decrease_rate = decrease_rate;
        self
    }

    pub fn with_fixed_reward(mut self, chance: Decimal) -> Self {
        self.fixed_reward_chance = chance;
        self
    }

    pub fn with_variable_reward(mut self, initial_chance: Decimal, increase_rate: Decimal, chance_limit: Decimal) -> Self {
        self.variable_reward_initial_chance = initial_chance;
        self.variable_reward_increase_rate = increase_rate;
        self.variable_reward_chance_limit = Some(chance_limit);
        self
    }
}

/// Snapshot of a jackpot as held by the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Jackpot {
    pub id: String,
    pub current_pool: Decimal,
    pub initial_pool: Decimal,
    pub config: Option<JackpotConfig>,
    pub created_at: DateTime<Utc>,
}

impl Jackpot {
    /// A freshly provisioned jackpot starts with its pool at the initial value
    pub fn new(id: impl Into<String>, initial_pool: Decimal, config: Option<JackpotConfig>) -> Self {
        Self {
            id: id.into(),
            current_pool: initial_pool,
            initial_pool,
            config,
            created_at: Utc::now(),
        }
    }

    /// Copy of this snapshot with a different pool amount
    pub fn with_pool(&self, current_pool: Decimal) -> Self {
        Self {
            current_pool,
            ..self.clone()
        }
    }

    /// Copy of this snapshot with the pool back at its initial value
    pub fn reset(&self) -> Self {
        self.with_pool(self.initial_pool)
    }
}

/// History record written after a successful contribution commit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JackpotContribution {
    pub bet_id: String,
    pub user_id: String,
    pub jackpot_id: String,
    pub stake_amount: Decimal,
    pub contribution_amount: Decimal,
    /// Pool value returned by the commit, not the locally computed sum
    pub current_pool_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// History record written after a winning evaluation resets the pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JackpotReward {
    pub bet_id: String,
    pub user_id: String,
    pub jackpot_id: String,
    pub reward_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful `contribute` call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContributionOutcome {
    pub record: JackpotContribution,
    /// False when the pool committed but the history append failed
    pub history_recorded: bool,
}

impl ContributionOutcome {
    pub fn contribution_amount(&self) -> Decimal {
        self.record.contribution_amount
    }

    pub fn pool_after(&self) -> Decimal {
        self.record.current_pool_amount
    }
}

/// Result of a successful `evaluate` call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewardEvaluation {
    pub bet_id: String,
    pub jackpot_id: String,
    pub won: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<JackpotReward>,
    pub history_recorded: bool,
}

impl RewardEvaluation {
    pub fn no_reward(bet: &Bet) -> Self {
        Self {
            bet_id: bet.id.clone(),
            jackpot_id: bet.jackpot_id.clone(),
            won: false,
            reward_amount: None,
            record: None,
            history_recorded: false,
        }
    }

    pub fn rewarded(record: JackpotReward, history_recorded: bool) -> Self {
        Self {
            bet_id: record.bet_id.clone(),
            jackpot_id: record.jackpot_id.clone(),
            won: true,
            reward_amount: Some(record.reward_amount),
            record: Some(record),
            history_recorded,
        }
    }
}
