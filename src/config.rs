//! Configuration management with validation and defaults
//!
//! An [`EngineConfig`] can be built in code, taken from a preset, or parsed
//! from TOML. Every path ends in [`EngineConfig::validate`].

use crate::common::types::{ContributionStrategyKind, JackpotConfig, RewardStrategyKind};
use crate::errors::{JackpotError, JackpotResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub random: RandomConfig,
    pub monitoring: MonitoringConfig,
    pub jackpots: Vec<JackpotSeed>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            pipeline: PipelineConfig::default(),
            random: RandomConfig::default(),
            monitoring: MonitoringConfig::default(),
            jackpots: JackpotSeed::reference_set(),
        }
    }
}

/// Optimistic-commit tuning for the jackpot store
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub max_commit_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 3,
            retry_backoff_ms: 10,
        }
    }
}

impl StoreConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// In-process bet hand-off queue
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { queue_capacity: 1024 }
    }
}

/// Reward draw source; `None` means OS-seeded
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RandomConfig {
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self { log_level: LogLevel::Info }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// A jackpot to create at startup
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JackpotSeed {
    pub id: String,
    pub initial_pool: Decimal,
    pub config: JackpotConfig,
}

impl JackpotSeed {
    /// JP-1 .. JP-4: two fixed pools (0.1% and 100% chance) and two variable
    /// pools, the second of which always pays out.
    pub fn reference_set() -> Vec<JackpotSeed> {
        let thousand = Decimal::new(100_000, 2);
        let five_hundred = Decimal::new(50_000, 2);
        let one_percent = Decimal::new(1, 2);

        vec![
            JackpotSeed {
                id: "JP-1".to_string(),
                initial_pool: thousand,
                config: JackpotConfig::new(ContributionStrategyKind::Fixed, RewardStrategyKind::FixedChance)
                    .with_fixed_contribution(one_percent)
                    .with_fixed_reward(Decimal::new(1, 3)),
            },
            JackpotSeed {
                id: "JP-2".to_string(),
                initial_pool: thousand,
                config: JackpotConfig::new(ContributionStrategyKind::Fixed, RewardStrategyKind::FixedChance)
                    .with_fixed_contribution(one_percent)
                    .with_fixed_reward(Decimal::ONE),
            },
            JackpotSeed {
                id: "JP-3".to_string(),
                initial_pool: five_hundred,
                config: JackpotConfig::new(ContributionStrategyKind::Variable, RewardStrategyKind::VariableChance)
                    .with_variable_contribution(Decimal::new(5, 2), Decimal::new(1, 4))
                    .with_variable_reward(Decimal::new(1, 5), Decimal::new(1, 6), Decimal::new(10_000_000, 2)),
            },
            JackpotSeed {
                id: "JP-4".to_string(),
                initial_pool: five_hundred,
                config: JackpotConfig::new(ContributionStrategyKind::Variable, RewardStrategyKind::VariableChance)
                    .with_variable_contribution(Decimal::new(5, 2), Decimal::new(1, 4))
                    .with_variable_reward(Decimal::new(1, 5), Decimal::ONE_THOUSAND, Decimal::new(100, 2)),
            },
        ]
    }
}

impl EngineConfig {
    /// Deterministic, no-sleep configuration for tests and simulations
    pub fn testing() -> Self {
        Self {
            store: StoreConfig {
                max_commit_attempts: 3,
                retry_backoff_ms: 0,
            },
            random: RandomConfig { seed: Some(7) },
            monitoring: MonitoringConfig {
                log_level: LogLevel::Debug,
            },
            ..Default::default()
        }
    }

    /// Parse TOML and validate
    pub fn from_toml_str(raw: &str) -> JackpotResult<Self> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file and validate
    pub fn load(path: impl AsRef<Path>) -> JackpotResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> JackpotResult<()> {
        if self.store.max_commit_attempts == 0 {
            return Err(JackpotError::Configuration(
                "store.max_commit_attempts must be > 0".to_string(),
            ));
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(JackpotError::Configuration(
                "pipeline.queue_capacity must be > 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for seed in &self.jackpots {
            if seed.id.trim().is_empty() {
                return Err(JackpotError::Configuration("jackpot id must not be blank".to_string()));
            }
            if !seen.insert(seed.id.as_str()) {
                return Err(JackpotError::Configuration(format!("duplicate jackpot id: {}", seed.id)));
            }
            if seed.initial_pool < Decimal::ZERO {
                return Err(JackpotError::Configuration(format!(
                    "jackpot {} has a negative initial pool",
                    seed.id
                )));
            }
        }

        Ok(())
    }
}
