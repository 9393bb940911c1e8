//! Startup wiring: in-memory repositories, seeded jackpots, and the engine

use crate::{
    common::{traits::JackpotRepository, types::Jackpot},
    config::{EngineConfig, JackpotSeed},
    engine::JackpotEngine,
    errors::JackpotResult,
    metrics::EngineMetrics,
    rng,
    storage::{InMemoryBetRepository, InMemoryContributionRepository, InMemoryJackpotStore, InMemoryRewardRepository},
    strategies::StrategyRegistry,
};
use std::sync::Arc;
use tracing::info;

/// Insert every seed with its pool at the initial value.
///
/// Seeds are saved in order; an existing jackpot with the same id is replaced.
pub async fn provision_jackpots(seeds: &[JackpotSeed], store: &dyn JackpotRepository) -> JackpotResult<Vec<Jackpot>> {
    let mut provisioned = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let jackpot = Jackpot::new(seed.id.clone(), seed.initial_pool, Some(seed.config.clone()));
        provisioned.push(store.save(jackpot).await?);
    }
    info!(count = provisioned.len(), "provisioned jackpots");
    Ok(provisioned)
}

/// Concrete repositories kept alongside the engine so callers can inspect them
pub struct InMemoryBackend {
    pub jackpots: Arc<InMemoryJackpotStore>,
    pub bets: Arc<InMemoryBetRepository>,
    pub contributions: Arc<InMemoryContributionRepository>,
    pub rewards: Arc<InMemoryRewardRepository>,
    pub metrics: Arc<EngineMetrics>,
}

impl InMemoryBackend {
    pub fn new(config: &EngineConfig) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        Self {
            jackpots: Arc::new(InMemoryJackpotStore::new(&config.store).with_metrics(metrics.clone())),
            bets: Arc::new(InMemoryBetRepository::new()),
            contributions: Arc::new(InMemoryContributionRepository::new()),
            rewards: Arc::new(InMemoryRewardRepository::new()),
            metrics,
        }
    }

    /// Engine over these repositories with the standard strategies
    pub fn engine(&self, config: &EngineConfig) -> JackpotEngine {
        JackpotEngine::new(
            self.jackpots.clone(),
            self.contributions.clone(),
            self.rewards.clone(),
            StrategyRegistry::standard(),
            rng::from_seed(config.random.seed),
        )
        .with_metrics(self.metrics.clone())
    }
}

/// Validate `config`, build the backend, and provision its jackpots
pub async fn bootstrap(config: &EngineConfig) -> JackpotResult<(InMemoryBackend, Arc<JackpotEngine>)> {
    config.validate()?;
    let backend = InMemoryBackend::new(config);
    provision_jackpots(&config.jackpots, backend.jackpots.as_ref()).await?;
    let engine = Arc::new(backend.engine(config));
    Ok((backend, engine))
}
