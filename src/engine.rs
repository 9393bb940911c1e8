//! Jackpot engine: contribute and evaluate
//!
//! Both entry points share the same preamble (jackpot lookup, config lookup,
//! strategy lookup) and then go through the store's commit path for any pool
//! change. History is written after the commit and is best-effort: a failed
//! append is logged and flagged on the outcome, but never unwinds the pool.

use crate::{
    common::{
        traits::{ContributionRepository, JackpotRepository, RandomSource, RewardRepository},
        types::{Bet, ContributionOutcome, Jackpot, JackpotConfig, JackpotContribution, JackpotReward, RewardEvaluation},
    },
    errors::{JackpotError, JackpotResult},
    metrics::EngineMetrics,
    strategies::StrategyRegistry,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct JackpotEngine {
    jackpots: Arc<dyn JackpotRepository>,
    contributions: Arc<dyn ContributionRepository>,
    rewards: Arc<dyn RewardRepository>,
    strategies: StrategyRegistry,
    rng: Arc<dyn RandomSource>,
    metrics: Arc<EngineMetrics>,
}

impl JackpotEngine {
    pub fn new(
        jackpots: Arc<dyn JackpotRepository>,
        contributions: Arc<dyn ContributionRepository>,
        rewards: Arc<dyn RewardRepository>,
        strategies: StrategyRegistry,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            jackpots,
            contributions,
            rewards,
            strategies,
            rng,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    /// Share counters with other components, such as the jackpot store
    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Add this bet's share to its jackpot and record the contribution
    pub async fn contribute(&self, bet: &Bet) -> JackpotResult<ContributionOutcome> {
        let result = self.try_contribute(bet).await;
        match &result {
            Ok(outcome) => {
                self.metrics.record_contribution();
                info!(
                    bet_id = %bet.id,
                    jackpot_id = %bet.jackpot_id,
                    amount = %outcome.contribution_amount(),
                    pool = %outcome.pool_after(),
                    "bet contributed to jackpot"
                );
            }
            Err(e) => {
                self.metrics.record_failure();
                warn!(bet_id = %bet.id, jackpot_id = %bet.jackpot_id, error = %e, "contribution failed");
            }
        }
        result
    }

    /// Draw for a win; on a win pay out the pool and reset it
    pub async fn evaluate(&self, bet: &Bet) -> JackpotResult<RewardEvaluation> {
        let result = self.try_evaluate(bet).await;
        match &result {
            Ok(evaluation) => {
                self.metrics.record_evaluation(evaluation.won);
                if evaluation.won {
                    info!(
                        bet_id = %bet.id,
                        jackpot_id = %bet.jackpot_id,
                        reward = ?evaluation.reward_amount,
                        "bet won jackpot"
                    );
                } else {
                    debug!(bet_id = %bet.id, jackpot_id = %bet.jackpot_id, "bet did not win jackpot");
                }
            }
            Err(e) => {
                self.metrics.record_failure();
                warn!(bet_id = %bet.id, jackpot_id = %bet.jackpot_id, error = %e, "reward evaluation failed");
            }
        }
        result
    }

    async fn load(&self, bet: &Bet) -> JackpotResult<(Jackpot, JackpotConfig)> {
        bet.validate()?;
        let jackpot = self.jackpots.get(&bet.jackpot_id).await?;
        let config = jackpot.config.clone().ok_or_else(|| JackpotError::MissingConfig {
            jackpot_id: jackpot.id.clone(),
        })?;
        Ok((jackpot, config))
    }

    async fn try_contribute(&self, bet: &Bet) -> JackpotResult<ContributionOutcome> {
        let (jackpot, config) = self.load(bet).await?;
        let strategy = self.strategies.contribution(config.contribution_strategy)?;
        let amount = strategy.compute(bet.stake_amount, jackpot.current_pool, &config)?;

        // The amount is fixed; each retry adds it to whatever pool is current
        let committed = self
            .jackpots
            .commit(&jackpot.id, &|current: &Jackpot| {
                let pool = current.current_pool.checked_add(amount).ok_or_else(|| {
                    JackpotError::InvariantViolation(format!("pool of {} would overflow", current.id))
                })?;
                Ok(current.with_pool(pool))
            })
            .await?;

        let record = JackpotContribution {
            bet_id: bet.id.clone(),
            user_id: bet.user_id.clone(),
            jackpot_id: committed.id.clone(),
            stake_amount: bet.stake_amount,
            contribution_amount: amount,
            current_pool_amount: committed.current_pool,
            created_at: Utc::now(),
        };

        let history_recorded = match self.contributions.save(record.clone()).await {
            Ok(_) => true,
            Err(e) => {
                self.metrics.record_history_failure();
                error!(bet_id = %bet.id, jackpot_id = %committed.id, error = %e, "contribution committed but history append failed");
                false
            }
        };

        Ok(ContributionOutcome { record, history_recorded })
    }

    async fn try_evaluate(&self, bet: &Bet) -> JackpotResult<RewardEvaluation> {
        let (jackpot, config) = self.load(bet).await?;
        let strategy = self.strategies.reward(config.reward_strategy)?;
        // Misconfiguration surfaces as an error here, never as a silent loss
        strategy.validate(&config)?;

        let wins = strategy.check_win(bet.stake_amount, jackpot.current_pool, &config, self.rng.as_ref());
        if !wins {
            return Ok(RewardEvaluation::no_reward(bet));
        }

        // Payout is the pool seen at decision time; anything committed between
        // the draw and the reset is folded into the reset.
        let reward_amount = jackpot.current_pool;
        let reset = self
            .jackpots
            .commit(&jackpot.id, &|current: &Jackpot| Ok(current.reset()))
            .await?;
        debug!(jackpot_id = %reset.id, pool = %reset.current_pool, "jackpot reset to initial pool");

        let record = JackpotReward {
            bet_id: bet.id.clone(),
            user_id: bet.user_id.clone(),
            jackpot_id: reset.id.clone(),
            reward_amount,
            created_at: Utc::now(),
        };

        let history_recorded = match self.rewards.save(record.clone()).await {
            Ok(_) => true,
            Err(e) => {
                self.metrics.record_history_failure();
                error!(bet_id = %bet.id, jackpot_id = %reset.id, error = %e, "jackpot reset but reward append failed");
                false
            }
        };

        Ok(RewardEvaluation::rewarded(record, history_recorded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::{
            traits::JackpotMutation,
            types::{ContributionStrategyKind, RewardStrategyKind},
        },
        config::StoreConfig,
        rng::SequenceRandom,
        storage::{InMemoryContributionRepository, InMemoryJackpotStore, InMemoryRewardRepository},
        strategies::{FixedChanceReward, FixedContribution},
    };
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Harness {
        store: Arc<InMemoryJackpotStore>,
        contributions: Arc<InMemoryContributionRepository>,
        rewards: Arc<InMemoryRewardRepository>,
        rng: Arc<SequenceRandom>,
        engine: JackpotEngine,
    }

    fn harness(draws: Vec<f64>) -> Harness {
        harness_with(draws, StrategyRegistry::standard())
    }

    fn harness_with(draws: Vec<f64>, strategies: StrategyRegistry) -> Harness {
        let store = Arc::new(InMemoryJackpotStore::new(&StoreConfig {
            max_commit_attempts: 3,
            retry_backoff_ms: 0,
        }));
        let contributions = Arc::new(InMemoryContributionRepository::new());
        let rewards = Arc::new(InMemoryRewardRepository::new());
        let rng = Arc::new(SequenceRandom::new(draws));
        let engine = JackpotEngine::new(
            store.clone(),
            contributions.clone(),
            rewards.clone(),
            strategies,
            rng.clone(),
        );
        Harness {
            store,
            contributions,
            rewards,
            rng,
            engine,
        }
    }

    fn fixed(chance: Decimal) -> JackpotConfig {
        JackpotConfig::new(ContributionStrategyKind::Fixed, RewardStrategyKind::FixedChance)
            .with_fixed_contribution(dec!(0.01))
            .with_fixed_reward(chance)
    }

    fn variable(limit: Decimal) -> JackpotConfig {
        JackpotConfig::new(ContributionStrategyKind::Variable, RewardStrategyKind::VariableChance)
            .with_variable_contribution(dec!(0.05), dec!(0.0001))
            .with_variable_reward(dec!(0.00001), dec!(0.000001), limit)
    }

    fn bet(id: &str, jackpot_id: &str, stake: Decimal) -> Bet {
        Bet::new(id, "user-1", jackpot_id, stake, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_contribute_fixed() {
        let h = harness(vec![0.5]);
        h.store.save(Jackpot::new("JP-1", dec!(1000.00), Some(fixed(dec!(0.001))))).await.unwrap();

        let outcome = h.engine.contribute(&bet("bet-1", "JP-1", dec!(100.00))).await.unwrap();

        assert_eq!(outcome.contribution_amount(), dec!(1.00));
        assert_eq!(outcome.pool_after(), dec!(1001.00));
        assert!(outcome.history_recorded);
        assert_eq!(h.store.get("JP-1").await.unwrap().current_pool, dec!(1001.00));

        let record = h
            .contributions
            .find_by_bet_and_jackpot("bet-1", "JP-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.stake_amount, dec!(100.00));
        assert_eq!(record.current_pool_amount, dec!(1001.00));
        assert_eq!(h.engine.metrics().snapshot().contributions, 1);
    }

    #[tokio::test]
    async fn test_contribute_variable() {
        let h = harness(vec![0.5]);
        h.store.save(Jackpot::new("JP-3", dec!(2000.00), Some(variable(dec!(100000))))).await.unwrap();

        let outcome = h.engine.contribute(&bet("bet-1", "JP-3", dec!(50.00))).await.unwrap();

        assert_eq!(outcome.contribution_amount(), dec!(2.49));
        assert_eq!(outcome.pool_after(), dec!(2002.49));
    }

    #[tokio::test]
    async fn test_contribute_unknown_jackpot() {
        let h = harness(vec![0.5]);
        let err = h.engine.contribute(&bet("bet-1", "JP-404", dec!(10))).await.unwrap_err();
        assert_eq!(err, JackpotError::jackpot_not_found("JP-404"));
        assert!(h.contributions.is_empty());
        assert_eq!(h.engine.metrics().snapshot().failures, 1);
    }

    #[tokio::test]
    async fn test_contribute_missing_config() {
        let h = harness(vec![0.5]);
        h.store.save(Jackpot::new("JP-1", dec!(1000.00), None)).await.unwrap();

        let err = h.engine.contribute(&bet("bet-1", "JP-1", dec!(10))).await.unwrap_err();
        assert!(matches!(err, JackpotError::MissingConfig { .. }));
        assert_eq!(h.store.get("JP-1").await.unwrap().current_pool, dec!(1000.00));
    }

    #[tokio::test]
    async fn test_contribute_unknown_strategy() {
        let strategies = StrategyRegistry::empty().with_reward(Arc::new(FixedChanceReward));
        let h = harness_with(vec![0.5], strategies);
        h.store.save(Jackpot::new("JP-1", dec!(1000.00), Some(fixed(dec!(0.5))))).await.unwrap();

        let err = h.engine.contribute(&bet("bet-1", "JP-1", dec!(10))).await.unwrap_err();
        assert_eq!(err, JackpotError::UnknownContributionStrategy(ContributionStrategyKind::Fixed));
    }

    #[tokio::test]
    async fn test_contribute_invalid_config_leaves_pool() {
        let h = harness(vec![0.5]);
        let config = fixed(dec!(0.5)).with_fixed_contribution(Decimal::ZERO);
        h.store.save(Jackpot::new("JP-1", dec!(1000.00), Some(config))).await.unwrap();

        let err = h.engine.contribute(&bet("bet-1", "JP-1", dec!(10))).await.unwrap_err();
        assert!(matches!(err, JackpotError::InvalidConfig { .. }));
        assert_eq!(h.store.get("JP-1").await.unwrap().current_pool, dec!(1000.00));
    }

    #[tokio::test]
    async fn test_contribute_overflowing_pool_is_rejected() {
        let h = harness(vec![0.5]);
        h.store.save(Jackpot::new("JP-1", Decimal::MAX, Some(fixed(dec!(0.5))))).await.unwrap();

        let err = h.engine.contribute(&bet("bet-1", "JP-1", dec!(100.00))).await.unwrap_err();

        assert!(matches!(err, JackpotError::InvariantViolation(_)));
        assert_eq!(h.store.get("JP-1").await.unwrap().current_pool, Decimal::MAX);
        assert!(h.contributions.is_empty());
    }

    #[tokio::test]
    async fn test_contribute_rejects_invalid_bet() {
        let h = harness(vec![0.5]);
        h.store.save(Jackpot::new("JP-1", dec!(1000.00), Some(fixed(dec!(0.5))))).await.unwrap();
        let mut invalid = bet("bet-1", "JP-1", dec!(10));
        invalid.stake_amount = Decimal::ZERO;

        let err = h.engine.contribute(&invalid).await.unwrap_err();
        assert!(matches!(err, JackpotError::InvalidBet(_)));
    }

    #[tokio::test]
    async fn test_evaluate_win_resets_pool() {
        let h = harness(vec![0.99]);
        h.store.save(Jackpot::new("JP-2", dec!(1000.00), Some(fixed(dec!(1.0))))).await.unwrap();
        h.engine.contribute(&bet("bet-1", "JP-2", dec!(100.00))).await.unwrap();

        let evaluation = h.engine.evaluate(&bet("bet-1", "JP-2", dec!(100.00))).await.unwrap();

        assert!(evaluation.won);
        assert_eq!(evaluation.reward_amount, Some(dec!(1001.00)));
        assert!(evaluation.history_recorded);
        assert_eq!(h.store.get("JP-2").await.unwrap().current_pool, dec!(1000.00));

        let stored = h.rewards.find_by_bet_and_jackpot("bet-1", "JP-2").await.unwrap().unwrap();
        assert_eq!(stored.reward_amount, dec!(1001.00));
        assert_eq!(h.engine.metrics().snapshot().wins, 1);
    }

    #[tokio::test]
    async fn test_evaluate_loss_changes_nothing() {
        let h = harness(vec![0.6]);
        h.store.save(Jackpot::new("JP-1", dec!(1000.00), Some(fixed(dec!(0.5))))).await.unwrap();

        let evaluation = h.engine.evaluate(&bet("bet-1", "JP-1", dec!(10))).await.unwrap();

        assert!(!evaluation.won);
        assert!(evaluation.reward_amount.is_none());
        assert!(h.rewards.is_empty());
        assert_eq!(h.store.get("JP-1").await.unwrap().current_pool, dec!(1000.00));
        assert_eq!(h.store.stats().commits, 0);
        assert_eq!(h.engine.metrics().snapshot().losses, 1);
    }

    #[tokio::test]
    async fn test_evaluate_variable_at_limit_always_wins() {
        let h = harness(vec![0.999_999]);
        h.store.save(Jackpot::new("JP-4", dec!(500.00), Some(variable(dec!(1.00))))).await.unwrap();

        for i in 0..3 {
            let evaluation = h.engine.evaluate(&bet(&format!("bet-{}", i), "JP-4", dec!(10))).await.unwrap();
            assert!(evaluation.won);
            assert_eq!(evaluation.reward_amount, Some(dec!(500.00)));
        }
        assert_eq!(h.rng.draws(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_unknown_jackpot() {
        let h = harness(vec![0.0]);
        let err = h.engine.evaluate(&bet("bet-1", "JP-404", dec!(10))).await.unwrap_err();
        assert!(matches!(err, JackpotError::JackpotNotFound { .. }));
    }

    #[tokio::test]
    async fn test_evaluate_missing_config() {
        let h = harness(vec![0.0]);
        h.store.save(Jackpot::new("JP-1", dec!(1000.00), None)).await.unwrap();
        let err = h.engine.evaluate(&bet("bet-1", "JP-1", dec!(10))).await.unwrap_err();
        assert!(matches!(err, JackpotError::MissingConfig { .. }));
    }

    #[tokio::test]
    async fn test_evaluate_unknown_strategy() {
        let strategies = StrategyRegistry::empty().with_contribution(Arc::new(FixedContribution));
        let h = harness_with(vec![0.0], strategies);
        h.store.save(Jackpot::new("JP-1", dec!(1000.00), Some(fixed(dec!(0.5))))).await.unwrap();

        let err = h.engine.evaluate(&bet("bet-1", "JP-1", dec!(10))).await.unwrap_err();
        assert_eq!(err, JackpotError::UnknownRewardStrategy(RewardStrategyKind::FixedChance));
    }

    #[tokio::test]
    async fn test_evaluate_misconfigured_reward_is_error_not_loss() {
        let h = harness(vec![0.0]);
        h.store.save(Jackpot::new("JP-1", dec!(1000.00), Some(fixed(Decimal::ZERO)))).await.unwrap();

        let err = h.engine.evaluate(&bet("bet-1", "JP-1", dec!(10))).await.unwrap_err();
        assert!(matches!(err, JackpotError::InvalidConfig { .. }));
        assert_eq!(h.engine.metrics().snapshot().losses, 0);
        assert_eq!(h.rng.draws(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_without_prior_contribution() {
        let h = harness(vec![0.0]);
        h.store.save(Jackpot::new("JP-2", dec!(1000.00), Some(fixed(dec!(1.0))))).await.unwrap();

        let evaluation = h.engine.evaluate(&bet("bet-1", "JP-2", dec!(10))).await.unwrap();
        assert!(evaluation.won);
        assert_eq!(evaluation.reward_amount, Some(dec!(1000.00)));
        assert!(h.contributions.is_empty());
    }

    /// Injects one foreign contribution right before the first commit it forwards
    struct InterleavingStore {
        inner: Arc<InMemoryJackpotStore>,
        injected: AtomicBool,
        extra: Decimal,
    }

    #[async_trait]
    impl JackpotRepository for InterleavingStore {
        async fn save(&self, jackpot: Jackpot) -> JackpotResult<Jackpot> {
            self.inner.save(jackpot).await
        }

        async fn get(&self, jackpot_id: &str) -> JackpotResult<Jackpot> {
            self.inner.get(jackpot_id).await
        }

        async fn commit(&self, jackpot_id: &str, mutate: JackpotMutation<'_>) -> JackpotResult<Jackpot> {
            if !self.injected.swap(true, Ordering::SeqCst) {
                let extra = self.extra;
                self.inner
                    .commit(jackpot_id, &|j: &Jackpot| Ok(j.with_pool(j.current_pool + extra)))
                    .await?;
            }
            self.inner.commit(jackpot_id, mutate).await
        }

        async fn list(&self) -> JackpotResult<Vec<Jackpot>> {
            self.inner.list().await
        }
    }

    #[tokio::test]
    async fn test_contribution_between_decision_and_reset_is_folded_into_reset() {
        let inner = Arc::new(InMemoryJackpotStore::new(&StoreConfig {
            max_commit_attempts: 3,
            retry_backoff_ms: 0,
        }));
        inner.save(Jackpot::new("JP-2", dec!(1000.00), Some(fixed(dec!(1.0))))).await.unwrap();
        let store = Arc::new(InterleavingStore {
            inner: inner.clone(),
            injected: AtomicBool::new(false),
            extra: dec!(7.00),
        });
        let rewards = Arc::new(InMemoryRewardRepository::new());
        let engine = JackpotEngine::new(
            store,
            Arc::new(InMemoryContributionRepository::new()),
            rewards.clone(),
            StrategyRegistry::standard(),
            Arc::new(SequenceRandom::new(vec![0.0])),
        );

        let evaluation = engine.evaluate(&bet("bet-1", "JP-2", dec!(10))).await.unwrap();

        // Winner gets the pool seen at decision time, not 1007.00
        assert_eq!(evaluation.reward_amount, Some(dec!(1000.00)));
        // The late contribution vanished into the reset
        assert_eq!(inner.get("JP-2").await.unwrap().current_pool, dec!(1000.00));
        assert_eq!(inner.stats().commits, 2);
    }

    struct FailingContributions;

    #[async_trait]
    impl ContributionRepository for FailingContributions {
        async fn save(&self, _record: JackpotContribution) -> JackpotResult<JackpotContribution> {
            Err(JackpotError::History("disk full".to_string()))
        }

        async fn find_by_bet_id(&self, _bet_id: &str) -> JackpotResult<Vec<JackpotContribution>> {
            Ok(vec![])
        }

        async fn find_by_bet_and_jackpot(&self, _bet_id: &str, _jackpot_id: &str) -> JackpotResult<Option<JackpotContribution>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_history_failure_keeps_pool_change() {
        let store = Arc::new(InMemoryJackpotStore::new(&StoreConfig::default()));
        store.save(Jackpot::new("JP-1", dec!(1000.00), Some(fixed(dec!(0.5))))).await.unwrap();
        let engine = JackpotEngine::new(
            store.clone(),
            Arc::new(FailingContributions),
            Arc::new(InMemoryRewardRepository::new()),
            StrategyRegistry::standard(),
            Arc::new(SequenceRandom::new(vec![0.9])),
        );

        let outcome = engine.contribute(&bet("bet-1", "JP-1", dec!(100.00))).await.unwrap();

        assert!(!outcome.history_recorded);
        assert_eq!(outcome.pool_after(), dec!(1001.00));
        assert_eq!(store.get("JP-1").await.unwrap().current_pool, dec!(1001.00));
        assert_eq!(engine.metrics().snapshot().history_failures, 1);
    }
}
