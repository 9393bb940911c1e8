//! In-memory repositories
//!
//! `DashMap`-backed stand-ins for a database. The jackpot store keeps each
//! jackpot as an `Arc<Jackpot>` snapshot and commits by swapping the `Arc`
//! only if the stored pointer is still the one the mutation was computed from.

use crate::{
    common::{
        traits::{BetRepository, ContributionRepository, JackpotMutation, JackpotRepository, RewardRepository},
        types::{Bet, Jackpot, JackpotContribution, JackpotReward},
    },
    config::StoreConfig,
    errors::{JackpotError, JackpotResult},
    metrics::EngineMetrics,
};
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info, warn};

/// Counters exposed by the jackpot store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub jackpots: usize,
    pub commits: u64,
    pub conflicts: u64,
    pub exhausted: u64,
}

/// Jackpot store with compare-and-swap commits
pub struct InMemoryJackpotStore {
    jackpots: DashMap<String, Arc<Jackpot>>,
    max_attempts: u32,
    backoff: Duration,
    commits: AtomicU64,
    conflicts: AtomicU64,
    exhausted: AtomicU64,
    metrics: Option<Arc<EngineMetrics>>,
}

impl InMemoryJackpotStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            jackpots: DashMap::new(),
            max_attempts: config.max_commit_attempts.max(1),
            backoff: config.retry_backoff(),
            commits: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
            metrics: None,
        }
    }

    /// Also report commit conflicts to the engine's counters
    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            jackpots: self.jackpots.len(),
            commits: self.commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }

    fn snapshot(&self, jackpot_id: &str) -> JackpotResult<Arc<Jackpot>> {
        self.jackpots
            .get(jackpot_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| JackpotError::jackpot_not_found(jackpot_id))
    }

    /// Only the pool may change through a commit, and never below zero
    fn check_proposal(observed: &Jackpot, proposed: &Jackpot) -> JackpotResult<()> {
        if proposed.id != observed.id {
            return Err(JackpotError::InvariantViolation(format!(
                "commit on {} proposed id {}",
                observed.id, proposed.id
            )));
        }
        if proposed.initial_pool != observed.initial_pool {
            return Err(JackpotError::InvariantViolation(format!(
                "initial pool of {} is immutable",
                observed.id
            )));
        }
        if proposed.current_pool < Decimal::ZERO {
            return Err(JackpotError::InvariantViolation(format!(
                "pool of {} would become negative ({})",
                observed.id, proposed.current_pool
            )));
        }
        Ok(())
    }

    /// Swap in `proposed` iff the stored snapshot is still `observed`.
    ///
    /// The caller holds a clone of `observed`, so its address cannot be reused
    /// by another snapshot while this comparison runs.
    fn compare_and_swap(&self, jackpot_id: &str, observed: &Arc<Jackpot>, proposed: Arc<Jackpot>) -> JackpotResult<bool> {
        let mut entry = self
            .jackpots
            .get_mut(jackpot_id)
            .ok_or_else(|| JackpotError::jackpot_not_found(jackpot_id))?;

        if Arc::ptr_eq(entry.value(), observed) {
            *entry.value_mut() = proposed;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[async_trait]
impl JackpotRepository for InMemoryJackpotStore {
    async fn save(&self, jackpot: Jackpot) -> JackpotResult<Jackpot> {
        if jackpot.current_pool < Decimal::ZERO || jackpot.initial_pool < Decimal::ZERO {
            return Err(JackpotError::InvariantViolation(format!(
                "jackpot {} cannot start with a negative pool",
                jackpot.id
            )));
        }
        info!(jackpot_id = %jackpot.id, pool = %jackpot.current_pool, "saved jackpot");
        self.jackpots.insert(jackpot.id.clone(), Arc::new(jackpot.clone()));
        Ok(jackpot)
    }

    async fn get(&self, jackpot_id: &str) -> JackpotResult<Jackpot> {
        self.snapshot(jackpot_id).map(|jackpot| jackpot.as_ref().clone())
    }

    async fn commit(&self, jackpot_id: &str, mutate: JackpotMutation<'_>) -> JackpotResult<Jackpot> {
        for attempt in 1..=self.max_attempts {
            let observed = self.snapshot(jackpot_id)?;
            let proposed = mutate(observed.as_ref())?;
            Self::check_proposal(&observed, &proposed)?;

            let proposed = Arc::new(proposed);
            if self.compare_and_swap(jackpot_id, &observed, Arc::clone(&proposed))? {
                self.commits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    jackpot_id,
                    attempt,
                    old_pool = %observed.current_pool,
                    new_pool = %proposed.current_pool,
                    "jackpot committed"
                );
                return Ok(proposed.as_ref().clone());
            }

            self.conflicts.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = &self.metrics {
                metrics.record_commit_conflict();
            }
            warn!(jackpot_id, attempt, max_attempts = self.max_attempts, "optimistic lock failure, retrying");
            if attempt < self.max_attempts && !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
        }

        self.exhausted.fetch_add(1, Ordering::Relaxed);
        Err(JackpotError::ConcurrencyExhausted {
            jackpot_id: jackpot_id.to_string(),
            attempts: self.max_attempts,
        })
    }

    async fn list(&self) -> JackpotResult<Vec<Jackpot>> {
        let mut all: Vec<Jackpot> = self
            .jackpots
            .iter()
            .map(|entry| entry.value().as_ref().clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

/// Bet storage keyed by bet id
#[derive(Default)]
pub struct InMemoryBetRepository {
    bets: DashMap<String, Bet>,
}

impl InMemoryBetRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BetRepository for InMemoryBetRepository {
    async fn save(&self, bet: Bet) -> JackpotResult<Bet> {
        debug!(bet_id = %bet.id, jackpot_id = %bet.jackpot_id, "saved bet");
        self.bets.insert(bet.id.clone(), bet.clone());
        Ok(bet)
    }

    async fn find_by_id(&self, bet_id: &str) -> JackpotResult<Option<Bet>> {
        Ok(self.bets.get(bet_id).map(|entry| entry.value().clone()))
    }

    async fn find_all(&self) -> JackpotResult<Vec<Bet>> {
        let mut all: Vec<Bet> = self.bets.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }
}

type HistoryKey = (String, String);

fn history_key(bet_id: &str, jackpot_id: &str) -> HistoryKey {
    (bet_id.to_string(), jackpot_id.to_string())
}

/// Contribution history; one record per (bet id, jackpot id)
#[derive(Default)]
pub struct InMemoryContributionRepository {
    records: DashMap<HistoryKey, JackpotContribution>,
}

impl InMemoryContributionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ContributionRepository for InMemoryContributionRepository {
    async fn save(&self, record: JackpotContribution) -> JackpotResult<JackpotContribution> {
        debug!(
            bet_id = %record.bet_id,
            jackpot_id = %record.jackpot_id,
            amount = %record.contribution_amount,
            "saved contribution"
        );
        self.records
            .insert(history_key(&record.bet_id, &record.jackpot_id), record.clone());
        Ok(record)
    }

    async fn find_by_bet_id(&self, bet_id: &str) -> JackpotResult<Vec<JackpotContribution>> {
        let mut found: Vec<JackpotContribution> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == bet_id)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.jackpot_id.cmp(&b.jackpot_id));
        Ok(found)
    }

    async fn find_by_bet_and_jackpot(&self, bet_id: &str, jackpot_id: &str) -> JackpotResult<Option<JackpotContribution>> {
        Ok(self
            .records
            .get(&history_key(bet_id, jackpot_id))
            .map(|entry| entry.value().clone()))
    }
}

/// Reward history; one record per (bet id, jackpot id)
#[derive(Default)]
pub struct InMemoryRewardRepository {
    records: DashMap<HistoryKey, JackpotReward>,
}

impl InMemoryRewardRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RewardRepository for InMemoryRewardRepository {
    async fn save(&self, record: JackpotReward) -> JackpotResult<JackpotReward> {
        debug!(
            bet_id = %record.bet_id,
            jackpot_id = %record.jackpot_id,
            amount = %record.reward_amount,
            "saved reward"
        );
        self.records
            .insert(history_key(&record.bet_id, &record.jackpot_id), record.clone());
        Ok(record)
    }

    async fn find_by_bet_id(&self, bet_id: &str) -> JackpotResult<Vec<JackpotReward>> {
        let mut found: Vec<JackpotReward> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == bet_id)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.jackpot_id.cmp(&b.jackpot_id));
        Ok(found)
    }

    async fn find_by_bet_and_jackpot(&self, bet_id: &str, jackpot_id: &str) -> JackpotResult<Option<JackpotReward>> {
        Ok(self
            .records
            .get(&history_key(bet_id, jackpot_id))
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{ContributionStrategyKind, JackpotConfig, RewardStrategyKind};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicU32;

    fn store() -> InMemoryJackpotStore {
        InMemoryJackpotStore::new(&StoreConfig {
            max_commit_attempts: 3,
            retry_backoff_ms: 0,
        })
    }

    fn jackpot(id: &str, pool: Decimal) -> Jackpot {
        let config = JackpotConfig::new(ContributionStrategyKind::Fixed, RewardStrategyKind::FixedChance)
            .with_fixed_contribution(dec!(0.01))
            .with_fixed_reward(dec!(0.001));
        Jackpot::new(id, pool, Some(config))
    }

    #[tokio::test]
    async fn test_get_unknown_jackpot() {
        let store = store();
        let err = store.get("nope").await.unwrap_err();
        assert_eq!(err, JackpotError::jackpot_not_found("nope"));
    }

    #[tokio::test]
    async fn test_commit_applies_mutation() {
        let store = store();
        store.save(jackpot("JP-1", dec!(1000.00))).await.unwrap();

        let updated = store
            .commit("JP-1", &|j: &Jackpot| Ok(j.with_pool(j.current_pool + dec!(1.00))))
            .await
            .unwrap();

        assert_eq!(updated.current_pool, dec!(1001.00));
        assert_eq!(store.get("JP-1").await.unwrap().current_pool, dec!(1001.00));
        assert_eq!(store.stats().commits, 1);
        assert_eq!(store.stats().conflicts, 0);
    }

    #[tokio::test]
    async fn test_commit_unknown_jackpot_is_not_retried() {
        let store = store();
        let calls = AtomicU32::new(0);
        let err = store
            .commit("ghost", &|j: &Jackpot| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(j.clone())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, JackpotError::JackpotNotFound { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_commit_retries_against_latest_value() {
        let metrics = Arc::new(EngineMetrics::new());
        let store = store().with_metrics(metrics.clone());
        store.save(jackpot("JP-1", dec!(1000.00))).await.unwrap();
        let calls = AtomicU32::new(0);

        // First attempt races with another writer that adds 5.00
        let result = store
            .commit("JP-1", &|j: &Jackpot| {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    store
                        .jackpots
                        .insert("JP-1".to_string(), Arc::new(j.with_pool(j.current_pool + dec!(5.00))));
                }
                Ok(j.with_pool(j.current_pool + dec!(1.00)))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.current_pool, dec!(1006.00));
        assert_eq!(store.stats().conflicts, 1);
        assert_eq!(metrics.snapshot().commit_conflicts, 1);
    }

    #[tokio::test]
    async fn test_commit_exhausts_retry_budget() {
        let store = store();
        store.save(jackpot("JP-1", dec!(1000.00))).await.unwrap();
        let calls = AtomicU32::new(0);

        let err = store
            .commit("JP-1", &|j: &Jackpot| {
                calls.fetch_add(1, Ordering::SeqCst);
                store
                    .jackpots
                    .insert("JP-1".to_string(), Arc::new(j.with_pool(j.current_pool + dec!(1.00))));
                Ok(j.with_pool(Decimal::ZERO))
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            JackpotError::ConcurrencyExhausted {
                jackpot_id: "JP-1".to_string(),
                attempts: 3
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.stats().exhausted, 1);
        // The interfering writer's three increments all survived
        assert_eq!(store.get("JP-1").await.unwrap().current_pool, dec!(1003.00));
    }

    #[tokio::test]
    async fn test_commit_rejects_negative_pool() {
        let store = store();
        store.save(jackpot("JP-1", dec!(10.00))).await.unwrap();
        let err = store
            .commit("JP-1", &|j: &Jackpot| Ok(j.with_pool(dec!(-0.01))))
            .await
            .unwrap_err();

        assert!(matches!(err, JackpotError::InvariantViolation(_)));
        assert_eq!(store.get("JP-1").await.unwrap().current_pool, dec!(10.00));
    }

    #[tokio::test]
    async fn test_commit_rejects_initial_pool_change() {
        let store = store();
        store.save(jackpot("JP-1", dec!(10.00))).await.unwrap();
        let err = store
            .commit("JP-1", &|j: &Jackpot| {
                let mut next = j.clone();
                next.initial_pool = dec!(99);
                Ok(next)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, JackpotError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_mutation_error_propagates() {
        let store = store();
        store.save(jackpot("JP-1", dec!(10.00))).await.unwrap();
        let err = store
            .commit("JP-1", &|_: &Jackpot| Err(JackpotError::invalid_config("test", "boom")))
            .await
            .unwrap_err();
        assert!(matches!(err, JackpotError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_list_sorted_by_id() {
        let store = store();
        store.save(jackpot("JP-2", dec!(1))).await.unwrap();
        store.save(jackpot("JP-1", dec!(1))).await.unwrap();
        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["JP-1", "JP-2"]);
    }

    #[tokio::test]
    async fn test_contribution_history_overwrites_same_key() {
        let repo = InMemoryContributionRepository::new();
        let record = JackpotContribution {
            bet_id: "bet-1".to_string(),
            user_id: "user-1".to_string(),
            jackpot_id: "JP-1".to_string(),
            stake_amount: dec!(100),
            contribution_amount: dec!(1),
            current_pool_amount: dec!(1001),
            created_at: Utc::now(),
        };
        repo.save(record.clone()).await.unwrap();
        repo.save(JackpotContribution {
            contribution_amount: dec!(2),
            current_pool_amount: dec!(1002),
            ..record.clone()
        })
        .await
        .unwrap();

        assert_eq!(repo.len(), 1);
        let stored = repo.find_by_bet_and_jackpot("bet-1", "JP-1").await.unwrap().unwrap();
        assert_eq!(stored.contribution_amount, dec!(2));

        repo.save(JackpotContribution {
            jackpot_id: "JP-2".to_string(),
            ..record
        })
        .await
        .unwrap();
        assert_eq!(repo.find_by_bet_id("bet-1").await.unwrap().len(), 2);
        assert!(repo.find_by_bet_id("bet-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reward_history_overwrites_same_key() {
        let repo = InMemoryRewardRepository::new();
        let record = JackpotReward {
            bet_id: "bet-1".to_string(),
            user_id: "user-1".to_string(),
            jackpot_id: "JP-2".to_string(),
            reward_amount: dec!(1001.00),
            created_at: Utc::now(),
        };
        repo.save(record.clone()).await.unwrap();
        repo.save(record).await.unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.find_by_bet_id("bet-1").await.unwrap().len(), 1);
        assert!(repo.find_by_bet_and_jackpot("bet-1", "JP-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bet_repository_round_trip() {
        let repo = InMemoryBetRepository::new();
        let bet = Bet::place("user-1", "JP-1", dec!(25)).unwrap();
        repo.save(bet.clone()).await.unwrap();

        assert_eq!(repo.find_by_id(&bet.id).await.unwrap(), Some(bet));
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }
}
