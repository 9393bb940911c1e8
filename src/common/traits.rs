//! Repository contracts and the randomness seam
//!
//! The engine only ever talks to storage through these traits, so the
//! in-memory implementations in [`crate::storage`] can be swapped for a real
//! database without touching engine code.

use crate::common::types::{Bet, Jackpot, JackpotContribution, JackpotReward};
use crate::errors::JackpotResult;
use async_trait::async_trait;

/// Proposal function handed to [`JackpotRepository::commit`].
///
/// It receives the latest stored snapshot and returns the snapshot it wants
/// stored. It may be invoked more than once when the commit has to retry.
pub type JackpotMutation<'a> = &'a (dyn Fn(&Jackpot) -> JackpotResult<Jackpot> + Send + Sync);

/// Authoritative owner of each jackpot's current pool
#[async_trait]
pub trait JackpotRepository: Send + Sync {
    /// Insert or replace a jackpot (provisioning only)
    async fn save(&self, jackpot: Jackpot) -> JackpotResult<Jackpot>;

    /// Fetch the latest snapshot, failing with `JackpotNotFound` if absent
    async fn get(&self, jackpot_id: &str) -> JackpotResult<Jackpot>;

    /// Read-modify-swap with optimistic concurrency and bounded retry.
    ///
    /// Returns the snapshot that was actually stored.
    async fn commit(&self, jackpot_id: &str, mutate: JackpotMutation<'_>) -> JackpotResult<Jackpot>;

    /// All jackpots, ordered by id
    async fn list(&self) -> JackpotResult<Vec<Jackpot>>;
}

/// Storage for submitted bets
#[async_trait]
pub trait BetRepository: Send + Sync {
    async fn save(&self, bet: Bet) -> JackpotResult<Bet>;

    async fn find_by_id(&self, bet_id: &str) -> JackpotResult<Option<Bet>>;

    async fn find_all(&self) -> JackpotResult<Vec<Bet>>;
}

/// Append-only contribution history keyed by (bet id, jackpot id)
#[async_trait]
pub trait ContributionRepository: Send + Sync {
    /// A second save for the same key overwrites the first
    async fn save(&self, record: JackpotContribution) -> JackpotResult<JackpotContribution>;

    async fn find_by_bet_id(&self, bet_id: &str) -> JackpotResult<Vec<JackpotContribution>>;

    async fn find_by_bet_and_jackpot(&self, bet_id: &str, jackpot_id: &str) -> JackpotResult<Option<JackpotContribution>>;
}

/// Append-only reward history keyed by (bet id, jackpot id)
#[async_trait]
pub trait RewardRepository: Send + Sync {
    /// A second save for the same key overwrites the first
    async fn save(&self, record: JackpotReward) -> JackpotResult<JackpotReward>;

    async fn find_by_bet_id(&self, bet_id: &str) -> JackpotResult<Vec<JackpotReward>>;

    async fn find_by_bet_and_jackpot(&self, bet_id: &str, jackpot_id: &str) -> JackpotResult<Option<JackpotReward>>;
}

/// Uniform draw in `[0, 1)` used by reward strategies
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::JackpotError;

    // Minimal repository showing the contract can be met without the engine's storage
    struct EmptyBets;

    #[async_trait]
    impl BetRepository for EmptyBets {
        async fn save(&self, _bet: Bet) -> JackpotResult<Bet> {
            Err(JackpotError::History("read-only".to_string()))
        }

        async fn find_by_id(&self, _bet_id: &str) -> JackpotResult<Option<Bet>> {
            Ok(None)
        }

        async fn find_all(&self) -> JackpotResult<Vec<Bet>> {
            Ok(vec![])
        }
    }

    struct Constant(f64);

    impl RandomSource for Constant {
        fn next_f64(&self) -> f64 {
            self.0
        }
    }

    #[tokio::test]
    async fn test_trait_objects() {
        let bets: Box<dyn BetRepository> = Box::new(EmptyBets);
        assert!(bets.find_by_id("missing").await.unwrap().is_none());
        assert!(bets.find_all().await.unwrap().is_empty());

        let rng: Box<dyn RandomSource> = Box::new(Constant(0.25));
        assert_eq!(rng.next_f64(), 0.25);
    }
}
