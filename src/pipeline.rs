//! Bet intake and the in-process hand-off queue
//!
//! [`BetService::place_bet`] claims a slot on a bounded channel, stores the
//! bet, and queues it. A single worker task drains the channel, runs contribute then
//! evaluate for each bet, and replies on the bet's oneshot.

use crate::{
    common::{
        traits::BetRepository,
        types::{Bet, ContributionOutcome, RewardEvaluation},
    },
    config::PipelineConfig,
    engine::JackpotEngine,
    errors::{JackpotError, JackpotResult},
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// What happened to one bet after it left the queue
#[derive(Debug, Clone)]
pub struct BetSettlement {
    pub bet: Bet,
    pub contribution: JackpotResult<ContributionOutcome>,
    /// `None` when the contribution failed and evaluation was skipped
    pub evaluation: Option<JackpotResult<RewardEvaluation>>,
}

impl BetSettlement {
    pub fn won(&self) -> bool {
        matches!(&self.evaluation, Some(Ok(evaluation)) if evaluation.won)
    }
}

/// Receiving side of a placed bet
#[derive(Debug)]
pub struct SettlementHandle {
    receiver: oneshot::Receiver<BetSettlement>,
}

impl SettlementHandle {
    pub async fn wait(self) -> JackpotResult<BetSettlement> {
        self.receiver.await.map_err(|_| JackpotError::PipelineClosed)
    }
}

struct QueuedBet {
    bet: Bet,
    reply: oneshot::Sender<BetSettlement>,
}

/// Bounded queue plus its worker task
pub struct BetPipeline {
    sender: Mutex<Option<mpsc::Sender<QueuedBet>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BetPipeline {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(engine: Arc<JackpotEngine>, config: &PipelineConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = tokio::spawn(Self::run(engine, receiver));
        info!(capacity = config.queue_capacity, "bet pipeline started");
        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    async fn run(engine: Arc<JackpotEngine>, mut receiver: mpsc::Receiver<QueuedBet>) {
        while let Some(QueuedBet { bet, reply }) = receiver.recv().await {
            let settlement = Self::settle(&engine, bet).await;
            // The caller may have stopped waiting
            if reply.send(settlement).is_err() {
                debug!("settlement receiver dropped");
            }
        }
        info!("bet pipeline drained");
    }

    async fn settle(engine: &JackpotEngine, bet: Bet) -> BetSettlement {
        let contribution = engine.contribute(&bet).await;
        let evaluation = match &contribution {
            Ok(_) => Some(engine.evaluate(&bet).await),
            Err(e) => {
                warn!(bet_id = %bet.id, error = %e, "skipping evaluation after failed contribution");
                None
            }
        };
        BetSettlement {
            bet,
            contribution,
            evaluation,
        }
    }

    /// Claim a queue slot; waits while the queue is full
    async fn reserve(&self) -> JackpotResult<mpsc::OwnedPermit<QueuedBet>> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or(JackpotError::PipelineClosed)?;
        sender.reserve_owned().await.map_err(|_| JackpotError::PipelineClosed)
    }

    fn enqueue(permit: mpsc::OwnedPermit<QueuedBet>, bet: Bet) -> SettlementHandle {
        let (reply, receiver) = oneshot::channel();
        let _sender = permit.send(QueuedBet { bet, reply });
        SettlementHandle { receiver }
    }

    /// Queue a bet; waits while the queue is full
    pub async fn publish(&self, bet: Bet) -> JackpotResult<SettlementHandle> {
        let permit = self.reserve().await?;
        Ok(Self::enqueue(permit, bet))
    }

    /// Stop accepting bets, let the worker finish what is queued, and join it
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "bet pipeline worker ended abnormally");
            }
        }
    }
}

/// Front door for bets
pub struct BetService {
    bets: Arc<dyn BetRepository>,
    engine: Arc<JackpotEngine>,
    pipeline: BetPipeline,
}

impl BetService {
    /// Start a service with its own pipeline. Must be called inside a tokio runtime.
    pub fn new(bets: Arc<dyn BetRepository>, engine: Arc<JackpotEngine>, config: &PipelineConfig) -> Self {
        let pipeline = BetPipeline::spawn(engine.clone(), config);
        Self { bets, engine, pipeline }
    }

    /// Validate, store, and queue a new bet.
    ///
    /// The queue slot is claimed before the bet is stored, so a closed
    /// pipeline rejects the bet without leaving it behind in the repository.
    pub async fn place_bet(
        &self,
        user_id: &str,
        jackpot_id: &str,
        stake_amount: Decimal,
    ) -> JackpotResult<(Bet, SettlementHandle)> {
        let bet = Bet::place(user_id, jackpot_id, stake_amount)?;
        let permit = self.pipeline.reserve().await?;
        let bet = self.bets.save(bet).await?;
        let handle = BetPipeline::enqueue(permit, bet.clone());
        info!(bet_id = %bet.id, jackpot_id = %bet.jackpot_id, stake = %bet.stake_amount, "bet placed");
        Ok((bet, handle))
    }

    /// Run a reward evaluation for a stored bet
    pub async fn evaluate_bet(&self, bet_id: &str) -> JackpotResult<RewardEvaluation> {
        let bet = self
            .bets
            .find_by_id(bet_id)
            .await?
            .ok_or_else(|| JackpotError::BetNotFound {
                bet_id: bet_id.to_string(),
            })?;
        self.engine.evaluate(&bet).await
    }

    pub fn engine(&self) -> &Arc<JackpotEngine> {
        &self.engine
    }

    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }
}
