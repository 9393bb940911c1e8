//! Jackpot simulator
//!
//! Provisions jackpots, pushes a batch of bets through the pipeline from
//! several concurrent producers, and prints the resulting pools and rewards.

use clap::Parser;
use futures::future::join_all;
use jackpot::{
    bootstrap, BetRepository, BetService, EngineConfig, JackpotRepository, RewardRepository, SettlementHandle,
};
use rust_decimal::Decimal;
use std::{path::PathBuf, sync::Arc, time::Instant};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "jackpot-sim")]
#[command(about = "Run bets through the jackpot engine", long_about = None)]
struct Args {
    /// TOML config file (defaults to the built-in JP-1..JP-4 set)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Jackpot to bet on
    #[arg(long, default_value = "JP-1")]
    jackpot: String,

    /// Number of bets to place
    #[arg(long, default_value = "100")]
    bets: usize,

    /// Stake per bet
    #[arg(long, default_value = "10.00")]
    stake: Decimal,

    /// Concurrent producers
    #[arg(long, default_value = "4")]
    concurrency: usize,

    /// Seed for reproducible draws
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if args.seed.is_some() {
        config.random.seed = args.seed;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("jackpot={}", config.monitoring.log_level.as_filter()).into()),
        )
        .init();

    let (backend, engine) = bootstrap(&config).await?;
    let service = Arc::new(BetService::new(backend.bets.clone(), engine.clone(), &config.pipeline));

    info!(
        jackpot = %args.jackpot,
        bets = args.bets,
        stake = %args.stake,
        concurrency = args.concurrency,
        "starting simulation"
    );
    let started = Instant::now();

    let producers = args.concurrency.max(1);
    let mut tasks = Vec::with_capacity(producers);
    for producer in 0..producers {
        let service = service.clone();
        let jackpot_id = args.jackpot.clone();
        let stake = args.stake;
        // Spread the remainder over the first producers
        let count = args.bets / producers + usize::from(producer < args.bets % producers);
        tasks.push(tokio::spawn(async move {
            let user_id = format!("user-{}", producer + 1);
            let mut handles: Vec<SettlementHandle> = Vec::with_capacity(count);
            for _ in 0..count {
                match service.place_bet(&user_id, &jackpot_id, stake).await {
                    Ok((_, handle)) => handles.push(handle),
                    Err(e) => error!(user_id = %user_id, error = %e, "bet rejected"),
                }
            }
            handles
        }));
    }

    let mut handles = Vec::new();
    for produced in join_all(tasks).await {
        handles.extend(produced?);
    }

    let mut settled = 0usize;
    let mut failed = 0usize;
    for handle in handles {
        match handle.wait().await {
            Ok(settlement) if settlement.contribution.is_ok() => settled += 1,
            Ok(settlement) => {
                failed += 1;
                if let Err(e) = &settlement.contribution {
                    error!(bet_id = %settlement.bet.id, error = %e, "bet failed");
                }
            }
            Err(e) => {
                failed += 1;
                error!(error = %e, "settlement lost");
            }
        }
    }
    service.shutdown().await;
    let elapsed = started.elapsed();

    println!("\n📊 Simulation finished in {:.2?}", elapsed);
    println!("   settled: {}  failed: {}", settled, failed);

    println!("\n🎰 Jackpots");
    for jackpot in backend.jackpots.list().await? {
        println!(
            "   {:<8} pool {:>14}  (initial {})",
            jackpot.id, jackpot.current_pool, jackpot.initial_pool
        );
    }

    println!("\n🏆 Rewards");
    let mut rewards = Vec::new();
    for bet in backend.bets.find_all().await? {
        rewards.extend(backend.rewards.find_by_bet_id(&bet.id).await?);
    }
    if rewards.is_empty() {
        println!("   none");
    }
    for reward in &rewards {
        println!(
            "   {:<8} {:>14}  bet {} ({})",
            reward.jackpot_id, reward.reward_amount, reward.bet_id, reward.user_id
        );
    }

    let metrics = engine.metrics().snapshot();
    let store = backend.jackpots.stats();
    println!("\n📈 Engine");
    println!(
        "   contributions: {}  evaluations: {}  wins: {}  losses: {}  failures: {}",
        metrics.contributions, metrics.evaluations, metrics.wins, metrics.losses, metrics.failures
    );
    println!(
        "   commits: {}  conflicts: {}  exhausted: {}",
        store.commits, store.conflicts, store.exhausted
    );

    Ok(())
}
