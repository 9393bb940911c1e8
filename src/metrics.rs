//! Engine counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub contributions: u64,
    pub evaluations: u64,
    pub wins: u64,
    pub losses: u64,
    pub failures: u64,
    pub history_failures: u64,
    pub commit_conflicts: u64,
}

pub struct EngineMetrics {
    start_time: Instant,
    contributions: AtomicU64,
    evaluations: AtomicU64,
    wins: AtomicU64,
    losses: AtomicU64,
    failures: AtomicU64,
    history_failures: AtomicU64,
    commit_conflicts: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            contributions: AtomicU64::new(0),
            evaluations: AtomicU64::new(0),
            wins: AtomicU64::new(0),
            losses: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            history_failures: AtomicU64::new(0),
            commit_conflicts: AtomicU64::new(0),
        }
    }

    pub fn record_contribution(&self) {
        self.contributions.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_evaluation(&self, won: bool) {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if won {
            self.wins.fetch_add(1, Ordering::SeqCst);
        } else {
            self.losses.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_history_failure(&self) {
        self.history_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// An optimistic commit lost its race and had to retry
    pub fn record_commit_conflict(&self) {
        self.commit_conflicts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            contributions: self.contributions.load(Ordering::SeqCst),
            evaluations: self.evaluations.load(Ordering::SeqCst),
            wins: self.wins.load(Ordering::SeqCst),
            losses: self.losses.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
            history_failures: self.history_failures.load(Ordering::SeqCst),
            commit_conflicts: self.commit_conflicts.load(Ordering::SeqCst),
        }
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Contributions per second since start
    pub fn average_throughput(&self) -> f64 {
        let total_seconds = self.total_runtime().as_secs_f64();
        if total_seconds < 1.0 {
            return 0.0;
        }
        self.contributions.load(Ordering::SeqCst) as f64 / total_seconds
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
