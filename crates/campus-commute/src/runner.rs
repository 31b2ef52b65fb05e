//! Periodic sweep task.

use std::sync::Arc;
use std::time::Duration;

use campus_store::CommuteStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::engine::CommuteMatchEngine;
use crate::policy::MatchPolicy;

/// Runs a policy on a fixed interval until told to stop.
pub struct SweepRunner<S> {
    engine: Arc<CommuteMatchEngine<S>>,
    policy: MatchPolicy,
    interval: Duration,
}

impl<S: CommuteStore + 'static> SweepRunner<S> {
    /// Create a runner.
    #[must_use]
    pub const fn new(
        engine: Arc<CommuteMatchEngine<S>>,
        policy: MatchPolicy,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            policy,
            interval,
        }
    }

    /// Spawn the loop as a background task. It exits once `shutdown` becomes `true`
    /// or its sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run the loop on the current task. The first sweep starts immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            policy = self.policy.name,
            interval_seconds = self.interval.as_secs(),
            "Starting commute sweep loop"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep_once().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(policy = self.policy.name, "Commute sweep loop stopped");
    }

    async fn sweep_once(&self) {
        let engine = Arc::clone(&self.engine);
        let policy = self.policy;
        let now = chrono::Local::now().naive_local();

        match tokio::task::spawn_blocking(move || engine.run(&policy, now)).await {
            Ok(Ok(_report)) => {}
            Ok(Err(e)) => error!(policy = policy.name, error = %e, "Commute sweep failed"),
            Err(e) => error!(policy = policy.name, error = %e, "Commute sweep task panicked"),
        }
    }
}
