// ABOUTME: Background sweep — periodically removes expired proposals from the store.
// ABOUTME: Runs on a tokio interval; each pass goes through the store's single-flight guard.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::store::ProposalStore;

/// Periodic expiry task for a proposal store.
pub struct Sweeper {
    store: Arc<ProposalStore>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(store: Arc<ProposalStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run one sweep pass, logging rather than propagating failures.
    pub fn run_once(&self) -> usize {
        sweep_pass(&self.store)
    }

    /// Spawn the sweep loop. Passes never overlap: each one finishes before the
    /// next tick is awaited, and late ticks are skipped rather than bunched.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let store = self.store.clone();
                if let Err(err) = tokio::task::spawn_blocking(move || sweep_pass(&store)).await {
                    tracing::error!(error = %err, "proposal sweep task panicked");
                }
            }
        })
    }
}

fn sweep_pass(store: &ProposalStore) -> usize {
    match store.sweep() {
        Ok(0) => 0,
        Ok(removed) => {
            tracing::info!(removed, "swept expired proposals");
            removed
        }
        Err(err) => {
            tracing::error!(error = %err, "proposal sweep failed");
            0
        }
    }
}
