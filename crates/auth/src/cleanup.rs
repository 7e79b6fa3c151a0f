//! Background purge of expired email verification tokens.
//!
//! One worker per process, started at startup and stopped through a watch
//! channel. The loop waits on either the interval timer or the shutdown
//! signal, so it exits promptly even mid-wait and never blocks shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::error::AuthResult;
use crate::store::AuthStore;

pub struct CleanupWorker {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl CleanupWorker {
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self { store, clock, interval }
    }

    /// Run the sweep loop until `shutdown` changes or its sender is dropped.
    ///
    /// A sweep failure is logged and the loop keeps going; request-serving
    /// code enforces expiry at access time, so a missed sweep only delays
    /// garbage collection.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick resolves immediately; the first sweep should happen
        // one full interval after startup
        ticker.tick().await;

        tracing::info!(interval_secs = self.interval.as_secs(), "cleanup worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(deleted) if deleted > 0 => {
                            tracing::info!(deleted, "purged expired verification tokens");
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::error!(error = %err, "failed to purge expired verification tokens");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("cleanup worker stopping");
                    return;
                }
            }
        }
    }

    /// Delete every verification token that expired before now. Public so a
    /// sweep can be forced outside the timer.
    pub async fn sweep(&self) -> AuthResult<u64> {
        self.store
            .delete_expired_verification_tokens(self.clock.now())
            .await
    }
}
