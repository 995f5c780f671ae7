// crates/timetick-daemon/src/scheduler.rs
//
// Batch scheduler for the TimeTick keeper daemon.
//
// Polls the engine at a fixed interval and runs a batch whenever one is due.
// Every `validate_every`-th batch goes through supply validation instead of
// the plain path. Drained engine events are logged as JSON.

use std::future::Future;
use std::time::Duration;

use timetick_core::token::Ttb;
use timetick_core::{BalanceLedger, Clock, TickError};
use timetick_economics::{BatchReport, TimeTickEngine};

/// Scheduler that drives batches on an engine it owns.
pub struct BatchScheduler<L: BalanceLedger, C: Clock> {
    engine: TimeTickEngine<L, C>,
    poll_interval: Duration,
    /// Run the validated batch every N batches. 0 disables it.
    validate_every: u64,
    /// Batches committed (or reconciled) since start.
    batches_run: u64,
}

impl<L: BalanceLedger, C: Clock> BatchScheduler<L, C> {
    pub fn new(engine: TimeTickEngine<L, C>, poll_interval: Duration, validate_every: u64) -> Self {
        Self {
            engine,
            poll_interval,
            validate_every,
            batches_run: 0,
        }
    }

    pub fn engine(&self) -> &TimeTickEngine<L, C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TimeTickEngine<L, C> {
        &mut self.engine
    }

    pub fn batches_run(&self) -> u64 {
        self.batches_run
    }

    /// Run one batch if it is due.
    ///
    /// Returns the committed batch, or `None` if nothing was due or the
    /// validated path found nothing to mint.
    pub fn tick(&mut self) -> Result<Option<BatchReport>, TickError> {
        let wait = self.engine.seconds_until_due();
        if wait > 0 {
            tracing::trace!("Next batch due in {}s", wait);
            return Ok(None);
        }

        let next = self.batches_run + 1;
        let validated = self.validate_every > 0 && next % self.validate_every == 0;
        let result = if validated {
            self.engine.mint_batch_validated().map(|outcome| {
                tracing::info!(
                    "Supply check: expected {}, issued {}, valid={}",
                    Ttb::from_ticks(outcome.report.expected_supply),
                    Ttb::from_ticks(outcome.report.current_supply),
                    outcome.report.valid
                );
                outcome.batch
            })
        } else {
            self.engine.mint_batch().map(Some)
        };
        self.publish_events();

        let batch = result?;
        self.batches_run = next;
        Ok(batch)
    }

    fn publish_events(&mut self) {
        for event in self.engine.drain_events() {
            match event.to_json() {
                Ok(json) => tracing::info!(event = event.name(), "{}", json),
                Err(e) => tracing::warn!("Could not encode {} event: {}", event.name(), e),
            }
        }
    }

    /// Run the scheduler loop until Ctrl-C.
    pub async fn run(&mut self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Could not listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Run the scheduler loop until `shutdown` resolves.
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) {
        tracing::info!(
            "Batch scheduler started (poll every {:?}, validate every {} batches)",
            self.poll_interval,
            self.validate_every
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Batch scheduler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    if let Err(e) = self.tick() {
                        tracing::warn!("Batch attempt failed: {}", e);
                    }
                }
            }
        }
    }
}
