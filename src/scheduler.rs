//! Periodic flush task.
//!
//! A single spawned task ticks at the configured interval and runs one flush cycle
//! per tick. Ticks missed while a cycle is running are skipped rather than queued, and
//! a running cycle is always allowed to finish. Shutting down runs one final cycle so
//! buffered values are not left behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::flush::Flusher;

/// Handle of the running flush task
pub struct FlushScheduler {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl FlushScheduler {
    /// Spawn the flush task onto the current tokio runtime.
    ///
    /// Dropping the handle without calling `shutdown` also stops the task after its
    /// final cycle, but nobody waits for it.
    pub fn start(flusher: Arc<Flusher>, interval: Duration) -> Self {
        let (tx, mut rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = interval.as_millis() as u64, "flush scheduler started");

            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        flusher.flush().await;
                    }
                }
            }

            flusher.flush().await;
            info!("flush scheduler stopped");
        });

        Self {
            shutdown: Some(tx),
            handle,
        }
    }

    /// Stop ticking, run the final cycle and wait for the task to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            // the task may already be gone
            let _ = tx.send(());
        }
        if let Err(e) = self.handle.await {
            error!(error = %e, "flush scheduler task failed");
        }
    }
}
