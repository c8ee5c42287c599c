//! Background activity generator.
//!
//! Increments every counter it holds, then pauses for a random 0 to 50 ms,
//! until shutdown is signalled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::counters::{CounterHandle, MetricRegistry, MetricsError};

/// Upper bound (exclusive) of the pause between ticks, in milliseconds.
pub const MAX_PAUSE_MS: u64 = 50;

pub struct Simulator {
    registry: Arc<MetricRegistry>,
    handles: Vec<CounterHandle>,
}

impl Simulator {
    pub fn new(registry: Arc<MetricRegistry>, handles: Vec<CounterHandle>) -> Self {
        Self { registry, handles }
    }

    /// Run until `shutdown` fires. Returns the number of ticks performed.
    ///
    /// Stops early with `InvalidHandle` if a counter is torn down underneath it.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<u64, MetricsError> {
        let mut ticks = 0u64;
        tracing::info!(counters = self.handles.len(), "simulator started");

        loop {
            for handle in &self.handles {
                self.registry.increment(handle)?;
            }
            ticks += 1;

            let pause = Duration::from_millis(fastrand::u64(0..MAX_PAUSE_MS));
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!(ticks, "simulator stopped");
        Ok(ticks)
    }
}
