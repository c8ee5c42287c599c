//! Events-per-second derived from counter snapshots.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::counters::registry::{CounterHandle, CounterSnapshot, MetricRegistry, MetricsError};

/// Smallest elapsed time used as a divisor.
const EPSILON: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct RateState {
    last: Option<CounterSnapshot>,
    rate: f64,
}

/// Rate of counts per second over a sliding window.
///
/// Each sample compares the counter with the snapshot retained by the
/// previous sample. Samples taken less than `window` after the retained
/// snapshot return the last computed rate unchanged.
#[derive(Debug)]
pub struct RateCounter {
    handle: CounterHandle,
    window: Duration,
    state: Mutex<RateState>,
}

impl RateCounter {
    pub fn new(handle: CounterHandle, window: Duration) -> Self {
        Self {
            handle,
            window,
            state: Mutex::new(RateState::default()),
        }
    }

    /// Counter this rate is derived from.
    pub fn handle(&self) -> &CounterHandle {
        &self.handle
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Compute the current events-per-second.
    ///
    /// The first sample has nothing to compare against and returns 0.
    pub fn sample(&self, registry: &MetricRegistry) -> Result<f64, MetricsError> {
        let current = registry.snapshot(&self.handle)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(last) = state.last else {
            state.last = Some(current);
            return Ok(0.0);
        };

        let elapsed = current.taken_at.saturating_duration_since(last.taken_at);
        if elapsed < self.window {
            return Ok(state.rate);
        }

        let delta = current.value.saturating_sub(last.value);
        state.rate = delta as f64 / elapsed.max(EPSILON).as_secs_f64();
        state.last = Some(current);
        Ok(state.rate)
    }
}
