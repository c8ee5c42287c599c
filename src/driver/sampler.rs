//! Periodic counter reader, standing in for an external system monitor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::counters::{MetricRegistry, RateCounter};
use crate::observability::exposition::publish_snapshots;

pub struct Sampler {
    registry: Arc<MetricRegistry>,
    rates: Vec<RateCounter>,
    interval: Duration,
    publish: bool,
}

impl Sampler {
    pub fn new(registry: Arc<MetricRegistry>, rates: Vec<RateCounter>, interval: Duration) -> Self {
        Self {
            registry,
            rates,
            interval,
            publish: false,
        }
    }

    /// Also push every sample into the `metrics` recorder.
    pub fn with_publish(mut self, publish: bool) -> Self {
        self.publish = publish;
        self
    }

    /// Take one sample of every counter and rate.
    pub fn sample_once(&self) -> Vec<(String, f64)> {
        let snapshots = self.registry.snapshot_all();
        let mut rates = Vec::with_capacity(self.rates.len());

        for rate in &self.rates {
            match rate.sample(&self.registry) {
                Ok(value) => rates.push((rate.handle().name().to_string(), value)),
                Err(e) => tracing::warn!(error = %e, "rate sample failed"),
            }
        }

        for s in &snapshots {
            tracing::info!(counter = %s.name, value = s.value, "counter sample");
        }
        for (name, value) in &rates {
            tracing::info!(counter = %name, per_second = format_args!("{value:.2}"), "rate sample");
        }

        if self.publish {
            let borrowed: Vec<(&str, f64)> = rates.iter().map(|(n, v)| (n.as_str(), *v)).collect();
            publish_snapshots(&snapshots, &borrowed);
        }
        rates
    }

    /// Sample on every interval tick until `shutdown` fires. Returns the sample count.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut samples = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sample_once();
                    samples += 1;
                }
                _ = shutdown.recv() => break,
            }
        }

        tracing::debug!(samples, "sampler stopped");
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::{CounterKind, CounterSpec};

    #[test]
    fn test_first_sample_reports_zero_rate() {
        let registry = Arc::new(MetricRegistry::new());
        let handle = registry.register("orders");
        registry.increment_by(&handle, 10).unwrap();

        let sampler = Sampler::new(
            registry.clone(),
            vec![RateCounter::new(handle, Duration::from_millis(100))],
            Duration::from_secs(1),
        );
        assert_eq!(sampler.sample_once(), vec![("orders".to_string(), 0.0)]);
    }

    #[test]
    fn test_deleted_counter_is_skipped() {
        let registry = Arc::new(MetricRegistry::new());
        let specs = [CounterSpec::new("Total", CounterKind::Total)];
        let handles = registry.create_category("Gone", "none", &specs).unwrap();
        registry.delete_category("Gone").unwrap();

        let sampler = Sampler::new(
            registry,
            vec![RateCounter::new(handles[0].clone(), Duration::from_millis(100))],
            Duration::from_secs(1),
        );
        assert!(sampler.sample_once().is_empty());
    }
}
