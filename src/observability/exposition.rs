//! Counter exposition.
//!
//! Two paths out of the registry:
//! - `render_prometheus` produces the text format directly from snapshots
//! - `publish_snapshots` pushes values into the `metrics` facade, served by
//!   the HTTP listener that `init_exporter` installs

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;

use crate::counters::{CounterKind, NamedSnapshot};

/// Metric family holding raw counter values.
pub const COUNTER_METRIC: &str = "pipeline_counter_total";

/// Metric family holding derived per-second rates.
pub const RATE_METRIC: &str = "pipeline_counter_rate_per_second";

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("failed to install prometheus exporter: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

/// Install the Prometheus HTTP listener on `addr`.
pub fn init_exporter(addr: SocketAddr) -> Result<(), ExporterError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "prometheus exporter listening");
    Ok(())
}

/// Escape a label value for the text format.
fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn kind_label(kind: CounterKind) -> &'static str {
    match kind {
        CounterKind::Total => "total",
        CounterKind::RatePerSecond => "rate_per_second",
    }
}

/// Render snapshots and rates into Prometheus text format.
///
/// `rates` pairs a counter name with its current per-second value.
pub fn render_prometheus(snapshots: &[NamedSnapshot], rates: &[(&str, f64)]) -> String {
    let mut out = String::new();

    out.push_str(&format!("# HELP {COUNTER_METRIC} Current counter value.\n"));
    out.push_str(&format!("# TYPE {COUNTER_METRIC} counter\n"));
    for s in snapshots {
        out.push_str(&format!(
            "{COUNTER_METRIC}{{counter=\"{}\",kind=\"{}\"}} {}\n",
            escape_label(&s.name),
            kind_label(s.kind),
            s.value
        ));
    }

    out.push_str(&format!("# HELP {RATE_METRIC} Events per second.\n"));
    out.push_str(&format!("# TYPE {RATE_METRIC} gauge\n"));
    for (name, rate) in rates {
        out.push_str(&format!(
            "{RATE_METRIC}{{counter=\"{}\"}} {:.2}\n",
            escape_label(name),
            rate
        ));
    }

    out
}

/// Push snapshots and rates into the installed `metrics` recorder.
///
/// Without a recorder this is a no-op.
pub fn publish_snapshots(snapshots: &[NamedSnapshot], rates: &[(&str, f64)]) {
    for s in snapshots {
        metrics::counter!(
            COUNTER_METRIC,
            "counter" => s.name.clone(),
            "kind" => kind_label(s.kind)
        )
        .absolute(s.value);
    }
    for (name, rate) in rates {
        metrics::gauge!(RATE_METRIC, "counter" => name.to_string()).set(*rate);
    }
}
