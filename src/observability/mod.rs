//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (tracing events from the crate itself)
//!
//! Counter registry produces:
//!     → exposition.rs (Prometheus text, `metrics` facade, HTTP exporter)
//! ```
//!
//! # Design Decisions
//! - Diagnostics of the pipeline go through `tracing`, never through the
//!   pipeline's own sinks
//! - Exposition reads snapshots; it never holds counter handles

pub mod exposition;
pub mod logging;

pub use exposition::{init_exporter, publish_snapshots, render_prometheus, ExporterError};
pub use logging::init_tracing;
