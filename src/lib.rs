//! Structured observability pipeline: thread-safe counters with derived
//! rates, and a category-routed logging pipeline with pluggable sinks.

pub mod config;
pub mod counters;
pub mod driver;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod sinks;

pub use config::schema::PipelineConfig;
pub use counters::{MetricRegistry, RateCounter};
pub use lifecycle::Shutdown;
pub use pipeline::{LogEntry, LogRouter, Severity};
