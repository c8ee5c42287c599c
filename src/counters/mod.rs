//! Counter subsystem.
//!
//! # Data Flow
//! ```text
//! producers (simulator, callers)
//!     → registry.rs (atomic per-counter increments)
//!     → snapshot() / snapshot_all()
//!     → rate.rs (events per second between two snapshots)
//!     → observability::exposition (Prometheus text, metrics facade)
//! ```
//!
//! # Design Decisions
//! - The registry is an owned instance, never an ambient global
//! - Increments are a single `fetch_add`; registration is the only path
//!   that touches the concurrent map
//! - Rates are derived on read, nothing is persisted
//! - Counters are grouped into categories that can be created and torn down
//!   as a unit

pub mod rate;
pub mod registry;

pub use rate::RateCounter;
pub use registry::{
    CounterHandle, CounterKind, CounterSnapshot, CounterSpec, MetricRegistry, MetricsError,
    NamedSnapshot,
};
