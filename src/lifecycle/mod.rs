//! Lifecycle management for the demo drivers.
//!
//! # Data Flow
//! ```text
//! Ctrl-C / Enter / --duration-secs elapsed
//!     → Shutdown::trigger
//!     → simulator and sampler tasks observe the broadcast and return
//!     → counter category deleted, log writer drained
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
