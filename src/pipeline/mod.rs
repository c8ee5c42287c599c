//! Logging pipeline.
//!
//! # Data Flow
//! ```text
//! caller builds LogEntry (entry.rs)
//!     → LogRouter::write (router.rs)
//!         - master switch off → return immediately
//!         - union of sinks across the entry's categories, deduplicated
//!         - category and sink severity filters
//!     → each sink formats (formatter.rs) and emits
//!     → Ok, or WriteError listing failed sinks (error.rs)
//!
//! Optional: QueuedWriter (queue.rs) → writer thread → LogRouter::write
//! ```
//!
//! # Design Decisions
//! - Entries are immutable once built
//! - Routing state is swapped atomically on reconfigure
//! - One sink's failure never blocks delivery to the others

pub mod entry;
pub mod error;
pub mod formatter;
pub mod queue;
pub mod router;

pub use entry::{EntryError, LogEntry, LogEntryBuilder, Severity};
pub use error::{BuildError, WriteError};
pub use formatter::{Formatter, JsonFormatter, TextFormatter, XmlFormatter};
pub use queue::{QueueError, QueueWorker, QueuedWriter, WorkerStats};
pub use router::{LogRouter, LoggingSwitch, RouterBuilder};
