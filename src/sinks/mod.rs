//! Log sink subsystem.
//!
//! # Data Flow
//! ```text
//! LogRouter (matched, severity-filtered entry)
//!     → LogSink::format (sink-owned formatter)
//!     → LogSink::emit:
//!         - flat_file.rs (append framed record)
//!         - rolling.rs (roll by size/time, retain N archives, append)
//!         - structured.rs (one standalone XML/JSON record per line)
//!         - event_log.rs (register source once, write event)
//!     → Ok or SinkError (reported back to the router)
//! ```
//!
//! # Design Decisions
//! - Each sink owns and serializes access to its own handle
//! - A record is written with a single call; no partial records
//! - Platform event logs sit behind `EventLogBackend`

pub mod error;
pub mod event_log;
pub mod file;
pub mod flat_file;
pub mod rolling;
pub mod structured;

use std::fmt;
use std::sync::Arc;

use crate::config::schema::{EventLogConfig, SinkConfig, SinkKind};
use crate::pipeline::entry::{LogEntry, Severity};
use crate::pipeline::error::BuildError;
use crate::pipeline::formatter::TextFormatter;

pub use error::{SinkError, SinkErrorKind};
pub use event_log::{EventLogBackend, EventLogBackendKind, EventLogSink, TracingBackend};
pub use flat_file::FlatFileSink;
pub use rolling::{RollFileExists, RollInterval, RollPolicy, RollingFileSink};
pub use structured::{StructuredFileSink, StructuredFormat};

/// A log destination with its own formatter and severity filter.
pub trait LogSink: Send + Sync + fmt::Debug {
    /// Unique name used in routing and error reports.
    fn name(&self) -> &str;

    /// Minimum severity this sink accepts; `None` accepts everything.
    fn min_severity(&self) -> Option<Severity> {
        None
    }

    fn accepts(&self, severity: Severity) -> bool {
        self.min_severity().map_or(true, |min| severity >= min)
    }

    fn format(&self, entry: &LogEntry) -> String;

    /// Write one formatted record. Either the whole record is written or an error is returned.
    fn emit(&self, formatted: &str, entry: &LogEntry) -> Result<(), SinkError>;
}

/// Construct a sink from its configuration.
pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn LogSink>, BuildError> {
    let name = config.name.clone();
    let min = config.min_severity;

    let sink: Arc<dyn LogSink> = match &config.kind {
        SinkKind::FlatFile(file) => Arc::new(
            FlatFileSink::new(
                name,
                &file.path,
                &file.header,
                &file.footer,
                Box::new(TextFormatter::new(&file.template)),
            )
            .with_min_severity(min),
        ),
        SinkKind::RollingFlatFile(rolling) => Arc::new(
            RollingFileSink::new(
                name,
                &rolling.path,
                &rolling.header,
                &rolling.footer,
                Box::new(TextFormatter::new(&rolling.template)),
                RollPolicy {
                    max_size_bytes: rolling.max_size_bytes,
                    interval: rolling.roll_interval,
                    timestamp_pattern: rolling.timestamp_pattern.clone(),
                    file_exists: rolling.roll_file_exists,
                    max_archived_files: rolling.max_archived_files,
                },
            )
            .with_min_severity(min),
        ),
        SinkKind::StructuredFile(structured) => Arc::new(
            StructuredFileSink::new(name, &structured.path, structured.format)
                .with_min_severity(min),
        ),
        SinkKind::EventLog(event_log) => Arc::new(
            EventLogSink::new(
                name,
                &event_log.log_name,
                &event_log.source,
                Box::new(TextFormatter::new(&event_log.template)),
                event_backend(&config.name, event_log)?,
            )
            .with_min_severity(min),
        ),
    };

    tracing::debug!(sink = %config.name, "sink built");
    Ok(sink)
}

fn event_backend(
    sink: &str,
    settings: &EventLogConfig,
) -> Result<Arc<dyn EventLogBackend>, BuildError> {
    tracing::trace!(sink, backend = ?settings.backend, "selecting event log backend");

    let backend: Arc<dyn EventLogBackend> = match settings.backend {
        EventLogBackendKind::Tracing => Arc::new(TracingBackend::new()),
        #[cfg(unix)]
        EventLogBackendKind::Syslog => Arc::new(match &settings.socket_path {
            Some(socket) => event_log::SyslogBackend::new(socket),
            None => event_log::SyslogBackend::default(),
        }),
        #[cfg(not(unix))]
        EventLogBackendKind::Syslog => {
            return Err(BuildError::UnsupportedBackend {
                sink: sink.to_string(),
                backend: "syslog".to_string(),
            })
        }
    };
    Ok(backend)
}
