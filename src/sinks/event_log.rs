//! System event log sink.
//!
//! # Responsibilities
//! - Map entry severity to an event type
//! - Register the event source once, before the first write
//! - Hand single records to a pluggable host backend
//!
//! # Backends
//! - `SyslogBackend` (unix): RFC 3164 datagrams to the local syslog socket
//! - `TracingBackend`: forwards records to the process `tracing` subscriber

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::pipeline::entry::{LogEntry, Severity};
use crate::pipeline::formatter::Formatter;
use crate::sinks::error::SinkError;
use crate::sinks::LogSink;

/// Event classification understood by host event logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Error,
    Warning,
    Information,
}

impl From<Severity> for EventType {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical | Severity::Error => EventType::Error,
            Severity::Warning => EventType::Warning,
            Severity::Information | Severity::Verbose => EventType::Information,
        }
    }
}

/// One record handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct EventRecord<'a> {
    pub log: &'a str,
    pub source: &'a str,
    pub event_type: EventType,
    pub event_id: i32,
    pub message: &'a str,
}

/// Host event log binding.
pub trait EventLogBackend: Send + Sync + fmt::Debug {
    fn source_exists(&self, log: &str, source: &str) -> io::Result<bool>;
    fn register_source(&self, log: &str, source: &str) -> io::Result<()>;
    fn write_event(&self, record: &EventRecord<'_>) -> io::Result<()>;
}

/// Which backend a configured event log sink uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLogBackendKind {
    #[default]
    Tracing,
    Syslog,
}

/// Writes entries to a host event log under a named source.
#[derive(Debug)]
pub struct EventLogSink {
    name: String,
    log: String,
    source: String,
    formatter: Box<dyn Formatter>,
    min_severity: Option<Severity>,
    backend: Arc<dyn EventLogBackend>,
    registered: Mutex<bool>,
}

impl EventLogSink {
    pub fn new(
        name: impl Into<String>,
        log: impl Into<String>,
        source: impl Into<String>,
        formatter: Box<dyn Formatter>,
        backend: Arc<dyn EventLogBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            log: log.into(),
            source: source.into(),
            formatter,
            min_severity: None,
            backend,
            registered: Mutex::new(false),
        }
    }

    pub fn with_min_severity(mut self, min: Option<Severity>) -> Self {
        self.min_severity = min;
        self
    }

    /// Register the source with the backend unless already done.
    ///
    /// A failed registration is retried on the next write.
    pub fn ensure_source(&self) -> Result<(), SinkError> {
        let mut registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
        if *registered {
            return Ok(());
        }

        let exists = self
            .backend
            .source_exists(&self.log, &self.source)
            .map_err(|e| SinkError::target(&self.name, &e))?;
        if !exists {
            self.backend
                .register_source(&self.log, &self.source)
                .map_err(|e| SinkError::target(&self.name, &e))?;
            tracing::info!(log = %self.log, source = %self.source, "event log source registered");
        }

        *registered = true;
        Ok(())
    }
}

impl LogSink for EventLogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_severity(&self) -> Option<Severity> {
        self.min_severity
    }

    fn format(&self, entry: &LogEntry) -> String {
        self.formatter.format(entry)
    }

    fn emit(&self, formatted: &str, entry: &LogEntry) -> Result<(), SinkError> {
        self.ensure_source()?;

        let record = EventRecord {
            log: &self.log,
            source: &self.source,
            event_type: EventType::from(entry.severity()),
            event_id: entry.event_id(),
            message: formatted,
        };
        self.backend
            .write_event(&record)
            .map_err(|e| SinkError::target(&self.name, &e))
    }
}

/// Forwards event records to the `tracing` subscriber under the `event_log` target.
#[derive(Debug, Default)]
pub struct TracingBackend {
    sources: Mutex<HashSet<(String, String)>>,
}

impl TracingBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLogBackend for TracingBackend {
    fn source_exists(&self, log: &str, source: &str) -> io::Result<bool> {
        let sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(sources.contains(&(log.to_string(), source.to_string())))
    }

    fn register_source(&self, log: &str, source: &str) -> io::Result<()> {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        sources.insert((log.to_string(), source.to_string()));
        Ok(())
    }

    fn write_event(&self, record: &EventRecord<'_>) -> io::Result<()> {
        let EventRecord {
            log,
            source,
            event_id,
            message,
            ..
        } = *record;
        match record.event_type {
            EventType::Error => {
                tracing::error!(target: "event_log", log, source, event_id, "{message}")
            }
            EventType::Warning => {
                tracing::warn!(target: "event_log", log, source, event_id, "{message}")
            }
            EventType::Information => {
                tracing::info!(target: "event_log", log, source, event_id, "{message}")
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
pub use self::syslog::SyslogBackend;

#[cfg(unix)]
mod syslog {
    use std::io;
    use std::os::unix::net::UnixDatagram;
    use std::path::{Path, PathBuf};

    use super::{EventLogBackend, EventRecord, EventType};

    /// Default local syslog socket.
    pub const DEFAULT_SOCKET: &str = "/dev/log";

    /// `user` facility.
    const FACILITY: u8 = 1;

    /// Sends RFC 3164 messages to the local syslog daemon.
    ///
    /// Syslog has no source registry; a source "exists" when the socket does.
    #[derive(Debug, Clone)]
    pub struct SyslogBackend {
        socket: PathBuf,
    }

    impl SyslogBackend {
        pub fn new(socket: impl Into<PathBuf>) -> Self {
            Self {
                socket: socket.into(),
            }
        }

        pub fn socket(&self) -> &Path {
            &self.socket
        }
    }

    impl Default for SyslogBackend {
        fn default() -> Self {
            Self::new(DEFAULT_SOCKET)
        }
    }

    fn priority(event_type: EventType) -> u8 {
        let severity = match event_type {
            EventType::Error => 3,
            EventType::Warning => 4,
            EventType::Information => 6,
        };
        FACILITY * 8 + severity
    }

    /// Render one syslog datagram.
    pub(super) fn datagram(record: &EventRecord<'_>, pid: u32) -> String {
        let message = record.message.trim_end().replace('\n', " | ");
        format!(
            "<{}>{}[{}]: [{}] {}",
            priority(record.event_type),
            record.source,
            pid,
            record.event_id,
            message
        )
    }

    impl EventLogBackend for SyslogBackend {
        fn source_exists(&self, _log: &str, _source: &str) -> io::Result<bool> {
            if self.socket.exists() {
                Ok(true)
            } else {
                Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("syslog socket {} not found", self.socket.display()),
                ))
            }
        }

        fn register_source(&self, _log: &str, _source: &str) -> io::Result<()> {
            Ok(())
        }

        fn write_event(&self, record: &EventRecord<'_>) -> io::Result<()> {
            let socket = UnixDatagram::unbound()?;
            socket.send_to(datagram(record, std::process::id()).as_bytes(), &self.socket)?;
            Ok(())
        }
    }
}
