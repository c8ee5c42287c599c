//! Shared sinks and helpers for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use observability_pipeline::pipeline::{LogEntry, Severity};
use observability_pipeline::sinks::{LogSink, SinkError, SinkErrorKind};

/// Records every emitted record in memory.
#[derive(Debug)]
pub struct RecordingSink {
    name: String,
    min_severity: Option<Severity>,
    emits: AtomicUsize,
    records: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_min(name, None)
    }

    pub fn with_min(name: &str, min_severity: Option<Severity>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            min_severity,
            emits: AtomicUsize::new(0),
            records: Mutex::new(Vec::new()),
        })
    }

    pub fn emit_count(&self) -> usize {
        self.emits.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn records(&self) -> Vec<String> {
        self.records.lock().unwrap().clone()
    }
}

impl LogSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_severity(&self) -> Option<Severity> {
        self.min_severity
    }

    fn format(&self, entry: &LogEntry) -> String {
        format!("{}|{}", entry.severity(), entry.message())
    }

    fn emit(&self, formatted: &str, _entry: &LogEntry) -> Result<(), SinkError> {
        self.emits.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().push(formatted.to_string());
        Ok(())
    }
}

/// Fails every write with the given kind.
#[derive(Debug)]
pub struct FailingSink {
    name: String,
    kind: SinkErrorKind,
    attempts: AtomicUsize,
}

impl FailingSink {
    #[allow(dead_code)]
    pub fn new(name: &str, kind: SinkErrorKind) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            kind,
            attempts: AtomicUsize::new(0),
        })
    }

    #[allow(dead_code)]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl LogSink for FailingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, entry: &LogEntry) -> String {
        entry.message().to_string()
    }

    fn emit(&self, _formatted: &str, _entry: &LogEntry) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::new(self.kind, &self.name, "injected failure"))
    }
}

/// Entry with the given severity and categories.
pub fn entry(severity: Severity, categories: &[&str]) -> LogEntry {
    LogEntry::new("Testing", severity, categories.iter().copied()).unwrap()
}
