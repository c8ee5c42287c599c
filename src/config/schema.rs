//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Sections
//! carry `#[serde(default)]` so minimal files are accepted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::entry::Severity;
use crate::pipeline::formatter::DEFAULT_TEMPLATE;
use crate::sinks::event_log::EventLogBackendKind;
use crate::sinks::file::DEFAULT_SEPARATOR;
use crate::sinks::rolling::{RollFileExists, RollInterval, DEFAULT_TIMESTAMP_PATTERN};
use crate::sinks::structured::StructuredFormat;

/// Root configuration for the pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Master switch. When false no sink is ever invoked.
    pub logging_enabled: bool,

    /// Diagnostics of the process itself.
    pub observability: ObservabilityConfig,

    /// Counter demo and exposition settings.
    pub metrics: MetricsConfig,

    pub sinks: Vec<SinkConfig>,

    pub categories: Vec<CategoryConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            logging_enabled: true,
            observability: ObservabilityConfig::default(),
            metrics: MetricsConfig::default(),
            sinks: Vec::new(),
            categories: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// The stock four-sink setup, with all files under `log_dir`.
    ///
    /// | category | sink    | notes                                  |
    /// |----------|---------|----------------------------------------|
    /// | Simple   | flat    | framed text records                    |
    /// | EventLog | events  | "Application" log                      |
    /// | xml      | xml     | Error and above only                   |
    /// | Rolling  | rolling | 20 KB / every minute, 15 archives kept |
    pub fn demo(log_dir: &Path) -> Self {
        let rolling = RollingFileConfig {
            path: log_dir.join("RollingFlatFile.log"),
            max_size_bytes: 20 * 1024,
            roll_interval: RollInterval::Minute,
            ..RollingFileConfig::default()
        };

        Self {
            sinks: vec![
                SinkConfig {
                    name: "flat".into(),
                    min_severity: None,
                    kind: SinkKind::FlatFile(FileSinkConfig {
                        path: log_dir.join("FlatFile.log"),
                        ..FileSinkConfig::default()
                    }),
                },
                SinkConfig {
                    name: "events".into(),
                    min_severity: None,
                    kind: SinkKind::EventLog(EventLogConfig::default()),
                },
                SinkConfig {
                    name: "xml".into(),
                    min_severity: Some(Severity::Error),
                    kind: SinkKind::StructuredFile(StructuredFileConfig {
                        path: log_dir.join("application log.xml"),
                        format: StructuredFormat::Xml,
                    }),
                },
                SinkConfig {
                    name: "rolling".into(),
                    min_severity: None,
                    kind: SinkKind::RollingFlatFile(rolling),
                },
            ],
            categories: vec![
                CategoryConfig::new("Simple", ["flat"]),
                CategoryConfig::new("EventLog", ["events"]),
                CategoryConfig::new("xml", ["xml"]),
                CategoryConfig::new("Rolling", ["rolling"]),
            ],
            ..Self::default()
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Counter category, sampling and exporter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Category created by the `counters` command.
    pub category: String,

    /// Minimum time between rate resamples.
    pub rate_window_ms: u64,

    /// How often the sampler reads counters.
    pub sample_interval_ms: u64,

    /// Install the Prometheus HTTP listener.
    pub exporter_enabled: bool,

    pub exporter_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            category: "PerfCounter Samples".to_string(),
            rate_window_ms: 1000,
            sample_interval_ms: 1000,
            exporter_enabled: false,
            exporter_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// One configured sink.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Unique sink name, referenced by categories.
    pub name: String,

    /// Sink-level severity filter.
    #[serde(default)]
    pub min_severity: Option<Severity>,

    #[serde(flatten)]
    pub kind: SinkKind,
}

/// Sink variant, selected by the `kind` key.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkKind {
    FlatFile(FileSinkConfig),
    RollingFlatFile(RollingFileConfig),
    StructuredFile(StructuredFileConfig),
    EventLog(EventLogConfig),
}

impl SinkKind {
    pub fn label(&self) -> &'static str {
        match self {
            SinkKind::FlatFile(_) => "flat_file",
            SinkKind::RollingFlatFile(_) => "rolling_flat_file",
            SinkKind::StructuredFile(_) => "structured_file",
            SinkKind::EventLog(_) => "event_log",
        }
    }

    /// Target file, for file-backed sinks.
    pub fn path(&self) -> Option<&Path> {
        match self {
            SinkKind::FlatFile(c) => Some(&c.path),
            SinkKind::RollingFlatFile(c) => Some(&c.path),
            SinkKind::StructuredFile(c) => Some(&c.path),
            SinkKind::EventLog(_) => None,
        }
    }
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileSinkConfig {
    pub path: PathBuf,

    #[serde(default = "default_separator")]
    pub header: String,

    #[serde(default = "default_separator")]
    pub footer: String,

    #[serde(default = "default_template")]
    pub template: String,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            header: default_separator(),
            footer: default_separator(),
            template: default_template(),
        }
    }
}

fn default_max_size_bytes() -> u64 {
    20 * 1024
}

fn default_timestamp_pattern() -> String {
    DEFAULT_TIMESTAMP_PATTERN.to_string()
}

fn default_max_archived_files() -> usize {
    15
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RollingFileConfig {
    pub path: PathBuf,

    #[serde(default = "default_separator")]
    pub header: String,

    #[serde(default = "default_separator")]
    pub footer: String,

    #[serde(default = "default_template")]
    pub template: String,

    /// Size threshold; 0 disables size-based rolling.
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,

    /// chrono pattern for archive names.
    #[serde(default = "default_timestamp_pattern")]
    pub timestamp_pattern: String,

    #[serde(default)]
    pub roll_file_exists: RollFileExists,

    #[serde(default)]
    pub roll_interval: RollInterval,

    /// Archives retained; 0 keeps all.
    #[serde(default = "default_max_archived_files")]
    pub max_archived_files: usize,
}

impl Default for RollingFileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            header: default_separator(),
            footer: default_separator(),
            template: default_template(),
            max_size_bytes: default_max_size_bytes(),
            timestamp_pattern: default_timestamp_pattern(),
            roll_file_exists: RollFileExists::default(),
            roll_interval: RollInterval::default(),
            max_archived_files: default_max_archived_files(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StructuredFileConfig {
    pub path: PathBuf,

    #[serde(default)]
    pub format: StructuredFormat,
}

fn default_log_name() -> String {
    "Application".to_string()
}

fn default_event_source() -> String {
    "Enterprise Library Logging Sample".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventLogConfig {
    #[serde(default = "default_log_name")]
    pub log_name: String,

    #[serde(default = "default_event_source")]
    pub source: String,

    #[serde(default)]
    pub backend: EventLogBackendKind,

    /// Syslog socket; defaults to `/dev/log`.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    #[serde(default = "default_template")]
    pub template: String,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            log_name: default_log_name(),
            source: default_event_source(),
            backend: EventLogBackendKind::default(),
            socket_path: None,
            template: default_template(),
        }
    }
}

/// Routing key mapped to one or more sinks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryConfig {
    pub name: String,

    /// Category-level severity filter, applied before sink filters.
    #[serde(default)]
    pub min_severity: Option<Severity>,

    pub sinks: Vec<String>,
}

impl CategoryConfig {
    pub fn new<I, S>(name: impl Into<String>, sinks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            min_severity: None,
            sinks: sinks.into_iter().map(Into::into).collect(),
        }
    }
}
