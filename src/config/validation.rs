//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (categories reference existing sinks)
//! - Validate value ranges (rate window > 0, exporter address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{PipelineConfig, SinkKind};
use crate::pipeline::formatter::{invalid_time_formats, is_valid_time_format};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("sink at index {0} has an empty name")]
    EmptySinkName(usize),

    #[error("duplicate sink name: {0}")]
    DuplicateSink(String),

    #[error("category at index {0} has an empty name")]
    EmptyCategoryName(usize),

    #[error("duplicate category: {0}")]
    DuplicateCategory(String),

    #[error("category `{category}` references unknown sink `{sink}`")]
    UnknownSink { category: String, sink: String },

    #[error("sink `{0}` has an empty path")]
    EmptyPath(String),

    #[error("sink `{0}` has an empty event source")]
    EmptyEventSource(String),

    #[error("sink `{0}` has an empty timestamp pattern")]
    EmptyTimestampPattern(String),

    #[error("sink `{sink}` has an unusable timestamp pattern `{pattern}`")]
    InvalidTimestampPattern { sink: String, pattern: String },

    #[error("sink `{sink}` template has an invalid timestamp format `{format}`")]
    InvalidTemplateTimestamp { sink: String, format: String },

    #[error("metrics.rate_window_ms must be greater than zero")]
    ZeroRateWindow,

    #[error("metrics.sample_interval_ms must be greater than zero")]
    ZeroSampleInterval,

    #[error("invalid exporter address: {0}")]
    InvalidExporterAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut sink_names = HashSet::new();
    for (index, sink) in config.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            errors.push(ValidationError::EmptySinkName(index));
        } else if !sink_names.insert(sink.name.as_str()) {
            errors.push(ValidationError::DuplicateSink(sink.name.clone()));
        }

        if sink.kind.path().is_some_and(|p| p.as_os_str().is_empty()) {
            errors.push(ValidationError::EmptyPath(sink.name.clone()));
        }

        if let SinkKind::RollingFlatFile(rolling) = &sink.kind {
            let pattern = &rolling.timestamp_pattern;
            if pattern.is_empty() {
                errors.push(ValidationError::EmptyTimestampPattern(sink.name.clone()));
            } else if !is_valid_time_format(pattern) || pattern.contains(['/', '\\']) {
                errors.push(ValidationError::InvalidTimestampPattern {
                    sink: sink.name.clone(),
                    pattern: pattern.clone(),
                });
            }
        }
        if let SinkKind::EventLog(event_log) = &sink.kind {
            if event_log.source.trim().is_empty() {
                errors.push(ValidationError::EmptyEventSource(sink.name.clone()));
            }
        }

        let template = match &sink.kind {
            SinkKind::FlatFile(c) => Some(&c.template),
            SinkKind::RollingFlatFile(c) => Some(&c.template),
            SinkKind::EventLog(c) => Some(&c.template),
            SinkKind::StructuredFile(_) => None,
        };
        for format in template.map(|t| invalid_time_formats(t)).unwrap_or_default() {
            errors.push(ValidationError::InvalidTemplateTimestamp {
                sink: sink.name.clone(),
                format,
            });
        }
    }

    let mut category_names = HashSet::new();
    for (index, category) in config.categories.iter().enumerate() {
        if category.name.trim().is_empty() {
            errors.push(ValidationError::EmptyCategoryName(index));
        } else if !category_names.insert(category.name.as_str()) {
            errors.push(ValidationError::DuplicateCategory(category.name.clone()));
        }

        for sink in &category.sinks {
            if !sink_names.contains(sink.as_str()) {
                errors.push(ValidationError::UnknownSink {
                    category: category.name.clone(),
                    sink: sink.clone(),
                });
            }
        }
    }

    if config.metrics.rate_window_ms == 0 {
        errors.push(ValidationError::ZeroRateWindow);
    }
    if config.metrics.sample_interval_ms == 0 {
        errors.push(ValidationError::ZeroSampleInterval);
    }
    if config.metrics.exporter_enabled
        && config.metrics.exporter_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidExporterAddress(
            config.metrics.exporter_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
