//! Log entry and severity model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a log entry.
///
/// Totally ordered: `Verbose < Information < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Verbose,
    Information,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Verbose,
        Severity::Information,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Verbose => "Verbose",
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown severity: {0}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "verbose" | "trace" | "debug" => Ok(Severity::Verbose),
            "information" | "info" => Ok(Severity::Information),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" | "fatal" => Ok(Severity::Critical),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("a log entry needs at least one category")]
    NoCategories,
}

/// Immutable unit of structured log data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    message: String,
    severity: Severity,
    categories: Vec<String>,
    timestamp: DateTime<Utc>,
    title: String,
    priority: i32,
    event_id: i32,
    properties: BTreeMap<String, String>,
}

impl LogEntry {
    /// Start building an entry with the given message.
    pub fn builder(message: impl Into<String>) -> LogEntryBuilder {
        LogEntryBuilder::new(message)
    }

    /// Shorthand for an entry with only the required fields.
    pub fn new<I, S>(
        message: impl Into<String>,
        severity: Severity,
        categories: I,
    ) -> Result<Self, EntryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(message)
            .severity(severity)
            .categories(categories)
            .build()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Categories in the order they were added, without duplicates.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn event_id(&self) -> i32 {
        self.event_id
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// Builder for [`LogEntry`].
#[derive(Debug, Clone)]
pub struct LogEntryBuilder {
    message: String,
    severity: Severity,
    categories: Vec<String>,
    timestamp: Option<DateTime<Utc>>,
    title: String,
    priority: i32,
    event_id: i32,
    properties: BTreeMap<String, String>,
}

impl LogEntryBuilder {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Information,
            categories: Vec::new(),
            timestamp: None,
            title: String::new(),
            priority: -1,
            event_id: 1,
            properties: BTreeMap::new(),
        }
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }

    pub fn categories<I, S>(self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        categories.into_iter().fold(self, |b, c| b.category(c))
    }

    /// Override the creation time (defaults to now at build time).
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn event_id(mut self, event_id: i32) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<LogEntry, EntryError> {
        if self.categories.is_empty() {
            return Err(EntryError::NoCategories);
        }

        Ok(LogEntry {
            message: self.message,
            severity: self.severity,
            categories: self.categories,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            title: self.title,
            priority: self.priority,
            event_id: self.event_id,
            properties: self.properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_total_order() {
        for pair in Severity::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("Error".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!("info".parse::<Severity>().unwrap(), Severity::Information);
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn test_entry_requires_category() {
        let err = LogEntry::builder("Testing").build().unwrap_err();
        assert_eq!(err, EntryError::NoCategories);
    }

    #[test]
    fn test_builder_defaults_and_dedup() {
        let entry = LogEntry::builder("Testing")
            .severity(Severity::Error)
            .categories(["Simple", "xml", "Simple"])
            .property("ActivityId", "abc")
            .build()
            .unwrap();

        assert_eq!(entry.categories(), &["Simple".to_string(), "xml".to_string()]);
        assert_eq!(entry.priority(), -1);
        assert_eq!(entry.event_id(), 1);
        assert_eq!(entry.title(), "");
        assert_eq!(entry.property("ActivityId"), Some("abc"));
        assert_eq!(entry.property("Missing"), None);
    }
}
