//! Category-based routing of log entries to sinks.
//!
//! # Responsibilities
//! - Honor the global logging switch before touching any sink
//! - Union the sinks of every matching category, each sink at most once
//! - Apply category and sink severity filters
//! - Attempt every sink and report failures together
//!
//! # Design Decisions
//! - The route table is immutable; reconfiguration builds a new table and
//!   swaps it in with `ArcSwap`
//! - Writers never lock the table, they load a snapshot

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::PipelineConfig;
use crate::pipeline::entry::{LogEntry, Severity};
use crate::pipeline::error::{BuildError, WriteError};
use crate::sinks::{build_sink, LogSink};

/// Process-wide master switch for logging.
///
/// Cloning shares the same flag.
#[derive(Debug, Clone)]
pub struct LoggingSwitch(Arc<AtomicBool>);

impl LoggingSwitch {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }
}

#[derive(Debug)]
struct CategoryRoute {
    min_severity: Option<Severity>,
    sinks: Vec<usize>,
}

impl CategoryRoute {
    fn accepts(&self, severity: Severity) -> bool {
        self.min_severity.map_or(true, |min| severity >= min)
    }
}

#[derive(Debug)]
struct RouteTable {
    sinks: Vec<Arc<dyn LogSink>>,
    routes: HashMap<String, CategoryRoute>,
}

impl RouteTable {
    /// Sinks reached by the entry's categories, each once, in first-seen order.
    fn resolve(&self, entry: &LogEntry) -> Vec<&Arc<dyn LogSink>> {
        let mut seen = vec![false; self.sinks.len()];
        let mut targets = Vec::new();

        for category in entry.categories() {
            let Some(route) = self.routes.get(category) else {
                tracing::trace!(%category, "no route for category");
                continue;
            };
            if !route.accepts(entry.severity()) {
                continue;
            }
            for &index in &route.sinks {
                if !seen[index] {
                    seen[index] = true;
                    targets.push(&self.sinks[index]);
                }
            }
        }
        targets
    }
}

/// Assembles a [`LogRouter`] from sinks and category registrations.
///
/// Logging starts enabled unless `logging_enabled(false)` is set.
#[derive(Debug)]
pub struct RouterBuilder {
    logging_enabled: bool,
    sinks: Vec<Arc<dyn LogSink>>,
    categories: Vec<(String, Option<Severity>, Vec<String>)>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            logging_enabled: true,
            sinks: Vec::new(),
            categories: Vec::new(),
        }
    }

    pub fn logging_enabled(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Register a category that routes to the named sinks.
    pub fn category<I, S>(
        mut self,
        name: impl Into<String>,
        min_severity: Option<Severity>,
        sinks: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.push((
            name.into(),
            min_severity,
            sinks.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn build(self) -> Result<LogRouter, BuildError> {
        let enabled = self.logging_enabled;
        let table = self.into_table()?;
        Ok(LogRouter {
            switch: LoggingSwitch::new(enabled),
            table: ArcSwap::from_pointee(table),
        })
    }

    fn into_table(self) -> Result<RouteTable, BuildError> {
        let mut index_by_name: HashMap<String, usize> = HashMap::new();
        for (index, sink) in self.sinks.iter().enumerate() {
            if index_by_name.insert(sink.name().to_string(), index).is_some() {
                return Err(BuildError::DuplicateSink(sink.name().to_string()));
            }
        }

        let mut routes: HashMap<String, CategoryRoute> = HashMap::new();
        for (category, min_severity, sink_names) in self.categories {
            let mut indices = Vec::with_capacity(sink_names.len());
            for sink in sink_names {
                let Some(&index) = index_by_name.get(&sink) else {
                    return Err(BuildError::UnknownSink { category, sink });
                };
                if !indices.contains(&index) {
                    indices.push(index);
                }
            }

            let route = routes.entry(category).or_insert(CategoryRoute {
                min_severity,
                sinks: Vec::new(),
            });
            for index in indices {
                if !route.sinks.contains(&index) {
                    route.sinks.push(index);
                }
            }
        }

        Ok(RouteTable {
            sinks: self.sinks,
            routes,
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes entries to the sinks registered for their categories.
#[derive(Debug)]
pub struct LogRouter {
    switch: LoggingSwitch,
    table: ArcSwap<RouteTable>,
}

impl LogRouter {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Build sinks and routes from configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, BuildError> {
        let router = builder_from_config(config)?.build()?;
        tracing::info!(
            sinks = config.sinks.len(),
            categories = config.categories.len(),
            logging_enabled = config.logging_enabled,
            "log router configured"
        );
        Ok(router)
    }

    /// Replace the route table and switch state with a freshly built one.
    ///
    /// On error the current configuration stays in place.
    pub fn reconfigure(&self, config: &PipelineConfig) -> Result<(), BuildError> {
        let table = builder_from_config(config)?.into_table()?;
        self.table.store(Arc::new(table));
        self.switch.set(config.logging_enabled);
        tracing::info!(
            sinks = config.sinks.len(),
            categories = config.categories.len(),
            logging_enabled = config.logging_enabled,
            "log router reconfigured"
        );
        Ok(())
    }

    pub fn is_logging_enabled(&self) -> bool {
        self.switch.is_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.switch.set(enabled);
    }

    /// Shared handle to the master switch.
    pub fn switch(&self) -> LoggingSwitch {
        self.switch.clone()
    }

    /// Names of all configured sinks.
    pub fn sink_names(&self) -> Vec<String> {
        self.table
            .load()
            .sinks
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Registered category names, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.load().routes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Deliver an entry to every matching sink.
    ///
    /// Returns `Ok(())` without touching any sink while logging is disabled.
    /// A failing sink never prevents delivery to its siblings; all failures
    /// are returned together in [`WriteError`].
    pub fn write(&self, entry: &LogEntry) -> Result<(), WriteError> {
        if !self.switch.is_enabled() {
            return Ok(());
        }

        let table = self.table.load();
        let mut failures = Vec::new();
        let mut delivered = 0;

        for sink in table.resolve(entry) {
            if !sink.accepts(entry.severity()) {
                continue;
            }
            let formatted = sink.format(entry);
            match sink.emit(&formatted, entry) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(sink = %sink.name(), kind = %e.kind, error = %e.message, "sink write failed");
                    failures.push(e);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WriteError {
                failures,
                delivered,
            })
        }
    }
}

fn builder_from_config(config: &PipelineConfig) -> Result<RouterBuilder, BuildError> {
    let mut builder = RouterBuilder::new().logging_enabled(config.logging_enabled);
    for sink in &config.sinks {
        builder = builder.sink(build_sink(sink)?);
    }
    for category in &config.categories {
        builder = builder.category(
            category.name.clone(),
            category.min_severity,
            category.sinks.iter().cloned(),
        );
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::error::{SinkError, SinkErrorKind};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct MemorySink {
        name: String,
        min: Option<Severity>,
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    impl MemorySink {
        fn new(name: &str) -> Arc<Self> {
            Self::with(name, None, false)
        }

        fn with(name: &str, min: Option<Severity>, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                min,
                fail,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl LogSink for MemorySink {
        fn name(&self) -> &str {
            &self.name
        }

        fn min_severity(&self) -> Option<Severity> {
            self.min
        }

        fn format(&self, entry: &LogEntry) -> String {
            entry.message().to_string()
        }

        fn emit(&self, formatted: &str, _entry: &LogEntry) -> Result<(), SinkError> {
            self.seen.lock().unwrap().push(formatted.to_string());
            if self.fail {
                return Err(SinkError::new(SinkErrorKind::IoFailure, &self.name, "boom"));
            }
            Ok(())
        }
    }

    fn entry(severity: Severity, categories: &[&str]) -> LogEntry {
        LogEntry::new("Testing", severity, categories.iter().copied()).unwrap()
    }

    #[test]
    fn test_duplicate_sink_rejected() {
        let err = LogRouter::builder()
            .sink(MemorySink::new("a"))
            .sink(MemorySink::new("a"))
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::DuplicateSink("a".into()));
    }

    #[test]
    fn test_unknown_sink_rejected() {
        let err = LogRouter::builder()
            .category("Simple", None, ["missing"])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::UnknownSink {
                category: "Simple".into(),
                sink: "missing".into()
            }
        );
    }

    #[test]
    fn test_unknown_category_is_ignored() {
        let sink = MemorySink::new("a");
        let router = LogRouter::builder()
            .sink(sink.clone())
            .category("Simple", None, ["a"])
            .build()
            .unwrap();

        router.write(&entry(Severity::Error, &["Other"])).unwrap();
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_category_severity_filter() {
        let sink = MemorySink::new("a");
        let router = LogRouter::builder()
            .sink(sink.clone())
            .category("Simple", Some(Severity::Warning), ["a"])
            .build()
            .unwrap();

        router.write(&entry(Severity::Information, &["Simple"])).unwrap();
        router.write(&entry(Severity::Warning, &["Simple"])).unwrap();
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn test_all_categories_reach_their_sinks() {
        let flat = MemorySink::new("flat");
        let xml = MemorySink::with("xml", Some(Severity::Error), false);
        let router = LogRouter::builder()
            .sink(flat.clone())
            .sink(xml.clone())
            .category("Simple", None, ["flat"])
            .category("xml", None, ["xml"])
            .build()
            .unwrap();

        router.write(&entry(Severity::Error, &["Simple", "xml"])).unwrap();
        assert_eq!(flat.count(), 1);
        assert_eq!(xml.count(), 1);
    }

    #[test]
    fn test_switch_is_shared() {
        let sink = MemorySink::new("a");
        let router = LogRouter::builder()
            .sink(sink.clone())
            .category("A", None, ["a"])
            .build()
            .unwrap();

        let switch = router.switch();
        switch.set(false);
        assert!(!router.is_logging_enabled());
        router.write(&entry(Severity::Critical, &["A"])).unwrap();
        assert_eq!(sink.count(), 0);

        router.set_enabled(true);
        router.write(&entry(Severity::Critical, &["A"])).unwrap();
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn test_delivered_count_on_failure() {
        let bad = MemorySink::with("bad", None, true);
        let good = MemorySink::new("good");
        let router = LogRouter::builder()
            .sink(bad.clone())
            .sink(good.clone())
            .category("A", None, ["bad", "good"])
            .build()
            .unwrap();

        let err = router.write(&entry(Severity::Error, &["A"])).unwrap_err();
        assert_eq!(err.delivered, 1);
        assert_eq!(err.failed_sinks(), vec!["bad"]);
        assert_eq!(good.count(), 1);
    }
}
