//! Process-wide store of named counters.
//!
//! # Responsibilities
//! - Register counters by name (idempotent)
//! - Increment without locks (one `AtomicU64` per counter)
//! - Serve point-in-time snapshots to pollers
//! - Create and delete counter categories

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Errors raised by the counter registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricsError {
    /// The handle does not belong to this registry or its counter was deleted.
    #[error("invalid counter handle: {0}")]
    InvalidHandle(String),

    /// A category with this name is already registered.
    #[error("counter category already exists: {0}")]
    CategoryExists(String),

    /// No category with this name is registered.
    #[error("unknown counter category: {0}")]
    UnknownCategory(String),
}

/// How consumers are expected to read a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    /// Running total of items.
    #[default]
    Total,
    /// Read through a [`RateCounter`](crate::counters::RateCounter) as events per second.
    RatePerSecond,
}

#[derive(Debug)]
struct Counter {
    name: String,
    kind: CounterKind,
    value: AtomicU64,
    live: AtomicBool,
}

impl Counter {
    fn new(name: String, kind: CounterKind) -> Self {
        Self {
            name,
            kind,
            value: AtomicU64::new(0),
            live: AtomicBool::new(true),
        }
    }
}

/// Reference to a registered counter.
///
/// Cheap to clone. Only valid against the registry that issued it.
#[derive(Debug, Clone)]
pub struct CounterHandle {
    registry: u64,
    counter: Arc<Counter>,
}

impl CounterHandle {
    /// Fully qualified counter name.
    pub fn name(&self) -> &str {
        &self.counter.name
    }

    /// Kind recorded at registration.
    pub fn kind(&self) -> CounterKind {
        self.counter.kind
    }
}

/// Value of a counter at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub value: u64,
    pub taken_at: Instant,
}

/// Snapshot of a counter together with its identity, for exposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSnapshot {
    pub name: String,
    pub kind: CounterKind,
    pub value: u64,
}

/// Counter definition used when creating a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSpec {
    pub name: String,
    pub kind: CounterKind,
}

impl CounterSpec {
    pub fn new(name: impl Into<String>, kind: CounterKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug)]
struct Category {
    help: String,
    counters: Vec<String>,
}

/// Thread-safe registry of counters and counter categories.
#[derive(Debug)]
pub struct MetricRegistry {
    id: u64,
    counters: DashMap<String, Arc<Counter>>,
    categories: DashMap<String, Category>,
}

impl MetricRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            counters: DashMap::new(),
            categories: DashMap::new(),
        }
    }

    /// Register a total counter, or return the existing handle.
    pub fn register(&self, name: &str) -> CounterHandle {
        self.register_with(name, CounterKind::Total)
    }

    /// Register a counter of the given kind, or return the existing handle.
    ///
    /// An existing counter keeps the kind it was first registered with.
    pub fn register_with(&self, name: &str, kind: CounterKind) -> CounterHandle {
        let counter = self
            .counters
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(counter = %name, ?kind, "counter registered");
                Arc::new(Counter::new(name.to_string(), kind))
            })
            .clone();

        CounterHandle {
            registry: self.id,
            counter,
        }
    }

    /// Look up a registered counter by name.
    pub fn counter(&self, name: &str) -> Option<CounterHandle> {
        self.counters.get(name).map(|r| CounterHandle {
            registry: self.id,
            counter: r.value().clone(),
        })
    }

    /// Add one to a counter.
    pub fn increment(&self, handle: &CounterHandle) -> Result<(), MetricsError> {
        self.increment_by(handle, 1)
    }

    /// Atomically add `delta` to a counter.
    ///
    /// Fails fast with [`MetricsError::InvalidHandle`] when the handle is not
    /// live in this registry.
    pub fn increment_by(&self, handle: &CounterHandle, delta: u64) -> Result<(), MetricsError> {
        let counter = self.resolve(handle)?;
        counter.value.fetch_add(delta, Ordering::Relaxed);
        Ok(())
    }

    /// Read the current value of a counter.
    pub fn snapshot(&self, handle: &CounterHandle) -> Result<CounterSnapshot, MetricsError> {
        let counter = self.resolve(handle)?;
        Ok(CounterSnapshot {
            value: counter.value.load(Ordering::Relaxed),
            taken_at: Instant::now(),
        })
    }

    /// Snapshot every registered counter, sorted by name.
    pub fn snapshot_all(&self) -> Vec<NamedSnapshot> {
        let mut snapshots: Vec<NamedSnapshot> = self
            .counters
            .iter()
            .map(|r| NamedSnapshot {
                name: r.key().clone(),
                kind: r.value().kind,
                value: r.value().value.load(Ordering::Relaxed),
            })
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Create a category and register its counters.
    ///
    /// Counters are registered under [`qualified_name`]. Handles are returned
    /// in the order of `specs`.
    pub fn create_category(
        &self,
        name: &str,
        help: &str,
        specs: &[CounterSpec],
    ) -> Result<Vec<CounterHandle>, MetricsError> {
        let slot = match self.categories.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(MetricsError::CategoryExists(name.to_string())),
            Entry::Vacant(slot) => slot,
        };

        let handles: Vec<CounterHandle> = specs
            .iter()
            .map(|spec| self.register_with(&qualified_name(name, &spec.name), spec.kind))
            .collect();

        slot.insert(Category {
            help: help.to_string(),
            counters: handles.iter().map(|h| h.name().to_string()).collect(),
        });

        tracing::info!(category = %name, counters = handles.len(), "counter category created");
        Ok(handles)
    }

    /// Return true if the category is registered.
    pub fn category_exists(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    /// Help text of a category.
    pub fn category_help(&self, name: &str) -> Option<String> {
        self.categories.get(name).map(|c| c.help.clone())
    }

    /// Remove a category and its counters.
    ///
    /// Outstanding handles to the removed counters become invalid.
    pub fn delete_category(&self, name: &str) -> Result<(), MetricsError> {
        let (_, category) = self
            .categories
            .remove(name)
            .ok_or_else(|| MetricsError::UnknownCategory(name.to_string()))?;

        for counter_name in &category.counters {
            if let Some((_, counter)) = self.counters.remove(counter_name) {
                counter.live.store(false, Ordering::Release);
            }
        }

        tracing::info!(category = %name, "counter category deleted");
        Ok(())
    }

    fn resolve<'a>(&self, handle: &'a CounterHandle) -> Result<&'a Counter, MetricsError> {
        if handle.registry != self.id || !handle.counter.live.load(Ordering::Acquire) {
            return Err(MetricsError::InvalidHandle(handle.counter.name.clone()));
        }
        Ok(&handle.counter)
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Name under which a category's counter is registered.
pub fn qualified_name(category: &str, counter: &str) -> String {
    format!("{category}.{counter}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let registry = MetricRegistry::new();
        let a = registry.register("orders");
        let b = registry.register("orders");

        registry.increment(&a).unwrap();
        registry.increment(&b).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot(&a).unwrap().value, 2);
    }

    #[test]
    fn test_first_kind_wins() {
        let registry = MetricRegistry::new();
        registry.register_with("orders", CounterKind::RatePerSecond);
        let again = registry.register("orders");
        assert_eq!(again.kind(), CounterKind::RatePerSecond);
    }

    #[test]
    fn test_increment_by_delta() {
        let registry = MetricRegistry::new();
        let handle = registry.register("bytes");
        registry.increment_by(&handle, 40).unwrap();
        registry.increment_by(&handle, 2).unwrap();
        assert_eq!(registry.snapshot(&handle).unwrap().value, 42);
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let ours = MetricRegistry::new();
        let theirs = MetricRegistry::new();
        let handle = theirs.register("orders");

        let err = ours.increment(&handle).unwrap_err();
        assert_eq!(err, MetricsError::InvalidHandle("orders".into()));
        assert!(ours.snapshot(&handle).is_err());
    }

    #[test]
    fn test_category_lifecycle() {
        let registry = MetricRegistry::new();
        let handles = registry
            .create_category(
                "PerfCounter Samples",
                "none",
                &[
                    CounterSpec::new("Orders/Sec", CounterKind::RatePerSecond),
                    CounterSpec::new("TotalOrders", CounterKind::Total),
                ],
            )
            .unwrap();

        assert!(registry.category_exists("PerfCounter Samples"));
        assert_eq!(handles[1].name(), "PerfCounter Samples.TotalOrders");
        assert_eq!(registry.category_help("PerfCounter Samples").as_deref(), Some("none"));

        let again = registry.create_category("PerfCounter Samples", "none", &[]);
        assert_eq!(
            again.unwrap_err(),
            MetricsError::CategoryExists("PerfCounter Samples".into())
        );

        registry.delete_category("PerfCounter Samples").unwrap();
        assert!(!registry.category_exists("PerfCounter Samples"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_deleted_counter_handle_is_invalid() {
        let registry = MetricRegistry::new();
        let handles = registry
            .create_category("jobs", "", &[CounterSpec::new("done", CounterKind::Total)])
            .unwrap();
        registry.delete_category("jobs").unwrap();

        assert!(matches!(
            registry.increment(&handles[0]),
            Err(MetricsError::InvalidHandle(_))
        ));
    }

    #[test]
    fn test_delete_unknown_category() {
        let registry = MetricRegistry::new();
        assert_eq!(
            registry.delete_category("missing"),
            Err(MetricsError::UnknownCategory("missing".into()))
        );
    }

    #[test]
    fn test_snapshot_all_sorted() {
        let registry = MetricRegistry::new();
        let b = registry.register("b");
        registry.register("a");
        registry.increment_by(&b, 3).unwrap();

        let all = registry.snapshot_all();
        let names: Vec<&str> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(all[1].value, 3);
    }
}
