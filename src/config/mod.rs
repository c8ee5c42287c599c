//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PipelineConfig (validated, immutable)
//!     → LogRouter::from_config
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → LogRouter::reconfigure (atomic swap of the route table)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The pipeline core never reads files itself; this module is the outer layer

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{CategoryConfig, MetricsConfig, PipelineConfig, SinkConfig, SinkKind};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
