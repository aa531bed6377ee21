//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! registry.toml
//!     → loader.rs (read & deserialize, resolve base_dir)
//!     → validation.rs (semantic checks)
//!     → RegistryConfig (validated, immutable)
//!     → Registry::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; schema files reload, config does not
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ObservabilityConfig, RegistryConfig, WatchConfig};
