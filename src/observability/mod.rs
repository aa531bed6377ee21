//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! registry, reload and codec paths produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (reload outcomes, lookups, codec errors, version)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (direction, path, route, version) on every event
//! - Metric updates go through the `metrics` facade and are free when no
//!   recorder is installed

pub mod logging;
pub mod metrics;
