//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Init logging/metrics → Registry::start
//!
//! Shutdown (shutdown.rs):
//!     Registry::stop → close watchers → broadcast → reload task exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop the registry
//!     SIGHUP → reload both schema directions
//! ```
//!
//! # Design Decisions
//! - Schema errors never fail startup; only config errors do
//! - Stop is fenced: no reload swaps after it returns

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{Signal, SignalListener};
pub use startup::{bootstrap, StartupError};
