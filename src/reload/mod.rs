//! Hot reload of schema files.
//!
//! # Data Flow
//! ```text
//! notify event (parent dir)
//!     → watcher.rs (file name filter, content-change filter, gate)
//!     → SchemaEvent over mpsc
//!     → registry reload task
//!     → Registry::reload(direction)
//! ```
//!
//! # Design Decisions
//! - One watcher per direction; each knows only its own file
//! - The watcher never reads schemas, it only signals
//! - Closing a guard fences late callbacks from the OS watcher

pub mod watcher;

pub use watcher::{is_content_change, ReloadWatcher, SchemaEvent, WatchGuard};
