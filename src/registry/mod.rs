//! Schema registry.
//!
//! # Data Flow
//! ```text
//! Registry::start
//!     → SchemaSource::load (per direction)
//!     → codec::build_backend
//!     → Generation {snapshot, backend, route cache} stored in an ArcSwap
//!     → VersionClock::advance(max mtime)
//!
//! check / encode / decode
//!     → load the live Generation once
//!     → Generation::resolve (DashMap, hits and misses memoized)
//!     → CodecBackend::encode / decode
//!
//! SchemaEvent / Registry::reload
//!     → per-direction async lock
//!     → load + compile → stopped fence → ArcSwap::store → VersionClock::advance
//! ```
//!
//! # Design Decisions
//! - A direction's snapshot, backend and cache are one value, so a reader
//!   never mixes generations
//! - Reload failures keep the live generation; they are logged, not raised
//! - The version never decreases, whatever mtimes the files report

pub mod generation;
pub mod protos;
pub mod service;
pub mod types;
pub mod version;

pub use generation::{Generation, RouteDescriptor};
pub use protos::{ProtoBundle, Protos};
pub use service::Registry;
pub use types::{RegistryError, RegistryResult, RegistryState, ReloadOutcome};
pub use version::VersionClock;
