//! Schema material subsystem.
//!
//! # Data Flow
//! ```text
//! schema file on disk
//!     → source.rs (read bytes + mtime, missing file = None)
//!     → SchemaSnapshot (immutable, one per generation)
//!     → codec::build_backend (compile into a CodecBackend)
//! ```
//!
//! # Design Decisions
//! - A missing file is not an error; the direction is simply unconfigured
//! - Sources never parse content; malformed material is the codec's problem
//! - Snapshots are never edited, a reload always builds a new one

pub mod direction;
pub mod snapshot;
pub mod source;

pub use direction::Direction;
pub use snapshot::SchemaSnapshot;
pub use source::{SchemaError, SchemaSource};
