//! Immutable schema snapshots.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::codec::SchemaFormat;
use crate::schema::Direction;

/// Raw schema material for one direction, captured at load time.
///
/// A snapshot is never mutated. Reload builds a new one and the registry
/// replaces the old generation wholesale.
#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    direction: Direction,
    path: PathBuf,
    format: SchemaFormat,
    material: Bytes,
    /// File modification time in milliseconds since the Unix epoch.
    mtime_ms: u64,
}

impl SchemaSnapshot {
    pub fn new(
        direction: Direction,
        path: impl Into<PathBuf>,
        format: SchemaFormat,
        material: impl Into<Bytes>,
        mtime_ms: u64,
    ) -> Self {
        Self {
            direction,
            path: path.into(),
            format,
            material: material.into(),
            mtime_ms,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SchemaFormat {
        self.format
    }

    /// The bytes exactly as read from disk.
    pub fn material(&self) -> &[u8] {
        &self.material
    }

    pub fn mtime_ms(&self) -> u64 {
        self.mtime_ms
    }

    pub fn len(&self) -> usize {
        self.material.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material.is_empty()
    }
}
