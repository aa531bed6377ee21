//! Loading schema material from disk.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use thiserror::Error;

use crate::codec::SchemaFormat;
use crate::schema::{Direction, SchemaSnapshot};

/// Errors raised while reading a schema file that exists.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reads the schema file configured for one direction.
#[derive(Debug, Clone)]
pub struct SchemaSource {
    direction: Direction,
    path: PathBuf,
    format: SchemaFormat,
}

impl SchemaSource {
    pub fn new(direction: Direction, path: impl Into<PathBuf>, format: SchemaFormat) -> Self {
        Self {
            direction,
            path: path.into(),
            format,
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

    /// Load the file content and modification time.
    ///
    /// Returns `Ok(None)` when the file does not exist. The file is stat'ed
    /// before it is read, so a write landing in between pairs the new bytes
    /// with the older mtime and the next reload still advances the version.
    pub async fn load(&self) -> Result<Option<SchemaSnapshot>, SchemaError> {
        match self.stat().await? {
            Some(metadata) => self.read_after(&metadata).await,
            None => Ok(None),
        }
    }

    /// Blocking variant of [`SchemaSource::load`] for synchronous callers.
    pub fn load_blocking(&self) -> Result<Option<SchemaSnapshot>, SchemaError> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let material = match std::fs::read(&self.path) {
            Ok(material) => material,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        Ok(Some(self.snapshot(material, &metadata)))
    }

    async fn stat(&self) -> Result<Option<Metadata>, SchemaError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(direction = %self.direction, path = ?self.path, "Schema file not found");
                Ok(None)
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn read_after(&self, metadata: &Metadata) -> Result<Option<SchemaSnapshot>, SchemaError> {
        match tokio::fs::read(&self.path).await {
            Ok(material) => Ok(Some(self.snapshot(material, metadata))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(direction = %self.direction, path = ?self.path, "Schema file removed while loading");
                Ok(None)
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn snapshot(&self, material: Vec<u8>, metadata: &Metadata) -> SchemaSnapshot {
        SchemaSnapshot::new(
            self.direction,
            self.path.clone(),
            self.format,
            material,
            mtime_millis(metadata),
        )
    }

    fn io_error(&self, source: io::Error) -> SchemaError {
        SchemaError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Modification time in milliseconds; 0 when the platform cannot report it.
fn mtime_millis(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
