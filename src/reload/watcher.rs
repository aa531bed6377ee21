//! Schema file watcher for hot reload.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::schema::Direction;

/// A content change observed on one direction's schema file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEvent {
    pub direction: Direction,
    pub path: PathBuf,
}

/// A watcher that reports changes to a single schema file.
///
/// The parent directory is watched so that a file created after startup is
/// still seen. Only creation and in-place writes count as content changes;
/// a file renamed over the schema path (an atomic save) is not reported.
pub struct ReloadWatcher {
    direction: Direction,
    path: PathBuf,
    poll_interval: Duration,
    event_tx: mpsc::UnboundedSender<SchemaEvent>,
}

impl ReloadWatcher {
    pub fn new(
        direction: Direction,
        path: &Path,
        poll_interval: Duration,
        event_tx: mpsc::UnboundedSender<SchemaEvent>,
    ) -> Self {
        Self {
            direction,
            path: path.to_path_buf(),
            poll_interval,
            event_tx,
        }
    }

    /// Start watching. Events stop flowing once the returned guard is closed
    /// or dropped.
    pub fn run(self) -> Result<WatchGuard, notify::Error> {
        let tx = self.event_tx.clone();
        let direction = self.direction;
        let path = self.path.clone();
        let file_name: Option<OsString> = self.path.file_name().map(|n| n.to_os_string());
        let active = Arc::new(AtomicBool::new(true));
        let gate = Arc::clone(&active);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !gate.load(Ordering::Acquire) || !is_content_change(&event.kind) {
                        return;
                    }
                    let touches_schema = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_schema {
                        tracing::debug!(direction = %direction, path = ?path, "Schema file change detected");
                        let _ = tx.send(SchemaEvent {
                            direction,
                            path: path.clone(),
                        });
                    }
                }
                Err(e) => tracing::error!(direction = %direction, "Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )?;

        let watch_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        tracing::info!(direction = %self.direction, path = ?self.path, "Schema watcher started");
        Ok(WatchGuard {
            direction: self.direction,
            active,
            _watcher: watcher,
        })
    }
}

/// Creations and data writes count; metadata, access, rename and removal
/// events do not.
pub fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::File)
            | EventKind::Create(CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
    )
}

/// Keeps a watcher alive. Closing it stops event delivery immediately, even
/// if the OS watcher still has callbacks in flight.
pub struct WatchGuard {
    direction: Direction,
    active: Arc<AtomicBool>,
    _watcher: RecommendedWatcher,
}

impl WatchGuard {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            tracing::debug!(direction = %self.direction, "Schema watcher closed");
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard")
            .field("direction", &self.direction)
            .field("active", &self.is_active())
            .finish()
    }
}
