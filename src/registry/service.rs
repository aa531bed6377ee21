//! The registry facade.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde_json::Value as JsonValue;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::codec::build_backend;
use crate::config::RegistryConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::registry::generation::{Generation, RouteDescriptor};
use crate::registry::protos::{ProtoBundle, Protos};
use crate::registry::types::{RegistryError, RegistryResult, RegistryState, ReloadOutcome};
use crate::registry::version::VersionClock;
use crate::reload::{ReloadWatcher, SchemaEvent, WatchGuard};
use crate::schema::{Direction, SchemaSnapshot, SchemaSource};

/// Time to let a burst of file events settle before reloading.
const RELOAD_SETTLE: Duration = Duration::from_millis(50);

/// Runtime schema registry for both message directions.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

struct Inner {
    config: RegistryConfig,
    outbound: Slot,
    inbound: Slot,
    clock: VersionClock,
    state: AtomicU8,
    reloads_in_flight: AtomicUsize,
    stopped: AtomicBool,
    next_generation: AtomicU64,
    shutdown: Shutdown,
    background: Mutex<Background>,
}

/// Live generation of one direction plus what is needed to replace it.
struct Slot {
    source: SchemaSource,
    current: ArcSwap<Generation>,
    reload_lock: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct Background {
    watchers: Vec<WatchGuard>,
    task: Option<JoinHandle<()>>,
}

/// Counts a reload as in flight for as long as it lives.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Inner {
    fn slot(&self, direction: Direction) -> &Slot {
        match direction {
            Direction::Outbound => &self.outbound,
            Direction::Inbound => &self.inbound,
        }
    }

    fn base_state(&self) -> RegistryState {
        RegistryState::from(self.state.load(Ordering::Acquire))
    }

    fn next_generation_id(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::AcqRel)
    }

    /// Load a direction for startup. Failures leave the direction without a
    /// backend instead of failing the start.
    async fn initial_generation(&self, direction: Direction) -> Generation {
        let slot = self.slot(direction);
        let snapshot = match slot.source.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::info!(direction = %direction, path = ?slot.source.path(), "Schema file not found, direction unavailable");
                return Generation::empty(direction);
            }
            Err(e) => {
                tracing::warn!(direction = %direction, error = %e, "Failed to load schema, direction unavailable");
                return Generation::empty(direction);
            }
        };

        let id = self.next_generation_id();
        match build_backend(snapshot.format(), snapshot.material()) {
            Ok(backend) => {
                tracing::info!(
                    direction = %direction,
                    generation = id,
                    routes = backend.routes().len(),
                    "Schema loaded"
                );
                Generation::new(id, direction, Some(Arc::new(snapshot)), Some(backend))
            }
            Err(e) => {
                tracing::warn!(direction = %direction, error = %e, "Failed to compile schema, direction unavailable");
                Generation::new(id, direction, Some(Arc::new(snapshot)), None)
            }
        }
    }
}

impl Registry {
    /// Create a registry. Nothing is loaded until [`Registry::start`].
    pub fn new(config: RegistryConfig) -> Self {
        let slot = |direction: Direction| Slot {
            source: SchemaSource::new(direction, config.schema_path(direction), config.schema_format),
            current: ArcSwap::from_pointee(Generation::empty(direction)),
            reload_lock: tokio::sync::Mutex::new(()),
        };
        let outbound = slot(Direction::Outbound);
        let inbound = slot(Direction::Inbound);

        Self {
            inner: Arc::new(Inner {
                config,
                outbound,
                inbound,
                clock: VersionClock::new(),
                state: AtomicU8::new(RegistryState::Uninitialized as u8),
                reloads_in_flight: AtomicUsize::new(0),
                stopped: AtomicBool::new(false),
                next_generation: AtomicU64::new(1),
                shutdown: Shutdown::new(),
                background: Mutex::new(Background::default()),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Load both directions, compute the initial version and, when enabled,
    /// start watching the schema files.
    ///
    /// Missing or malformed schemas are logged and leave that direction
    /// unavailable. Only a second start (or a start after stop) fails.
    pub async fn start(&self) -> RegistryResult<()> {
        let inner = &self.inner;
        inner
            .state
            .compare_exchange(
                RegistryState::Uninitialized as u8,
                RegistryState::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|actual| RegistryError::InvalidState {
                expected: RegistryState::Uninitialized,
                actual: RegistryState::from(actual),
            })?;

        let outbound = inner.initial_generation(Direction::Outbound).await;
        let inbound = inner.initial_generation(Direction::Inbound).await;

        if let Some(version) = VersionClock::compute(&[outbound.snapshot(), inbound.snapshot()]) {
            inner.clock.advance(version);
        }
        metrics::record_backend_available(Direction::Outbound, outbound.is_available());
        metrics::record_backend_available(Direction::Inbound, inbound.is_available());
        inner.outbound.current.store(Arc::new(outbound));
        inner.inbound.current.store(Arc::new(inbound));

        let version = inner.clock.current();
        metrics::record_version(version);

        if inner.config.watch_for_changes {
            self.spawn_watchers();
        }

        // A concurrent stop wins; it has already set the final state.
        let _ = inner.state.compare_exchange(
            RegistryState::Starting as u8,
            RegistryState::Ready as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        tracing::info!(version, watch = inner.config.watch_for_changes, "Registry started");
        Ok(())
    }

    fn spawn_watchers(&self) {
        let inner = &self.inner;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watchers = Vec::with_capacity(Direction::ALL.len());
        for direction in Direction::ALL {
            let watcher = ReloadWatcher::new(
                direction,
                inner.slot(direction).source.path(),
                inner.config.watch.poll_interval(),
                event_tx.clone(),
            );
            match watcher.run() {
                Ok(guard) => watchers.push(guard),
                Err(e) => tracing::warn!(direction = %direction, error = %e, "Failed to watch schema file"),
            }
        }
        drop(event_tx);

        let shutdown_rx = inner.shutdown.subscribe();
        let task = tokio::spawn(reload_task(Arc::downgrade(inner), event_rx, shutdown_rx));

        let mut background = inner.background.lock().unwrap_or_else(|p| p.into_inner());
        if inner.stopped.load(Ordering::Acquire) {
            for guard in &watchers {
                guard.close();
            }
            task.abort();
            return;
        }
        background.watchers = watchers;
        background.task = Some(task);
    }

    /// Resolve a route in one direction.
    ///
    /// `Ok(None)` means the schema has no such route. Both hits and misses
    /// are cached until the next reload of that direction.
    pub fn check(&self, direction: Direction, route: &str) -> RegistryResult<Option<Arc<RouteDescriptor>>> {
        self.inner.slot(direction).current.load().resolve(route)
    }

    /// Like [`Registry::check`], taking "outbound"/"inbound" or the legacy
    /// "server"/"client" tag.
    pub fn check_tag(&self, tag: &str, route: &str) -> RegistryResult<Option<Arc<RouteDescriptor>>> {
        self.check(tag.parse()?, route)
    }

    /// Encode a message this process sends.
    pub fn encode(&self, route: &str, value: &JsonValue) -> RegistryResult<Vec<u8>> {
        let generation = self.inner.outbound.current.load_full();
        generation.encode(route, value).map_err(|e| {
            if matches!(e, RegistryError::Codec(_)) {
                metrics::record_codec_error("encode");
            }
            e
        })
    }

    /// Decode a message this process receives.
    pub fn decode(&self, route: &str, bytes: &[u8]) -> RegistryResult<JsonValue> {
        let generation = self.inner.inbound.current.load_full();
        generation.decode(route, bytes).map_err(|e| {
            if matches!(e, RegistryError::Codec(_)) {
                metrics::record_codec_error("decode");
            }
            e
        })
    }

    /// Raw schema material of both directions and the current version.
    pub fn protos(&self) -> Protos {
        let bundle = |direction: Direction| {
            self.inner
                .slot(direction)
                .current
                .load()
                .snapshot()
                .map(ProtoBundle::from_snapshot)
        };
        Protos {
            outbound: bundle(Direction::Outbound),
            inbound: bundle(Direction::Inbound),
            version: self.version(),
        }
    }

    pub fn version(&self) -> u64 {
        self.inner.clock.current()
    }

    pub fn state(&self) -> RegistryState {
        let state = self.inner.base_state();
        if state == RegistryState::Ready && self.inner.reloads_in_flight.load(Ordering::Acquire) > 0 {
            RegistryState::Reloading
        } else {
            state
        }
    }

    /// The live generation of a direction.
    pub fn generation(&self, direction: Direction) -> Arc<Generation> {
        self.inner.slot(direction).current.load_full()
    }

    /// Routes resolvable in a direction, sorted.
    pub fn routes(&self, direction: Direction) -> RegistryResult<Vec<String>> {
        let generation = self.inner.slot(direction).current.load_full();
        generation
            .backend()
            .map(|backend| backend.routes())
            .ok_or(RegistryError::BackendUnavailable(direction))
    }

    /// Re-read and recompile one direction's schema.
    ///
    /// Reloads of the same direction run one at a time. Any failure keeps
    /// the live generation and reports [`ReloadOutcome::Kept`].
    pub async fn reload(&self, direction: Direction) -> RegistryResult<ReloadOutcome> {
        let inner = &self.inner;
        if inner.stopped.load(Ordering::Acquire) {
            metrics::record_reload(direction, ReloadOutcome::Discarded.as_str());
            return Ok(ReloadOutcome::Discarded);
        }
        let state = inner.base_state();
        if state != RegistryState::Ready {
            return Err(RegistryError::InvalidState {
                expected: RegistryState::Ready,
                actual: state,
            });
        }

        let slot = inner.slot(direction);
        let _serial = slot.reload_lock.lock().await;
        let _in_flight = InFlight::enter(&inner.reloads_in_flight);

        let outcome = self.swap_generation(direction, slot).await;
        metrics::record_reload(direction, outcome.as_str());
        Ok(outcome)
    }

    async fn swap_generation(&self, direction: Direction, slot: &Slot) -> ReloadOutcome {
        let inner = &self.inner;

        let snapshot: SchemaSnapshot = match slot.source.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::warn!(direction = %direction, path = ?slot.source.path(), "Schema file missing, keeping current generation");
                return ReloadOutcome::Kept;
            }
            Err(e) => {
                tracing::warn!(direction = %direction, error = %e, "Failed to reload schema, keeping current generation");
                return ReloadOutcome::Kept;
            }
        };

        let backend = match build_backend(snapshot.format(), snapshot.material()) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(direction = %direction, error = %e, "Failed to compile schema, keeping current generation");
                return ReloadOutcome::Kept;
            }
        };

        // stop() takes this direction's reload lock after setting the flag,
        // so nothing swaps once it returns.
        if inner.stopped.load(Ordering::Acquire) {
            return ReloadOutcome::Discarded;
        }

        let generation = inner.next_generation_id();
        let mtime_ms = snapshot.mtime_ms();
        slot.current.store(Arc::new(Generation::new(
            generation,
            direction,
            Some(Arc::new(snapshot)),
            Some(backend),
        )));
        let version = inner.clock.advance(mtime_ms);

        metrics::record_version(version);
        metrics::record_backend_available(direction, true);
        tracing::info!(direction = %direction, generation, version, "Schema reloaded");

        ReloadOutcome::Swapped { generation, version }
    }

    /// Stop watching and reloading. Idempotent.
    ///
    /// With `force` the reload task is aborted instead of being allowed to
    /// finish its current reload. Either way no generation is swapped after
    /// this returns.
    pub async fn stop(&self, force: bool) {
        let inner = &self.inner;
        if inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let background = {
            let mut guard = inner.background.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };
        for watcher in &background.watchers {
            watcher.close();
        }
        drop(background.watchers);

        inner.shutdown.trigger();
        if let Some(task) = background.task {
            if force {
                task.abort();
            }
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Reload task ended abnormally");
                }
            }
        }

        for direction in Direction::ALL {
            let _fence = inner.slot(direction).reload_lock.lock().await;
        }

        inner.state.store(RegistryState::Stopped as u8, Ordering::Release);
        tracing::info!(version = self.version(), force, "Registry stopped");
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("state", &self.state())
            .field("version", &self.version())
            .field("outbound_generation", &self.inner.outbound.current.load().id())
            .field("inbound_generation", &self.inner.inbound.current.load().id())
            .finish()
    }
}

/// Turns watcher events into reloads until shutdown or until the registry
/// is dropped.
async fn reload_task(
    registry: Weak<Inner>,
    mut events: mpsc::UnboundedReceiver<SchemaEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        tokio::time::sleep(RELOAD_SETTLE).await;
        let mut pending = vec![event.direction];
        while let Ok(more) = events.try_recv() {
            if !pending.contains(&more.direction) {
                pending.push(more.direction);
            }
        }

        let Some(inner) = registry.upgrade() else {
            break;
        };
        let registry_handle = Registry { inner };
        for direction in pending {
            match registry_handle.reload(direction).await {
                Ok(outcome) => tracing::debug!(direction = %direction, outcome = outcome.as_str(), "Watched reload finished"),
                Err(e) => tracing::warn!(direction = %direction, error = %e, "Watched reload rejected"),
            }
        }
    }
    tracing::debug!("Reload task exited");
}
