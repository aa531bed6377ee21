//! One immutable generation of a direction's schema.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value as JsonValue;

use crate::codec::{CodecBackend, MessageDescriptor};
use crate::observability::metrics;
use crate::registry::types::{RegistryError, RegistryResult};
use crate::schema::{Direction, SchemaSnapshot};

/// Handle for encoding and decoding one route.
#[derive(Debug)]
pub struct RouteDescriptor {
    route: String,
    direction: Direction,
    generation: u64,
    message: MessageDescriptor,
}

impl RouteDescriptor {
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Generation this descriptor was resolved in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn message(&self) -> &MessageDescriptor {
        &self.message
    }

    /// Fully qualified message name.
    pub fn full_name(&self) -> &str {
        self.message.full_name()
    }
}

/// Snapshot, backend and route cache of one direction, swapped as a unit.
///
/// The cache is filled lazily and dies with the generation, so a descriptor
/// from an older schema is never served after a reload.
#[derive(Debug)]
pub struct Generation {
    id: u64,
    direction: Direction,
    snapshot: Option<Arc<SchemaSnapshot>>,
    backend: Option<Arc<dyn CodecBackend>>,
    cache: DashMap<String, Option<Arc<RouteDescriptor>>>,
}

impl Generation {
    /// Generation 0: nothing loaded.
    pub fn empty(direction: Direction) -> Self {
        Self::new(0, direction, None, None)
    }

    pub fn new(
        id: u64,
        direction: Direction,
        snapshot: Option<Arc<SchemaSnapshot>>,
        backend: Option<Arc<dyn CodecBackend>>,
    ) -> Self {
        Self {
            id,
            direction,
            snapshot,
            backend,
            cache: DashMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn snapshot(&self) -> Option<&SchemaSnapshot> {
        self.snapshot.as_deref()
    }

    pub fn backend(&self) -> Option<&Arc<dyn CodecBackend>> {
        self.backend.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Number of memoized lookups, hits and misses alike.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn require_backend(&self) -> RegistryResult<&Arc<dyn CodecBackend>> {
        self.backend
            .as_ref()
            .ok_or(RegistryError::BackendUnavailable(self.direction))
    }

    /// Resolve a route, memoizing the answer for this generation.
    ///
    /// Concurrent first lookups of the same route agree on one `Arc`.
    pub fn resolve(&self, route: &str) -> RegistryResult<Option<Arc<RouteDescriptor>>> {
        let backend = self.require_backend()?;

        if let Some(entry) = self.cache.get(route) {
            metrics::record_lookup(self.direction, true);
            return Ok(entry.value().clone());
        }
        metrics::record_lookup(self.direction, false);

        let resolved = backend.lookup(route).map(|message| {
            Arc::new(RouteDescriptor {
                route: route.to_string(),
                direction: self.direction,
                generation: self.id,
                message,
            })
        });

        let cached = self
            .cache
            .entry(route.to_string())
            .or_insert(resolved)
            .value()
            .clone();
        Ok(cached)
    }

    fn require_route(&self, route: &str) -> RegistryResult<Arc<RouteDescriptor>> {
        self.resolve(route)?.ok_or_else(|| RegistryError::RouteNotFound {
            direction: self.direction,
            route: route.to_string(),
        })
    }

    pub fn encode(&self, route: &str, value: &JsonValue) -> RegistryResult<Vec<u8>> {
        let descriptor = self.require_route(route)?;
        let backend = self.require_backend()?;
        Ok(backend.encode(descriptor.message(), value)?)
    }

    pub fn decode(&self, route: &str, bytes: &[u8]) -> RegistryResult<JsonValue> {
        let descriptor = self.require_route(route)?;
        let backend = self.require_backend()?;
        Ok(backend.decode(descriptor.message(), bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{build_backend, SchemaFormat};
    use serde_json::json;

    const SCHEMA: &str = r#"
        syntax = "proto3";
        message chat_send { string text = 1; }
    "#;

    fn generation(id: u64) -> Generation {
        let backend = build_backend(SchemaFormat::TextSchema, SCHEMA.as_bytes()).unwrap();
        Generation::new(id, Direction::Outbound, None, Some(backend))
    }

    #[test]
    fn test_empty_generation_has_no_backend() {
        let empty = Generation::empty(Direction::Inbound);
        assert_eq!(empty.id(), 0);
        assert!(!empty.is_available());
        assert!(matches!(
            empty.resolve("chat.send"),
            Err(RegistryError::BackendUnavailable(Direction::Inbound))
        ));
    }

    #[test]
    fn test_resolve_memoizes_hits_and_misses() {
        let generation = generation(3);

        let first = generation.resolve("chat.send").unwrap().unwrap();
        let second = generation.resolve("chat.send").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.generation(), 3);
        assert_eq!(first.full_name(), "chat_send");

        assert!(generation.resolve("chat.leave").unwrap().is_none());
        assert!(generation.resolve("chat.leave").unwrap().is_none());
        assert_eq!(generation.cache_len(), 2);
    }

    #[test]
    fn test_encode_unknown_route() {
        let generation = generation(1);
        let err = generation.encode("chat.leave", &json!({})).unwrap_err();
        assert!(matches!(err, RegistryError::RouteNotFound { ref route, .. } if route == "chat.leave"));

        let bytes = generation.encode("chat.send", &json!({"text": "hi"})).unwrap();
        assert_eq!(generation.decode("chat.send", &bytes).unwrap(), json!({"text": "hi"}));
    }
}
