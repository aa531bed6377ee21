//! Runtime protocol-schema registry.
//!
//! Maps route names to protobuf message types for both directions of a
//! client/server connection, encodes and decodes messages by route, and
//! hot-reloads schema files behind a monotonic version.

pub mod codec;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod reload;
pub mod schema;

pub use codec::{CodecBackend, CodecError, SchemaFormat};
pub use config::RegistryConfig;
pub use lifecycle::Shutdown;
pub use registry::{Protos, Registry, RegistryError, RegistryState, ReloadOutcome, RouteDescriptor};
pub use schema::Direction;
