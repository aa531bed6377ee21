//! Codec backends.
//!
//! # Data Flow
//! ```text
//! SchemaSnapshot material
//!     → build_backend (strategy chosen by SchemaFormat):
//!         - descriptor_set.rs (serialized FileDescriptorSet)
//!         - type_map.rs (JSON route → message definition map)
//!         - proto_text.rs (.proto text compiled at load time)
//!     → Arc<dyn CodecBackend>
//!     → lookup(route) → MessageDescriptor
//!     → encode / decode via json.rs (JSON ↔ DynamicMessage ↔ wire bytes)
//! ```
//!
//! # Design Decisions
//! - Every strategy compiles into a prost-reflect DescriptorPool, so the
//!   wire codec is shared and only construction and lookup differ
//! - Route normalization (dots → underscores) belongs to each backend
//! - Construction is fallible and never panics

pub mod descriptor_set;
pub mod json;
pub mod proto_text;
pub mod type_map;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub use descriptor_set::DescriptorSetBackend;
pub use prost_reflect::MessageDescriptor;
pub use proto_text::ProtoTextBackend;
pub use type_map::TypeMapBackend;

/// How schema material on disk is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaFormat {
    /// A serialized `FileDescriptorSet` (e.g. `protoc --descriptor_set_out`).
    #[default]
    BinaryDescriptor,
    /// A JSON map from route name to message definition.
    GeneratedMap,
    /// `.proto` schema text.
    TextSchema,
}

impl SchemaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaFormat::BinaryDescriptor => "binary-descriptor",
            SchemaFormat::GeneratedMap => "generated-map",
            SchemaFormat::TextSchema => "text-schema",
        }
    }
}

impl fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by backend construction and by encode/decode.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid descriptor: {0}")]
    Descriptor(String),

    #[error("Schema parse error: {0}")]
    Parse(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Field error: {0}")]
    Field(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Resolves routes to message descriptors and converts values to and from
/// wire bytes.
pub trait CodecBackend: Send + Sync + fmt::Debug {
    /// The schema format this backend was built from.
    fn format(&self) -> SchemaFormat;

    /// Resolve a route name to its message descriptor.
    fn lookup(&self, route: &str) -> Option<MessageDescriptor>;

    /// Route names this backend can resolve, sorted.
    fn routes(&self) -> Vec<String>;

    /// Encode a JSON value as the given message.
    fn encode(&self, descriptor: &MessageDescriptor, value: &JsonValue) -> CodecResult<Vec<u8>> {
        json::encode_message(descriptor, value)
    }

    /// Decode wire bytes of the given message into JSON.
    fn decode(&self, descriptor: &MessageDescriptor, bytes: &[u8]) -> CodecResult<JsonValue> {
        json::decode_message(descriptor, bytes)
    }
}

/// Dots in a route name become underscores in message names.
pub fn normalize_route(route: &str) -> String {
    route.replace('.', "_")
}

/// Build the backend for `format` from raw schema material.
pub fn build_backend(format: SchemaFormat, material: &[u8]) -> CodecResult<Arc<dyn CodecBackend>> {
    let backend: Arc<dyn CodecBackend> = match format {
        SchemaFormat::BinaryDescriptor => Arc::new(DescriptorSetBackend::from_bytes(material)?),
        SchemaFormat::GeneratedMap => Arc::new(TypeMapBackend::from_json(material)?),
        SchemaFormat::TextSchema => Arc::new(ProtoTextBackend::from_text(material)?),
    };
    Ok(backend)
}
