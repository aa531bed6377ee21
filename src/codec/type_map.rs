//! Generated type map backend.
//!
//! Material is a JSON object keyed by route name. Each value describes one
//! message in the compact key format emitted by schema generators:
//!
//! ```json
//! {
//!   "area.onMove": {
//!     "required uInt32 entityId": 1,
//!     "message Path": { "required sInt32 x": 1, "required sInt32 y": 2 },
//!     "repeated Path path": 2
//!   }
//! }
//! ```
//!
//! Field keys are `<label> <type> <name>` with the tag as value. Message type
//! names resolve against `message` definitions in the current message and
//! then its enclosing ones. The whole map compiles to one proto2 file up
//! front, so `lookup` is a plain map access by route name.

use std::collections::{BTreeSet, HashMap};

use prost_reflect::{DescriptorPool, MessageDescriptor};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use serde_json::{Map, Value as JsonValue};

use crate::codec::proto_text::scalar_type;
use crate::codec::{normalize_route, CodecBackend, CodecError, CodecResult, SchemaFormat};

const FILE_NAME: &str = "generated_map.proto";

#[derive(Debug, Clone)]
pub struct TypeMapBackend {
    pool: DescriptorPool,
    routes: HashMap<String, MessageDescriptor>,
}

impl TypeMapBackend {
    /// Compile a JSON type map.
    pub fn from_json(material: &[u8]) -> CodecResult<Self> {
        let root: JsonValue = serde_json::from_slice(material)
            .map_err(|e| CodecError::Parse(format!("Invalid type map JSON: {}", e)))?;
        let definitions = root
            .as_object()
            .ok_or_else(|| CodecError::Parse("Type map must be a JSON object".to_string()))?;

        let mut file = FileDescriptorProto {
            name: Some(FILE_NAME.to_string()),
            syntax: Some("proto2".to_string()),
            ..Default::default()
        };
        let mut message_names = Vec::with_capacity(definitions.len());
        for (route, definition) in definitions {
            let name = normalize_route(route);
            let definition = definition.as_object().ok_or_else(|| {
                CodecError::Parse(format!("Route {} must map to a JSON object", route))
            })?;
            file.message_type
                .push(build_message(&name, &format!(".{}", name), definition, &[])?);
            message_names.push((route.clone(), name));
        }

        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_proto(file)
            .map_err(|e| CodecError::Descriptor(e.to_string()))?;

        let mut routes = HashMap::with_capacity(message_names.len());
        for (route, name) in message_names {
            let descriptor = pool.get_message_by_name(&name).ok_or_else(|| {
                CodecError::Descriptor(format!("Message {} missing after compilation", name))
            })?;
            routes.insert(route, descriptor);
        }

        Ok(Self { pool, routes })
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }
}

impl CodecBackend for TypeMapBackend {
    fn format(&self) -> SchemaFormat {
        SchemaFormat::GeneratedMap
    }

    fn lookup(&self, route: &str) -> Option<MessageDescriptor> {
        self.routes.get(route).cloned()
    }

    fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self.routes.keys().cloned().collect();
        routes.sort();
        routes
    }
}

/// Message definitions visible from one nesting level.
#[derive(Debug, Clone)]
struct Scope {
    full_name: String,
    nested: BTreeSet<String>,
}

fn build_message(
    name: &str,
    full_name: &str,
    definition: &Map<String, JsonValue>,
    outer: &[Scope],
) -> CodecResult<DescriptorProto> {
    let nested: BTreeSet<String> = definition
        .keys()
        .filter_map(|key| key.strip_prefix("message "))
        .map(|n| n.trim().to_string())
        .collect();
    let mut scopes = outer.to_vec();
    scopes.push(Scope {
        full_name: full_name.to_string(),
        nested,
    });

    let mut message = DescriptorProto {
        name: Some(name.to_string()),
        ..Default::default()
    };

    for (key, value) in definition {
        if let Some(nested_name) = key.strip_prefix("message ") {
            let nested_name = nested_name.trim();
            let nested_def = value.as_object().ok_or_else(|| {
                CodecError::Parse(format!("{} in {} must be a JSON object", key, name))
            })?;
            message.nested_type.push(build_message(
                nested_name,
                &format!("{}.{}", full_name, nested_name),
                nested_def,
                &scopes,
            )?);
        } else {
            message.field.push(build_field(key, value, name, &scopes)?);
        }
    }

    message.field.sort_by_key(|f| f.number);
    Ok(message)
}

fn build_field(key: &str, value: &JsonValue, message: &str, scopes: &[Scope]) -> CodecResult<FieldDescriptorProto> {
    let parts: Vec<&str> = key.split_whitespace().collect();
    let [label, type_name, field_name] = parts.as_slice() else {
        return Err(CodecError::Parse(format!(
            "Field key {:?} in {} must be \"<label> <type> <name>\"",
            key, message
        )));
    };

    let label = match *label {
        "required" => Label::Required,
        "optional" => Label::Optional,
        "repeated" => Label::Repeated,
        other => {
            return Err(CodecError::Parse(format!("Unknown label {:?} in {}", other, message)));
        }
    };

    let number = value
        .as_u64()
        .and_then(|n| i32::try_from(n).ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| CodecError::Parse(format!("Field {} in {} needs a positive tag", field_name, message)))?;

    let (ty, resolved) = match legacy_scalar(type_name) {
        Some(ty) => (ty, None),
        None => {
            let resolved = resolve(type_name, scopes).ok_or_else(|| {
                CodecError::Parse(format!("Unknown type {} for field {} in {}", type_name, field_name, message))
            })?;
            (Type::Message, Some(resolved))
        }
    };

    Ok(FieldDescriptorProto {
        name: Some(field_name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        type_name: resolved,
        ..Default::default()
    })
}

/// Generator spellings first, then the plain protobuf keywords.
fn legacy_scalar(type_name: &str) -> Option<Type> {
    match type_name {
        "uInt32" => Some(Type::Uint32),
        "sInt32" => Some(Type::Sint32),
        "uInt64" => Some(Type::Uint64),
        "sInt64" => Some(Type::Sint64),
        other => scalar_type(other),
    }
}

fn resolve(type_name: &str, scopes: &[Scope]) -> Option<String> {
    scopes
        .iter()
        .rev()
        .find(|scope| scope.nested.contains(type_name))
        .map(|scope| format!("{}.{}", scope.full_name, type_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MAP: &str = r#"{
        "area.onMove": {
            "required uInt32 entityId": 1,
            "message Point": { "required sInt32 x": 1, "required sInt32 y": 2 },
            "repeated Point path": 2,
            "message Meta": {
                "optional Point origin": 1,
                "optional string note": 2
            },
            "optional Meta meta": 3
        },
        "chat.send": { "required string text": 1 }
    }"#;

    #[test]
    fn test_routes_are_plain_keys() {
        let backend = TypeMapBackend::from_json(MAP.as_bytes()).unwrap();

        assert_eq!(backend.routes(), vec!["area.onMove", "chat.send"]);
        assert!(backend.lookup("chat.send").is_some());
        assert!(backend.lookup("chat_send").is_none());
        assert_eq!(backend.lookup("area.onMove").unwrap().full_name(), "area_onMove");
    }

    #[test]
    fn test_nested_types_resolve_through_enclosing_scopes() {
        let backend = TypeMapBackend::from_json(MAP.as_bytes()).unwrap();
        let desc = backend.lookup("area.onMove").unwrap();

        let message = json!({
            "entityId": 9,
            "path": [{ "x": -1, "y": 2 }, { "x": 3, "y": -4 }],
            "meta": { "origin": { "x": 0, "y": 0 }, "note": "spawn" }
        });
        let bytes = backend.encode(&desc, &message).unwrap();
        assert_eq!(backend.decode(&desc, &bytes).unwrap(), message);
    }

    #[test]
    fn test_legacy_and_plain_type_spellings() {
        assert_eq!(legacy_scalar("uInt32"), Some(Type::Uint32));
        assert_eq!(legacy_scalar("uint32"), Some(Type::Uint32));
        assert_eq!(legacy_scalar("sInt64"), Some(Type::Sint64));
        assert_eq!(legacy_scalar("Point"), None);
    }

    #[test]
    fn test_invalid_maps_are_rejected() {
        let cases = [
            "not json",
            "[]",
            r#"{ "a": 1 }"#,
            r#"{ "a": { "required string": 1 } }"#,
            r#"{ "a": { "sometimes string x": 1 } }"#,
            r#"{ "a": { "optional Missing x": 1 } }"#,
            r#"{ "a": { "optional string x": 0 } }"#,
            r#"{ "a": { "optional string x": 1, "optional string y": 1 } }"#,
        ];
        for case in cases {
            assert!(TypeMapBackend::from_json(case.as_bytes()).is_err(), "accepted {}", case);
        }
    }
}
