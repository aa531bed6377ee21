//! JSON ↔ protobuf conversion shared by every backend.
//!
//! Values travel through the registry as `serde_json::Value`. Encoding builds
//! a `DynamicMessage` from the JSON object and hands it to prost for the wire
//! format; decoding goes the other way.
//!
//! Conventions:
//! - `bytes` fields are base64 strings
//! - enums encode from a name or a number and decode to the name when known
//! - 64-bit integers accept numeric strings; `u64` above `i64::MAX` decodes
//!   to a string
//! - unknown JSON keys and `null` values are ignored on encode
//! - decode emits fields with presence plus non-empty repeated and map fields
//! - proto2 `required` fields must be set, in nested messages too, on both
//!   encode and decode

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use prost::Message;
use prost_reflect::{
    Cardinality, DynamicMessage, FieldDescriptor, Kind, MapKey, MessageDescriptor, ReflectMessage,
    Value as ProtoValue,
};
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::HashMap;

use crate::codec::{CodecError, CodecResult};

/// Encode a JSON object as wire bytes of `descriptor`.
pub fn encode_message(descriptor: &MessageDescriptor, value: &JsonValue) -> CodecResult<Vec<u8>> {
    let message = to_dynamic_message(descriptor, value)?;
    if let Some(field) = missing_required(&message) {
        return Err(CodecError::Encode(format!("missing required field {}", field)));
    }
    Ok(message.encode_to_vec())
}

/// Decode wire bytes of `descriptor` into a JSON object.
pub fn decode_message(descriptor: &MessageDescriptor, bytes: &[u8]) -> CodecResult<JsonValue> {
    let message = DynamicMessage::decode(descriptor.clone(), bytes)
        .map_err(|e| CodecError::Decode(format!("{}: {}", descriptor.full_name(), e)))?;
    if let Some(field) = missing_required(&message) {
        return Err(CodecError::Decode(format!("missing required field {}", field)));
    }
    message_to_json(&message)
}

/// Full name of the first unset `required` field, searching set submessages,
/// list items and map values.
pub fn missing_required(message: &DynamicMessage) -> Option<String> {
    let descriptor = message.descriptor();
    for field in descriptor.fields() {
        let present = message.has_field(&field);
        if field.cardinality() == Cardinality::Required && !present {
            return Some(field.full_name().to_string());
        }

        let value = message.get_field(&field);
        let found = match value.as_ref() {
            ProtoValue::Message(nested) if present => missing_required(nested),
            ProtoValue::List(items) => items.iter().find_map(|item| match item {
                ProtoValue::Message(nested) => missing_required(nested),
                _ => None,
            }),
            ProtoValue::Map(entries) => entries.values().find_map(|item| match item {
                ProtoValue::Message(nested) => missing_required(nested),
                _ => None,
            }),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Build a `DynamicMessage` from a JSON object.
pub fn to_dynamic_message(descriptor: &MessageDescriptor, value: &JsonValue) -> CodecResult<DynamicMessage> {
    let object = value.as_object().ok_or_else(|| {
        CodecError::Encode(format!("{} expects a JSON object", descriptor.full_name()))
    })?;

    let mut message = DynamicMessage::new(descriptor.clone());
    for field in descriptor.fields() {
        match object.get(field.name()) {
            None | Some(JsonValue::Null) => {}
            Some(value) => {
                let proto_value = field_to_proto(value, &field)?;
                message.set_field(&field, proto_value);
            }
        }
    }

    Ok(message)
}

/// Render a `DynamicMessage` as a JSON object.
pub fn message_to_json(message: &DynamicMessage) -> CodecResult<JsonValue> {
    let mut object = Map::new();

    for field in message.descriptor().fields() {
        let value = message.get_field(&field);
        let json = match value.as_ref() {
            ProtoValue::List(items) if field.is_list() => {
                if items.is_empty() {
                    continue;
                }
                let kind = field.kind();
                let items = items
                    .iter()
                    .map(|item| scalar_to_json(item, &kind))
                    .collect::<CodecResult<Vec<_>>>()?;
                JsonValue::Array(items)
            }
            ProtoValue::Map(entries) if field.is_map() => {
                if entries.is_empty() {
                    continue;
                }
                let value_kind = map_value_field(&field)?.kind();
                let mut rendered = Map::new();
                for (key, value) in entries {
                    rendered.insert(map_key_to_string(key), scalar_to_json(value, &value_kind)?);
                }
                JsonValue::Object(rendered)
            }
            other => {
                if !message.has_field(&field) {
                    continue;
                }
                scalar_to_json(other, &field.kind())?
            }
        };
        object.insert(field.name().to_string(), json);
    }

    Ok(JsonValue::Object(object))
}

fn field_to_proto(json: &JsonValue, field: &FieldDescriptor) -> CodecResult<ProtoValue> {
    if field.is_map() {
        let object = json.as_object().ok_or_else(|| {
            CodecError::Field(format!("{} expects a JSON object", field.name()))
        })?;
        let key_kind = map_key_field(field)?.kind();
        let value_kind = map_value_field(field)?.kind();

        let mut entries = HashMap::with_capacity(object.len());
        for (key, value) in object {
            entries.insert(
                string_to_map_key(key, &key_kind)?,
                scalar_to_proto(value, &value_kind)?,
            );
        }
        return Ok(ProtoValue::Map(entries));
    }

    if field.is_list() {
        let items = json.as_array().ok_or_else(|| {
            CodecError::Field(format!("{} expects a JSON array", field.name()))
        })?;
        let kind = field.kind();
        let items = items
            .iter()
            .map(|item| scalar_to_proto(item, &kind))
            .collect::<CodecResult<Vec<_>>>()?;
        return Ok(ProtoValue::List(items));
    }

    scalar_to_proto(json, &field.kind())
}

fn scalar_to_proto(json: &JsonValue, kind: &Kind) -> CodecResult<ProtoValue> {
    match kind {
        Kind::Double => Ok(ProtoValue::F64(expect_f64(json, "double")?)),
        Kind::Float => Ok(ProtoValue::F32(expect_f64(json, "float")? as f32)),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Ok(ProtoValue::I64(expect_i64(json)?)),
        Kind::Uint64 | Kind::Fixed64 => Ok(ProtoValue::U64(expect_u64(json)?)),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            let v = expect_i64(json)?;
            let v32 = i32::try_from(v)
                .map_err(|_| CodecError::Field(format!("Value {} out of i32 range", v)))?;
            Ok(ProtoValue::I32(v32))
        }
        Kind::Uint32 | Kind::Fixed32 => {
            let v = expect_u64(json)?;
            let v32 = u32::try_from(v)
                .map_err(|_| CodecError::Field(format!("Value {} out of u32 range", v)))?;
            Ok(ProtoValue::U32(v32))
        }
        Kind::Bool => json
            .as_bool()
            .map(ProtoValue::Bool)
            .ok_or_else(|| CodecError::Field("Expected bool".to_string())),
        Kind::String => json
            .as_str()
            .map(|s| ProtoValue::String(s.to_string()))
            .ok_or_else(|| CodecError::Field("Expected string".to_string())),
        Kind::Bytes => {
            let encoded = json
                .as_str()
                .ok_or_else(|| CodecError::Field("Expected base64 string".to_string()))?;
            let bytes = BASE64
                .decode(encoded)
                .map_err(|e| CodecError::Field(format!("Invalid base64: {}", e)))?;
            Ok(ProtoValue::Bytes(Bytes::from(bytes)))
        }
        Kind::Enum(enum_desc) => {
            if let Some(name) = json.as_str() {
                let value = enum_desc
                    .get_value_by_name(name)
                    .ok_or_else(|| CodecError::Field(format!("Unknown enum value: {}", name)))?;
                Ok(ProtoValue::EnumNumber(value.number()))
            } else if let Some(n) = json.as_i64() {
                let number = i32::try_from(n)
                    .map_err(|_| CodecError::Field(format!("Enum value {} out of i32 range", n)))?;
                Ok(ProtoValue::EnumNumber(number))
            } else {
                Err(CodecError::Field("Expected enum name or number".to_string()))
            }
        }
        Kind::Message(nested) => Ok(ProtoValue::Message(to_dynamic_message(nested, json)?)),
    }
}

fn scalar_to_json(value: &ProtoValue, kind: &Kind) -> CodecResult<JsonValue> {
    let json = match value {
        ProtoValue::Bool(v) => JsonValue::Bool(*v),
        ProtoValue::I32(v) => JsonValue::from(*v),
        ProtoValue::I64(v) => JsonValue::from(*v),
        ProtoValue::U32(v) => JsonValue::from(*v),
        ProtoValue::U64(v) => {
            if *v > i64::MAX as u64 {
                JsonValue::String(v.to_string())
            } else {
                JsonValue::from(*v)
            }
        }
        ProtoValue::F32(v) => float_to_json(*v as f64),
        ProtoValue::F64(v) => float_to_json(*v),
        ProtoValue::String(v) => JsonValue::String(v.clone()),
        ProtoValue::Bytes(v) => JsonValue::String(BASE64.encode(v)),
        ProtoValue::EnumNumber(v) => match kind {
            Kind::Enum(enum_desc) => match enum_desc.get_value(*v) {
                Some(value) => JsonValue::String(value.name().to_string()),
                None => JsonValue::from(*v),
            },
            _ => JsonValue::from(*v),
        },
        ProtoValue::Message(m) => message_to_json(m)?,
        ProtoValue::List(_) | ProtoValue::Map(_) => {
            return Err(CodecError::Decode("Nested collection outside of a field".to_string()));
        }
    };
    Ok(json)
}

fn float_to_json(v: f64) -> JsonValue {
    Number::from_f64(v).map(JsonValue::Number).unwrap_or(JsonValue::Null)
}

fn expect_f64(json: &JsonValue, name: &str) -> CodecResult<f64> {
    json.as_f64()
        .ok_or_else(|| CodecError::Field(format!("Expected {}", name)))
}

fn expect_i64(json: &JsonValue) -> CodecResult<i64> {
    match json {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| CodecError::Field(format!("Expected signed integer, got {}", json)))
}

fn expect_u64(json: &JsonValue) -> CodecResult<u64> {
    match json {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| CodecError::Field(format!("Expected unsigned integer, got {}", json)))
}

fn map_entry(field: &FieldDescriptor) -> CodecResult<MessageDescriptor> {
    match field.kind() {
        Kind::Message(entry) if entry.is_map_entry() => Ok(entry),
        _ => Err(CodecError::Field(format!("{} is not a map field", field.name()))),
    }
}

fn map_key_field(field: &FieldDescriptor) -> CodecResult<FieldDescriptor> {
    Ok(map_entry(field)?.map_entry_key_field())
}

fn map_value_field(field: &FieldDescriptor) -> CodecResult<FieldDescriptor> {
    Ok(map_entry(field)?.map_entry_value_field())
}

fn string_to_map_key(key: &str, kind: &Kind) -> CodecResult<MapKey> {
    let invalid = || CodecError::Field(format!("Invalid map key {:?}", key));
    let map_key = match kind {
        Kind::Bool => MapKey::Bool(key.parse().map_err(|_| invalid())?),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => MapKey::I32(key.parse().map_err(|_| invalid())?),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => MapKey::I64(key.parse().map_err(|_| invalid())?),
        Kind::Uint32 | Kind::Fixed32 => MapKey::U32(key.parse().map_err(|_| invalid())?),
        Kind::Uint64 | Kind::Fixed64 => MapKey::U64(key.parse().map_err(|_| invalid())?),
        Kind::String => MapKey::String(key.to_string()),
        _ => return Err(invalid()),
    };
    Ok(map_key)
}

fn map_key_to_string(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::I32(i) => i.to_string(),
        MapKey::I64(i) => i.to_string(),
        MapKey::U32(u) => u.to_string(),
        MapKey::U64(u) => u.to_string(),
        MapKey::String(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::proto_text::ProtoTextBackend;
    use crate::codec::CodecBackend;
    use serde_json::json;

    const SCHEMA: &str = r#"
        syntax = "proto3";
        package game;

        enum Color {
            RED = 0;
            GREEN = 1;
            BLUE = 2;
        }

        message area_enter {
            message Position {
                sint32 x = 1;
                sint32 y = 2;
            }
            string player = 1;
            Position at = 2;
            repeated uint32 items = 3;
            map<string, int64> scores = 4;
            bytes token = 5;
            Color color = 6;
            uint64 big = 7;
            double speed = 8;
            repeated Position path = 9;
        }
    "#;

    fn descriptor() -> MessageDescriptor {
        ProtoTextBackend::from_text(SCHEMA.as_bytes())
            .unwrap()
            .lookup("area.enter")
            .unwrap()
    }

    #[test]
    fn test_full_message_round_trip() {
        let desc = descriptor();
        let message = json!({
            "player": "ana",
            "at": { "x": -3, "y": 12 },
            "items": [1, 2, 3],
            "scores": { "round1": 10, "round2": -4 },
            "token": "AAEC",
            "color": "BLUE",
            "big": "18446744073709551615",
            "speed": 1.5,
            "path": [{ "x": 1, "y": 1 }, { "x": 2, "y": 4 }]
        });

        let bytes = encode_message(&desc, &message).unwrap();
        assert_eq!(decode_message(&desc, &bytes).unwrap(), message);
    }

    #[test]
    fn test_enum_accepts_numbers() {
        let desc = descriptor();
        let bytes = encode_message(&desc, &json!({ "color": 1 })).unwrap();
        assert_eq!(decode_message(&desc, &bytes).unwrap(), json!({ "color": "GREEN" }));
    }

    #[test]
    fn test_defaults_and_unknown_keys_are_dropped() {
        let desc = descriptor();
        let bytes = encode_message(&desc, &json!({ "player": "", "bogus": true, "speed": null })).unwrap();
        assert_eq!(decode_message(&desc, &bytes).unwrap(), json!({}));
    }

    #[test]
    fn test_type_mismatch_is_a_field_error() {
        let desc = descriptor();
        let err = encode_message(&desc, &json!({ "items": 5 })).unwrap_err();
        assert!(matches!(err, CodecError::Field(_)));

        let err = encode_message(&desc, &json!({ "at": { "x": 1u64 << 40 } })).unwrap_err();
        assert!(err.to_string().contains("out of i32 range"));
    }

    #[test]
    fn test_non_object_is_rejected() {
        let err = encode_message(&descriptor(), &json!("hello")).unwrap_err();
        assert!(matches!(err, CodecError::Encode(_)));
    }

    #[test]
    fn test_required_fields_are_enforced() {
        let backend = crate::codec::TypeMapBackend::from_json(
            br#"{
                "chat.send": {
                    "message Mention": { "required string user": 1 },
                    "required string text": 1,
                    "optional uInt32 room": 2,
                    "repeated Mention mentions": 3
                }
            }"#,
        )
        .unwrap();
        let desc = backend.lookup("chat.send").unwrap();

        let err = encode_message(&desc, &json!({ "room": 3 })).unwrap_err();
        assert!(matches!(err, CodecError::Encode(ref m) if m.contains("chat_send.text")));

        let err = encode_message(&desc, &json!({ "text": "hi", "mentions": [{}] })).unwrap_err();
        assert!(matches!(err, CodecError::Encode(ref m) if m.contains("Mention.user")));

        let err = decode_message(&desc, &[]).unwrap_err();
        assert!(matches!(err, CodecError::Decode(ref m) if m.contains("chat_send.text")));

        // room = 3 only, no text.
        let err = decode_message(&desc, &[0x10, 0x03]).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));

        let message = json!({ "text": "hi", "mentions": [{ "user": "bo" }] });
        let bytes = encode_message(&desc, &message).unwrap();
        assert_eq!(decode_message(&desc, &bytes).unwrap(), message);
    }

    #[test]
    fn test_unset_optional_submessage_skips_its_required_fields() {
        let backend = crate::codec::TypeMapBackend::from_json(
            br#"{
                "area.onMove": {
                    "message Point": { "required sInt32 x": 1 },
                    "optional Point to": 1
                }
            }"#,
        )
        .unwrap();
        let desc = backend.lookup("area.onMove").unwrap();
        let bytes = encode_message(&desc, &json!({})).unwrap();
        assert_eq!(decode_message(&desc, &bytes).unwrap(), json!({}));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let err = decode_message(&descriptor(), &[0x0a, 0xff]).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
