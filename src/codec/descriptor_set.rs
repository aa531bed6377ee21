//! Precompiled descriptor set backend.
//!
//! Material is a serialized `FileDescriptorSet`, typically produced with
//! `protoc --include_imports --descriptor_set_out`. A route is tried as a
//! full message name, then with dots replaced by underscores.

use prost_reflect::{DescriptorPool, MessageDescriptor};

use crate::codec::{normalize_route, CodecBackend, CodecError, CodecResult, SchemaFormat};

#[derive(Debug, Clone)]
pub struct DescriptorSetBackend {
    pool: DescriptorPool,
}

impl DescriptorSetBackend {
    /// Decode the descriptor set; fails when the bytes do not parse or the
    /// files do not link.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let pool = DescriptorPool::decode(bytes).map_err(|e| CodecError::Descriptor(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    fn top_level_messages(&self) -> impl Iterator<Item = MessageDescriptor> + '_ {
        self.pool
            .all_messages()
            .filter(|m| m.parent_message().is_none() && !m.is_map_entry())
    }
}

impl CodecBackend for DescriptorSetBackend {
    fn format(&self) -> SchemaFormat {
        SchemaFormat::BinaryDescriptor
    }

    /// Exact full name first, then the normalized name, then a top-level
    /// message of that name in any package.
    fn lookup(&self, route: &str) -> Option<MessageDescriptor> {
        if let Some(message) = self.pool.get_message_by_name(route) {
            return Some(message);
        }
        let name = normalize_route(route);
        self.pool
            .get_message_by_name(&name)
            .or_else(|| self.top_level_messages().find(|m| m.name() == name))
    }

    fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self.top_level_messages().map(|m| m.name().to_string()).collect();
        routes.sort();
        routes.dedup();
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::proto_text;
    use prost::Message;
    use serde_json::json;

    fn descriptor_set(text: &str) -> Vec<u8> {
        let file = proto_text::compile(text).unwrap();
        prost_types::FileDescriptorSet { file: vec![file] }.encode_to_vec()
    }

    #[test]
    fn test_lookup_by_normalized_name() {
        let bytes = descriptor_set(
            r#"
            syntax = "proto2";
            package protos;
            message connector_entryHandler_entry {
                optional string uid = 1;
            }
            "#,
        );
        let backend = DescriptorSetBackend::from_bytes(&bytes).unwrap();

        let desc = backend.lookup("connector.entryHandler.entry").unwrap();
        assert_eq!(desc.full_name(), "protos.connector_entryHandler_entry");
        assert!(backend.lookup("protos.connector_entryHandler_entry").is_some());
        assert!(backend.lookup("connector.entryHandler.leave").is_none());
        assert_eq!(backend.routes(), vec!["connector_entryHandler_entry".to_string()]);
    }

    #[test]
    fn test_qualified_names_pick_the_right_package() {
        let lobby = proto_text::compile(
            "syntax = \"proto3\"; package lobby; message chat_send { string text = 1; }",
        )
        .unwrap();
        let mut guild = proto_text::compile(
            "syntax = \"proto3\"; package guild; message chat_send { uint32 room = 1; }",
        )
        .unwrap();
        guild.name = Some("guild.proto".to_string());
        let bytes = prost_types::FileDescriptorSet { file: vec![lobby, guild] }.encode_to_vec();
        let backend = DescriptorSetBackend::from_bytes(&bytes).unwrap();

        let lobby = backend.lookup("lobby.chat_send").unwrap();
        assert_eq!(lobby.full_name(), "lobby.chat_send");
        assert!(lobby.get_field_by_name("text").is_some());

        let guild = backend.lookup("guild.chat_send").unwrap();
        assert_eq!(guild.full_name(), "guild.chat_send");
        assert!(guild.get_field_by_name("room").is_some());
    }

    #[test]
    fn test_encode_decode_through_pool() {
        let bytes = descriptor_set("message chat_send { optional string text = 1; }");
        let backend = DescriptorSetBackend::from_bytes(&bytes).unwrap();
        let desc = backend.lookup("chat.send").unwrap();

        let encoded = backend.encode(&desc, &json!({ "text": "hi" })).unwrap();
        assert_eq!(encoded, vec![0x0a, 0x02, b'h', b'i']);
        assert_eq!(backend.decode(&desc, &encoded).unwrap(), json!({ "text": "hi" }));
    }

    #[test]
    fn test_empty_material_has_no_routes() {
        let backend = DescriptorSetBackend::from_bytes(&[]).unwrap();
        assert!(backend.routes().is_empty());
        assert!(backend.lookup("chat.send").is_none());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = DescriptorSetBackend::from_bytes(b"\xff\xff\xff").unwrap_err();
        assert!(matches!(err, CodecError::Descriptor(_)));
    }
}
