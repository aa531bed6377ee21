//! Serializable view of the loaded schema material.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::codec::SchemaFormat;
use crate::schema::SchemaSnapshot;

/// One direction's raw schema, as handed to peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtoBundle {
    pub format: SchemaFormat,
    /// Raw schema material, base64.
    pub desc: String,
    /// File mtime in milliseconds.
    pub version: u64,
}

impl ProtoBundle {
    pub fn from_snapshot(snapshot: &SchemaSnapshot) -> Self {
        Self {
            format: snapshot.format(),
            desc: STANDARD.encode(snapshot.material()),
            version: snapshot.mtime_ms(),
        }
    }

    /// Decoded schema material.
    pub fn material(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.desc)
    }
}

/// Both directions plus the registry version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protos {
    pub outbound: Option<ProtoBundle>,
    pub inbound: Option<ProtoBundle>,
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Direction;

    #[test]
    fn test_bundle_keeps_material() {
        let snapshot = SchemaSnapshot::new(
            Direction::Outbound,
            "server.json",
            SchemaFormat::GeneratedMap,
            b"{\"chat.send\":{}}".to_vec(),
            42,
        );
        let bundle = ProtoBundle::from_snapshot(&snapshot);
        assert_eq!(bundle.format, SchemaFormat::GeneratedMap);
        assert_eq!(bundle.version, 42);
        assert_eq!(bundle.material().unwrap(), snapshot.material());
    }

    #[test]
    fn test_protos_json_shape() {
        let protos = Protos {
            outbound: None,
            inbound: Some(ProtoBundle {
                format: SchemaFormat::TextSchema,
                desc: "AA==".to_string(),
                version: 7,
            }),
            version: 7,
        };
        let value = serde_json::to_value(&protos).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "outbound": null,
                "inbound": {"format": "text-schema", "desc": "AA==", "version": 7},
                "version": 7
            })
        );
    }
}
