//! Shared utilities for registry integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use prost::Message;
use tempfile::TempDir;

use proto_registry::codec::proto_text;
use proto_registry::{RegistryConfig, SchemaFormat};

pub const OUTBOUND_FILE: &str = "serverProtos";
pub const INBOUND_FILE: &str = "clientProtos";

/// Chat schema in `.proto` text form.
pub const CHAT_PROTO: &str = r#"
syntax = "proto3";

message chat_send {
    string text = 1;
    uint32 room = 2;
}

message chat_leave {
    uint32 room = 1;
}
"#;

/// The same chat schema, extended with a field and a route.
pub const CHAT_PROTO_V2: &str = r#"
syntax = "proto3";

message chat_send {
    string text = 1;
    uint32 room = 2;
    repeated string mentions = 3;
}

message chat_leave {
    uint32 room = 1;
}

message chat_typing {
    bool active = 1;
}
"#;

/// Chat schema in the generated type map form.
pub const CHAT_TYPE_MAP: &str = r#"{
    "chat.send": { "required string text": 1, "optional uInt32 room": 2 },
    "chat.leave": { "required uInt32 room": 1 }
}"#;

/// Serialized `FileDescriptorSet` for schema text.
pub fn descriptor_set(text: &str) -> Vec<u8> {
    let file = proto_text::compile(text).expect("schema compiles");
    prost_types::FileDescriptorSet { file: vec![file] }.encode_to_vec()
}

/// Chat schema material for a format.
pub fn chat_material(format: SchemaFormat) -> Vec<u8> {
    match format {
        SchemaFormat::BinaryDescriptor => descriptor_set(CHAT_PROTO),
        SchemaFormat::GeneratedMap => CHAT_TYPE_MAP.as_bytes().to_vec(),
        SchemaFormat::TextSchema => CHAT_PROTO.as_bytes().to_vec(),
    }
}

/// A temporary directory holding both schema files.
pub struct SchemaDir {
    dir: TempDir,
    format: SchemaFormat,
}

impl SchemaDir {
    pub fn new(format: SchemaFormat) -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn outbound_path(&self) -> PathBuf {
        self.dir.path().join(OUTBOUND_FILE)
    }

    pub fn inbound_path(&self) -> PathBuf {
        self.dir.path().join(INBOUND_FILE)
    }

    pub fn write_outbound(&self, material: &[u8]) {
        fs::write(self.outbound_path(), material).expect("write outbound schema");
    }

    pub fn write_inbound(&self, material: &[u8]) {
        fs::write(self.inbound_path(), material).expect("write inbound schema");
    }

    /// Registry config over this directory, watching disabled.
    pub fn config(&self) -> RegistryConfig {
        RegistryConfig::new(self.dir.path(), OUTBOUND_FILE, INBOUND_FILE, self.format)
    }

    /// Registry config over this directory with a fast-polling watcher.
    pub fn watched_config(&self) -> RegistryConfig {
        let mut config = self.config();
        config.watch_for_changes = true;
        config.watch.poll_interval_ms = 50;
        config
    }
}

/// Set a file's modification time to `ms` milliseconds after the epoch.
pub fn set_mtime(path: &Path, ms: u64) {
    let file = File::options().write(true).open(path).expect("open for mtime");
    file.set_modified(UNIX_EPOCH + Duration::from_millis(ms))
        .expect("set mtime");
}

/// Current wall clock in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Poll `condition` every 25ms until it holds or `timeout` passes.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
