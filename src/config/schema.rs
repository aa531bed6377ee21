//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML and every
//! field has a default, so an empty file is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::SchemaFormat;
use crate::schema::Direction;

/// Root configuration for the registry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory that relative schema paths resolve against.
    pub base_dir: PathBuf,

    /// Schema for messages this process sends.
    pub outbound_schema_path: PathBuf,

    /// Schema for messages this process receives.
    pub inbound_schema_path: PathBuf,

    /// Reload a direction when its schema file changes.
    pub watch_for_changes: bool,

    /// Format of both schema files.
    pub schema_format: SchemaFormat,

    /// File watcher settings.
    pub watch: WatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            outbound_schema_path: PathBuf::from("config/serverProtos.desc"),
            inbound_schema_path: PathBuf::from("config/clientProtos.desc"),
            watch_for_changes: false,
            schema_format: SchemaFormat::default(),
            watch: WatchConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Configuration rooted at `base_dir` with the given schema files.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        outbound_schema_path: impl Into<PathBuf>,
        inbound_schema_path: impl Into<PathBuf>,
        schema_format: SchemaFormat,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            outbound_schema_path: outbound_schema_path.into(),
            inbound_schema_path: inbound_schema_path.into(),
            schema_format,
            ..Default::default()
        }
    }

    /// Resolved schema path for a direction.
    pub fn schema_path(&self, direction: Direction) -> PathBuf {
        let path = match direction {
            Direction::Outbound => &self.outbound_schema_path,
            Direction::Inbound => &self.inbound_schema_path,
        };
        if path.is_absolute() {
            path.clone()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// File watcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Poll interval for backends that fall back to polling, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: RegistryConfig = toml::from_str("").unwrap();
        assert_eq!(config.schema_format, SchemaFormat::BinaryDescriptor);
        assert!(!config.watch_for_changes);
        assert_eq!(config.watch.poll_interval(), Duration::from_secs(2));
        assert_eq!(
            config.schema_path(Direction::Outbound),
            PathBuf::from("./config/serverProtos.desc")
        );
    }

    #[test]
    fn test_absolute_paths_ignore_base_dir() {
        let config = RegistryConfig::new("/srv/app", "/etc/protos/out.json", "in.json", SchemaFormat::GeneratedMap);
        assert_eq!(config.schema_path(Direction::Outbound), PathBuf::from("/etc/protos/out.json"));
        assert_eq!(config.schema_path(Direction::Inbound), PathBuf::from("/srv/app/in.json"));
    }

    #[test]
    fn test_full_document() {
        let config: RegistryConfig = toml::from_str(
            r#"
            base_dir = "/opt/game"
            outbound_schema_path = "protos/server.proto"
            inbound_schema_path = "protos/client.proto"
            watch_for_changes = true
            schema_format = "text-schema"

            [watch]
            poll_interval_ms = 500

            [observability]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert!(config.watch_for_changes);
        assert_eq!(config.schema_format, SchemaFormat::TextSchema);
        assert_eq!(config.watch.poll_interval_ms, 500);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.schema_path(Direction::Inbound), PathBuf::from("/opt/game/protos/client.proto"));
    }
}
