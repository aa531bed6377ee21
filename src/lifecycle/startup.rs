//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and, when enabled, the metrics endpoint
//! - Start the registry

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::loader::{load_config, ConfigError};
use crate::config::RegistryConfig;
use crate::observability::{logging, metrics};
use crate::registry::{Registry, RegistryError};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Load the config (defaults when no path is given), set up observability and
/// start a registry.
pub async fn bootstrap(config_path: Option<&Path>) -> Result<Registry, StartupError> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => RegistryConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        format = %config.schema_format,
        outbound = ?config.schema_path(crate::schema::Direction::Outbound),
        inbound = ?config.schema_path(crate::schema::Direction::Inbound),
        watch = config.watch_for_changes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = Registry::new(config);
    registry.start().await?;
    Ok(registry)
}
