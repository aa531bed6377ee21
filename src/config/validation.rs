//! Semantic configuration checks that serde cannot express.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RegistryConfig;
use crate::schema::Direction;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} schema path is empty")]
    EmptySchemaPath(Direction),

    #[error("watch.poll_interval_ms must be greater than zero")]
    ZeroPollInterval,

    #[error("unknown log level {0:?}")]
    UnknownLogLevel(String),

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Collect every problem rather than stopping at the first.
pub fn validate_config(config: &RegistryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.outbound_schema_path.as_os_str().is_empty() {
        errors.push(ValidationError::EmptySchemaPath(Direction::Outbound));
    }
    if config.inbound_schema_path.as_os_str().is_empty() {
        errors.push(ValidationError::EmptySchemaPath(Direction::Inbound));
    }
    if config.watch.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
