//! Registry errors, states and reload outcomes.

use std::fmt;

use thiserror::Error;

use crate::codec::CodecError;
use crate::schema::Direction;

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No {0} codec backend is available")]
    BackendUnavailable(Direction),

    #[error("Route {route:?} not found in {direction} schema")]
    RouteNotFound { direction: Direction, route: String },

    #[error("Unknown direction: {0:?}")]
    UnknownDirection(String),

    #[error("Invalid registry state: expected {expected}, found {actual}")]
    InvalidState {
        expected: RegistryState,
        actual: RegistryState,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Lifecycle state of a registry.
///
/// `Reloading` is reported while a reload is in flight and the registry is
/// otherwise `Ready`; lookups keep being served from the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegistryState {
    Uninitialized = 0,
    Starting = 1,
    Ready = 2,
    Reloading = 3,
    Stopped = 4,
}

impl RegistryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryState::Uninitialized => "uninitialized",
            RegistryState::Starting => "starting",
            RegistryState::Ready => "ready",
            RegistryState::Reloading => "reloading",
            RegistryState::Stopped => "stopped",
        }
    }
}

impl From<u8> for RegistryState {
    fn from(value: u8) -> Self {
        match value {
            0 => RegistryState::Uninitialized,
            1 => RegistryState::Starting,
            2 => RegistryState::Ready,
            3 => RegistryState::Reloading,
            _ => RegistryState::Stopped,
        }
    }
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a reload did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new generation is live.
    Swapped { generation: u64, version: u64 },
    /// Loading or compiling failed; the previous generation stays live.
    Kept,
    /// The registry was stopped; nothing was swapped.
    Discarded,
}

impl ReloadOutcome {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadOutcome::Swapped { .. } => "swapped",
            ReloadOutcome::Kept => "kept",
            ReloadOutcome::Discarded => "discarded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            RegistryState::Uninitialized,
            RegistryState::Starting,
            RegistryState::Ready,
            RegistryState::Reloading,
            RegistryState::Stopped,
        ] {
            assert_eq!(RegistryState::from(state as u8), state);
        }
    }

    #[test]
    fn test_error_messages() {
        let err = RegistryError::RouteNotFound {
            direction: Direction::Inbound,
            route: "chat.send".to_string(),
        };
        assert_eq!(err.to_string(), "Route \"chat.send\" not found in inbound schema");

        let err = RegistryError::InvalidState {
            expected: RegistryState::Uninitialized,
            actual: RegistryState::Stopped,
        };
        assert_eq!(err.to_string(), "Invalid registry state: expected uninitialized, found stopped");

        let err = RegistryError::from(CodecError::Encode("bad".to_string()));
        assert_eq!(err.to_string(), "Encode error: bad");
    }
}
