//! Message direction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::registry::RegistryError;

/// Which schema catalog a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Messages this process sends (server-bound).
    Outbound,
    /// Messages this process receives (client-bound).
    Inbound,
}

impl Direction {
    /// Both directions, outbound first.
    pub const ALL: [Direction; 2] = [Direction::Outbound, Direction::Inbound];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }

    /// Tag used by older peers: "server" for outbound, "client" for inbound.
    pub fn legacy_tag(&self) -> &'static str {
        match self {
            Direction::Outbound => "server",
            Direction::Inbound => "client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = RegistryError;

    /// Accepts both the direction names and the legacy tags.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outbound" | "server" => Ok(Direction::Outbound),
            "inbound" | "client" => Ok(Direction::Inbound),
            _ => Err(RegistryError::UnknownDirection(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_legacy_tags() {
        assert_eq!("outbound".parse::<Direction>().unwrap(), Direction::Outbound);
        assert_eq!("server".parse::<Direction>().unwrap(), Direction::Outbound);
        assert_eq!("Inbound".parse::<Direction>().unwrap(), Direction::Inbound);
        assert_eq!(" client ".parse::<Direction>().unwrap(), Direction::Inbound);
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        let err = "sideways".parse::<Direction>().unwrap_err();
        assert!(matches!(err, RegistryError::UnknownDirection(ref tag) if tag == "sideways"));
    }

    #[test]
    fn test_display_round_trips() {
        for direction in Direction::ALL {
            assert_eq!(direction.to_string().parse::<Direction>().unwrap(), direction);
            assert_eq!(direction.legacy_tag().parse::<Direction>().unwrap(), direction);
        }
    }
}
