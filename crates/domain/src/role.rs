//! Operational roles, caller identities and privilege tiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix epoch seconds
pub type Timestamp = u64;

/// The six operational functions that act on turnaround tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    GroundHandling,
    Cleaning,
    Fuel,
    Catering,
    FlightCrew,
    Gate,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::GroundHandling,
        Role::Cleaning,
        Role::Fuel,
        Role::Catering,
        Role::FlightCrew,
        Role::Gate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::GroundHandling => "ground_handling",
            Role::Cleaning => "cleaning",
            Role::Fuel => "fuel",
            Role::Catering => "catering",
            Role::FlightCrew => "flight_crew",
            Role::Gate => "gate",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque caller identity (account, badge number, service principal)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Privilege tiers granted by the provisioning collaborator.
///
/// Administrative privilege provisions roles and privileges. Operational
/// privilege executes and certifies. Neither implies the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    Administrative,
    Operational,
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Privilege::Administrative => f.write_str("administrative"),
            Privilege::Operational => f.write_str("operational"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization_matches_as_str() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn test_identity_is_transparent() {
        let id = Identity::from("gh-lead-17");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"gh-lead-17\"");
        assert_eq!(id.to_string(), "gh-lead-17");
    }
}
