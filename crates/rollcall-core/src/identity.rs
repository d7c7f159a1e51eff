//! Participant roles and the identity bound to a connection.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// What a participant is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Opens, marks, summarizes and finishes sessions.
    Teacher,
    /// Receives its own status and queries it.
    Student,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Teacher => write!(f, "teacher"),
            Self::Student => write!(f, "student"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teacher" => Ok(Self::Teacher),
            "student" => Ok(Self::Student),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Verified `{id, role}` established once at handshake.
///
/// Immutable for the lifetime of the connection it is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// The participant's user id.
    pub id: UserId,
    /// The participant's role.
    pub role: Role,
}

impl Identity {
    /// Build an identity.
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Whether this identity is a teacher.
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }
}
