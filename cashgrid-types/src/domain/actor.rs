//! Request-scoped identity: who is calling, and what they may do.
//!
//! Authentication lives outside the core; every operation receives the
//! already-authenticated actor explicitly. Role branching happens exactly
//! once, at the engine boundary, through [`Role::can`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an actor (a user of the external identity service).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ActorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Role assigned by the external identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Maker,
    Checker,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Maker => write!(f, "MAKER"),
            Role::Checker => write!(f, "CHECKER"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MAKER" => Ok(Role::Maker),
            "CHECKER" => Ok(Role::Checker),
            "ADMIN" => Ok(Role::Admin),
            other => Err(crate::error::DomainError::Validation(format!(
                "Unknown role: {other}"
            ))),
        }
    }
}

/// Capabilities required by engine operations.
///
/// Each operation declares the capability it needs; the actor's role is
/// checked against it once per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreatePayment,
    DecidePayment,
    ManageAccounts,
    ManageLimits,
    ViewAudit,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::CreatePayment => "CREATE_PAYMENT",
            Capability::DecidePayment => "DECIDE_PAYMENT",
            Capability::ManageAccounts => "MANAGE_ACCOUNTS",
            Capability::ManageLimits => "MANAGE_LIMITS",
            Capability::ViewAudit => "VIEW_AUDIT",
        };
        write!(f, "{name}")
    }
}

impl Role {
    /// Returns true if the role carries the given capability.
    pub fn can(&self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::Admin, _) => true,
            (Role::Maker, Capability::CreatePayment) => true,
            (Role::Checker, Capability::DecidePayment) => true,
            _ => false,
        }
    }
}

/// The authenticated caller of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: ActorId, role: Role) -> Self {
        Self { id, role }
    }
}

/// Per-request context threaded through every engine operation.
///
/// The correlation id links all audit entries produced by one logical
/// request; it is supplied or generated at the transport edge.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: Actor,
    pub correlation_id: String,
}

impl RequestContext {
    pub fn new(actor: Actor, correlation_id: impl Into<String>) -> Self {
        Self {
            actor,
            correlation_id: correlation_id.into(),
        }
    }
}
