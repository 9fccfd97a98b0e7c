//! Append-only audit trail entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::ActorId;
use crate::error::DomainError;

/// Business actions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    PaymentCreated,
    PaymentApproved,
    PaymentRejected,
    PaymentCompleted,
    PaymentFailed,
    PaymentLimitBreached,
    AccountCreated,
    AccountDeactivated,
    LimitCreated,
    LimitUpdated,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::PaymentCreated => "PAYMENT_CREATED",
            AuditAction::PaymentApproved => "PAYMENT_APPROVED",
            AuditAction::PaymentRejected => "PAYMENT_REJECTED",
            AuditAction::PaymentCompleted => "PAYMENT_COMPLETED",
            AuditAction::PaymentFailed => "PAYMENT_FAILED",
            AuditAction::PaymentLimitBreached => "PAYMENT_LIMIT_BREACHED",
            AuditAction::AccountCreated => "ACCOUNT_CREATED",
            AuditAction::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            AuditAction::LimitCreated => "LIMIT_CREATED",
            AuditAction::LimitUpdated => "LIMIT_UPDATED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AuditAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PAYMENT_CREATED" => Ok(AuditAction::PaymentCreated),
            "PAYMENT_APPROVED" => Ok(AuditAction::PaymentApproved),
            "PAYMENT_REJECTED" => Ok(AuditAction::PaymentRejected),
            "PAYMENT_COMPLETED" => Ok(AuditAction::PaymentCompleted),
            "PAYMENT_FAILED" => Ok(AuditAction::PaymentFailed),
            "PAYMENT_LIMIT_BREACHED" => Ok(AuditAction::PaymentLimitBreached),
            "ACCOUNT_CREATED" => Ok(AuditAction::AccountCreated),
            "ACCOUNT_DEACTIVATED" => Ok(AuditAction::AccountDeactivated),
            "LIMIT_CREATED" => Ok(AuditAction::LimitCreated),
            "LIMIT_UPDATED" => Ok(AuditAction::LimitUpdated),
            other => Err(DomainError::Validation(format!(
                "Unknown audit action: {other}"
            ))),
        }
    }
}

/// One immutable audit entry.
///
/// Entries are inserted in the same storage transaction as the state
/// transition they record and are never updated or deleted afterwards.
/// Other entities reference them only by `entity_id`, never the other way
/// around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    /// Kind of entity the entry is about, e.g. "PAYMENT", "ACCOUNT", "LIMIT"
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub performed_by: ActorId,
    /// Links all entries produced by one logical request
    pub correlation_id: String,
    /// Free-form JSON details blob
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    /// Creates a new audit entry timestamped now.
    pub fn new(
        entity_type: &str,
        entity_id: Uuid,
        action: AuditAction,
        performed_by: ActorId,
        correlation_id: &str,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type: entity_type.to_string(),
            entity_id,
            action,
            performed_by,
            correlation_id: correlation_id.to_string(),
            details,
            created_at: Utc::now(),
        }
    }

    /// Reconstructs an entry from storage fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: Uuid,
        entity_type: String,
        entity_id: Uuid,
        action: AuditAction,
        performed_by: ActorId,
        correlation_id: String,
        details: Option<serde_json::Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            entity_type,
            entity_id,
            action,
            performed_by,
            correlation_id,
            details,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_entry_creation() {
        let entity = Uuid::new_v4();
        let entry = AuditLog::new(
            "PAYMENT",
            entity,
            AuditAction::PaymentCreated,
            ActorId::new(),
            "corr-1",
            Some(serde_json::json!({ "amount": 1000 })),
        );
        assert_eq!(entry.entity_type, "PAYMENT");
        assert_eq!(entry.entity_id, entity);
        assert_eq!(entry.correlation_id, "corr-1");
    }

    #[test]
    fn test_action_round_trip() {
        for action in [
            AuditAction::PaymentCreated,
            AuditAction::PaymentApproved,
            AuditAction::PaymentRejected,
            AuditAction::PaymentCompleted,
            AuditAction::PaymentFailed,
            AuditAction::PaymentLimitBreached,
            AuditAction::AccountCreated,
            AuditAction::AccountDeactivated,
            AuditAction::LimitCreated,
            AuditAction::LimitUpdated,
        ] {
            assert_eq!(action.to_string().parse::<AuditAction>().unwrap(), action);
        }
    }
}
