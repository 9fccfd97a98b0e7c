//! Payment domain model and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountId;
use super::actor::{ActorId, Role};
use super::money::Money;
use crate::error::DomainError;

/// Unique identifier for a Payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random PaymentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a PaymentId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PaymentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle status of a payment.
///
/// ```text
/// PENDING ──► APPROVED ──► COMPLETED
///    │            └──────► FAILED
///    └──────► REJECTED
/// ```
///
/// REJECTED, COMPLETED and FAILED are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// Returns true if the transition `self -> target` is allowed.
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Completed) | (Approved, Failed)
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Rejected | PaymentStatus::Completed | PaymentStatus::Failed
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Approved => "APPROVED",
            PaymentStatus::Rejected => "REJECTED",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "APPROVED" => Ok(PaymentStatus::Approved),
            "REJECTED" => Ok(PaymentStatus::Rejected),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::Validation(format!(
                "Unknown payment status: {other}"
            ))),
        }
    }
}

/// A maker-checker payment request.
///
/// Created PENDING by a maker, decided by a different checker, and executed
/// against the ledger on approval. The idempotency key maps to exactly one
/// payment for its whole lifetime; the fingerprint is a hash of the creation
/// payload used to distinguish a safe retry from a conflicting reuse of the
/// same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// Client-supplied at-most-once token, unique across all payments
    pub idempotency_key: String,
    /// Hash of the canonical creation payload for replay detection
    #[serde(skip_serializing)]
    pub fingerprint: String,
    pub source_account_id: AccountId,
    pub target_account_id: AccountId,
    pub amount: Money,
    pub description: Option<String>,
    pub status: PaymentStatus,
    /// The maker
    pub created_by: ActorId,
    /// Maker's role at creation time, used for limit re-validation at approval
    pub created_by_role: Role,
    /// The checker, set on approval or rejection
    pub approved_by: Option<ActorId>,
    /// Required iff status is REJECTED
    pub rejection_reason: Option<String>,
    /// Set iff status is FAILED
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new PENDING payment.
    ///
    /// # Validation
    /// - idempotency key must be non-blank
    /// - amount must be strictly positive (enforced by the `Money` argument
    ///   being constructed through [`Money::positive`])
    /// - source and target accounts must differ
    pub fn new(
        idempotency_key: String,
        fingerprint: String,
        source_account_id: AccountId,
        target_account_id: AccountId,
        amount: Money,
        description: Option<String>,
        maker: ActorId,
        maker_role: Role,
    ) -> Result<Self, DomainError> {
        if idempotency_key.trim().is_empty() {
            return Err(DomainError::Validation(
                "Idempotency key cannot be empty".into(),
            ));
        }
        if amount.amount() <= 0 {
            return Err(DomainError::InvalidAmount(amount.amount()));
        }
        if source_account_id == target_account_id {
            return Err(DomainError::SameAccount);
        }

        let now = Utc::now();
        Ok(Self {
            id: PaymentId::new(),
            idempotency_key,
            fingerprint,
            source_account_id,
            target_account_id,
            amount,
            description,
            status: PaymentStatus::Pending,
            created_by: maker,
            created_by_role: maker_role,
            approved_by: None,
            rejection_reason: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstructs a payment from storage fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: PaymentId,
        idempotency_key: String,
        fingerprint: String,
        source_account_id: AccountId,
        target_account_id: AccountId,
        amount: Money,
        description: Option<String>,
        status: PaymentStatus,
        created_by: ActorId,
        created_by_role: Role,
        approved_by: Option<ActorId>,
        rejection_reason: Option<String>,
        failure_reason: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            idempotency_key,
            fingerprint,
            source_account_id,
            target_account_id,
            amount,
            description,
            status,
            created_by,
            created_by_role,
            approved_by,
            rejection_reason,
            failure_reason,
            created_at,
            updated_at,
        }
    }
}
