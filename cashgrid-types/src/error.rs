//! Error types for the payment authorization core.
//!
//! Three layers, mapped outward: `DomainError` (business-rule violations on
//! pure types), `RepoError` (storage outcomes, including typed ledger
//! failures), and `AppError` (what the engine returns to callers; maps
//! cleanly to HTTP status codes). Everything here is recoverable to the
//! caller - the core never panics on bad input.

use crate::domain::{AccountId, Capability, Currency, PaymentStatus};

/// Domain-level errors (business logic violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("Invalid IBAN: {0}")]
    InvalidIban(String),

    #[error("Source and target accounts cannot be the same")]
    SameAccount,

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Ledger execution failures. All of them are terminal for the payment
/// being executed - the engine maps them to FAILED, never to a retry.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("Account is inactive: {0}")]
    AccountInactive(AccountId),

    #[error("Concurrent modification of account {0}")]
    VersionConflict(AccountId),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),
}

/// Repository-level errors (data access outcomes).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Unique-constraint or compare-and-set violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

/// Which ceiling a limit breach hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitScope {
    Single,
    Daily,
}

impl std::fmt::Display for LimitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitScope::Single => write!(f, "single"),
            LimitScope::Daily => write!(f, "daily"),
        }
    }
}

/// Application-level errors returned by the engine.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation requires the {required} capability")]
    Forbidden { required: Capability },

    #[error("Maker cannot approve or reject their own payment")]
    SelfApproval,

    #[error("Idempotency key {key} was already used with a different payload")]
    IdempotencyConflict { key: String },

    #[error("Payment is {current}, transition not allowed")]
    InvalidState { current: PaymentStatus },

    #[error("{scope} limit exceeded: limit {limit}, attempted {attempted}")]
    LimitExceeded {
        scope: LimitScope,
        limit: i64,
        attempted: i64,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => AppError::BadRequest(e.to_string()),
            // Ledger failures are handled explicitly by the engine; one
            // escaping this far is a bug in orchestration.
            RepoError::Ledger(e) => AppError::Internal(e.to_string()),
            RepoError::Conflict(msg) => AppError::BadRequest(msg),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(_) | RepoError::Transaction(_) => {
                AppError::Internal("Storage failure".into())
            }
        }
    }
}
