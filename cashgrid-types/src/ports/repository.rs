//! Repository port trait.
//!
//! This is the primary port in our hexagonal architecture. Adapters (SQLite,
//! in-memory test doubles) implement this trait.
//!
//! The contract encodes the concurrency model of the core:
//! - payment inserts rely on a unique constraint over the idempotency key,
//!   so two racing submissions with the same key cannot both land;
//! - status transitions are compare-and-set on the current status, so of two
//!   racing approve/reject calls exactly one wins;
//! - `settle_payment` applies the debit, the credit, the COMPLETED
//!   transition and the audit entry as ONE atomic unit, with optimistic
//!   version checks on both accounts;
//! - every mutating operation that takes an [`AuditLog`] must commit it in
//!   the same storage transaction as the mutation, or fail the whole
//!   operation. Audit completeness is a compliance requirement, not
//!   best-effort telemetry.

use chrono::{DateTime, Utc};

use crate::domain::{
    Account, AccountId, ActorId, AuditLog, Currency, Iban, Limit, LimitId, Payment, PaymentId,
    Role,
};
use crate::dto::{AuditFilter, Page, PageRequest, PaymentFilter, UpdateLimitRequest};
use crate::error::RepoError;

/// Outcome of a successful ledger settlement.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// The payment, now COMPLETED
    pub payment: Payment,
    /// Source balance after the debit, minor units
    pub source_balance: i64,
    /// Target balance after the credit, minor units
    pub target_balance: i64,
}

/// The main repository port for the payment authorization core.
#[async_trait::async_trait]
pub trait PaymentRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────
    // Account operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persists a new account together with its audit entry.
    /// Fails with `Conflict` when the IBAN is already taken.
    async fn create_account(&self, account: &Account, audit: AuditLog) -> Result<(), RepoError>;

    /// Gets an account by ID.
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepoError>;

    /// Gets an account by its IBAN.
    async fn find_account_by_iban(&self, iban: &Iban) -> Result<Option<Account>, RepoError>;

    /// Lists all accounts, newest first.
    async fn list_accounts(&self) -> Result<Vec<Account>, RepoError>;

    /// Marks an account inactive. Returns the updated account or `NotFound`.
    async fn deactivate_account(
        &self,
        id: AccountId,
        audit: AuditLog,
    ) -> Result<Account, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Payment operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Inserts a PENDING payment together with its PAYMENT_CREATED audit
    /// entry, atomically. Fails with `Conflict` when the idempotency key is
    /// already present (the caller re-fetches and compares fingerprints).
    async fn insert_payment(&self, payment: &Payment, audit: AuditLog) -> Result<(), RepoError>;

    /// Finds a payment by its idempotency key.
    async fn find_payment_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Payment>, RepoError>;

    /// Gets a payment by ID.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError>;

    /// Lists payments matching the filter, newest first, paginated.
    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, RepoError>;

    /// Compare-and-set PENDING -> APPROVED, recording the checker, plus the
    /// audit entry, atomically. Fails with `Conflict` when the payment is no
    /// longer PENDING and `NotFound` when it does not exist.
    async fn mark_approved(
        &self,
        id: PaymentId,
        checker: ActorId,
        audit: AuditLog,
    ) -> Result<Payment, RepoError>;

    /// Compare-and-set PENDING -> REJECTED with the mandatory reason, plus
    /// the audit entry, atomically. Same failure modes as `mark_approved`.
    async fn mark_rejected(
        &self,
        id: PaymentId,
        checker: ActorId,
        reason: &str,
        audit: AuditLog,
    ) -> Result<Payment, RepoError>;

    /// Executes the ledger movement for an APPROVED payment: debit source,
    /// credit target (both version-checked), transition APPROVED ->
    /// COMPLETED and append the audit entry - all in one storage
    /// transaction. Ledger failures surface as `RepoError::Ledger` and leave
    /// every row untouched.
    async fn settle_payment(
        &self,
        payment: &Payment,
        audit: AuditLog,
    ) -> Result<Settlement, RepoError>;

    /// Compare-and-set APPROVED -> FAILED with the failure cause, plus the
    /// audit entry, atomically.
    async fn mark_failed(
        &self,
        id: PaymentId,
        cause: &str,
        audit: AuditLog,
    ) -> Result<Payment, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Limit operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persists a new limit with its audit entry. Fails with `Conflict` when
    /// a limit for the (role, currency) pair already exists.
    async fn create_limit(&self, limit: &Limit, audit: AuditLog) -> Result<(), RepoError>;

    /// Applies a partial update to a limit's ceilings.
    async fn update_limit(
        &self,
        id: LimitId,
        changes: &UpdateLimitRequest,
        audit: AuditLog,
    ) -> Result<Limit, RepoError>;

    /// Finds the active limit for a (role, currency) pair, if any.
    async fn find_active_limit(
        &self,
        role: Role,
        currency: Currency,
    ) -> Result<Option<Limit>, RepoError>;

    /// Lists all limits.
    async fn list_limits(&self) -> Result<Vec<Limit>, RepoError>;

    /// Sums the maker's APPROVED + COMPLETED payment amounts in `currency`
    /// since the given instant. Read fresh on every limit check - never
    /// cached.
    async fn sum_spent_since(
        &self,
        maker: ActorId,
        currency: Currency,
        since: DateTime<Utc>,
    ) -> Result<i64, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Audit operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a standalone audit entry (used when the entry is not tied to
    /// another row mutation).
    async fn append_audit(&self, entry: &AuditLog) -> Result<(), RepoError>;

    /// Searches the audit trail, newest first, paginated. There is no update
    /// or delete counterpart by design.
    async fn search_audit_logs(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, RepoError>;
}
