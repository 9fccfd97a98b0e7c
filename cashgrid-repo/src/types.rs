//! Database row structs and conversions to domain types.
//!
//! SQLite stores UUIDs and timestamps as TEXT; all parsing back into domain
//! types happens here so the adapter itself stays mostly SQL.

use sqlx::FromRow;

use cashgrid_types::{
    Account, AccountId, ActorId, AuditAction, AuditLog, Currency, Iban, Limit, LimitId, Money,
    Payment, PaymentId, PaymentStatus, RepoError, Role,
};

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn parse_uuid(s: &str) -> Result<uuid::Uuid, RepoError> {
    uuid::Uuid::parse_str(s).map_err(|e| RepoError::Database(e.to_string()))
}

pub(crate) fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, RepoError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| RepoError::Database(e.to_string()))
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

pub(crate) fn parse_currency(s: &str) -> Result<Currency, RepoError> {
    s.parse()
        .map_err(|_| RepoError::Database(format!("Unknown currency: {s}")))
}

pub(crate) fn parse_role(s: &str) -> Result<Role, RepoError> {
    s.parse()
        .map_err(|_| RepoError::Database(format!("Unknown role: {s}")))
}

pub(crate) fn parse_status(s: &str) -> Result<PaymentStatus, RepoError> {
    s.parse()
        .map_err(|_| RepoError::Database(format!("Unknown payment status: {s}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Row structs
// ─────────────────────────────────────────────────────────────────────────────

/// Account row from the database.
#[derive(FromRow)]
pub struct DbAccount {
    pub id: String,
    pub iban: String,
    pub owner: String,
    pub balance: i64,
    pub currency: String,
    pub is_active: i64,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl DbAccount {
    pub fn into_domain(self) -> Result<Account, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let balance = Money::new(self.balance, currency).map_err(RepoError::Domain)?;
        let iban = Iban::parse(&self.iban).map_err(RepoError::Domain)?;

        Ok(Account::from_parts(
            AccountId::from_uuid(parse_uuid(&self.id)?),
            iban,
            self.owner,
            balance,
            self.is_active != 0,
            self.version,
            parse_timestamp(&self.created_at)?,
            parse_timestamp(&self.updated_at)?,
        ))
    }
}

/// Payment row from the database.
#[derive(FromRow)]
pub struct DbPayment {
    pub id: String,
    pub idempotency_key: String,
    pub fingerprint: String,
    pub source_account_id: String,
    pub target_account_id: String,
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub status: String,
    pub created_by: String,
    pub created_by_role: String,
    pub approved_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DbPayment {
    pub fn into_domain(self) -> Result<Payment, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let amount = Money::new(self.amount, currency).map_err(RepoError::Domain)?;

        let approved_by = self
            .approved_by
            .as_deref()
            .map(parse_uuid)
            .transpose()?
            .map(ActorId::from_uuid);

        Ok(Payment::from_parts(
            PaymentId::from_uuid(parse_uuid(&self.id)?),
            self.idempotency_key,
            self.fingerprint,
            AccountId::from_uuid(parse_uuid(&self.source_account_id)?),
            AccountId::from_uuid(parse_uuid(&self.target_account_id)?),
            amount,
            self.description,
            parse_status(&self.status)?,
            ActorId::from_uuid(parse_uuid(&self.created_by)?),
            parse_role(&self.created_by_role)?,
            approved_by,
            self.rejection_reason,
            self.failure_reason,
            parse_timestamp(&self.created_at)?,
            parse_timestamp(&self.updated_at)?,
        ))
    }
}

/// Limit row from the database.
#[derive(FromRow)]
pub struct DbLimit {
    pub id: String,
    pub role: String,
    pub currency: String,
    pub max_single_amount: i64,
    pub max_daily_amount: i64,
    pub is_active: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl DbLimit {
    pub fn into_domain(self) -> Result<Limit, RepoError> {
        Ok(Limit::from_parts(
            LimitId::from_uuid(parse_uuid(&self.id)?),
            parse_role(&self.role)?,
            parse_currency(&self.currency)?,
            self.max_single_amount,
            self.max_daily_amount,
            self.is_active != 0,
            parse_timestamp(&self.created_at)?,
            parse_timestamp(&self.updated_at)?,
        ))
    }
}

/// Audit-log row from the database.
#[derive(FromRow)]
pub struct DbAuditLog {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub performed_by: String,
    pub correlation_id: String,
    pub details: Option<String>,
    pub created_at: String,
}

impl DbAuditLog {
    pub fn into_domain(self) -> Result<AuditLog, RepoError> {
        let action: AuditAction = self
            .action
            .parse()
            .map_err(|_| RepoError::Database(format!("Unknown audit action: {}", self.action)))?;

        let details = self
            .details
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(AuditLog::from_parts(
            parse_uuid(&self.id)?,
            self.entity_type,
            parse_uuid(&self.entity_id)?,
            action,
            ActorId::from_uuid(parse_uuid(&self.performed_by)?),
            self.correlation_id,
            details,
            parse_timestamp(&self.created_at)?,
        ))
    }
}

/// Balance/version/state projection used by the settlement path.
#[derive(FromRow)]
pub struct DbAccountState {
    pub balance: i64,
    pub currency: String,
    pub is_active: i64,
    pub version: i64,
}

/// Status-only projection for CAS diagnostics.
#[derive(FromRow)]
pub struct DbStatus {
    pub status: String,
}

/// Aggregate sum projection.
#[derive(FromRow)]
pub struct DbSum {
    pub total: Option<i64>,
}

/// Count projection for pagination.
#[derive(FromRow)]
pub struct DbCount {
    pub total: i64,
}
