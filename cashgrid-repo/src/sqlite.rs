//! SQLite repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;

use cashgrid_types::{
    Account, AccountId, ActorId, AuditFilter, AuditLog, Currency, Iban, LedgerError, Limit,
    LimitId, Page, PageRequest, Payment, PaymentFilter, PaymentId, PaymentRepository, RepoError,
    Role, Settlement, UpdateLimitRequest,
};

use crate::types::{
    DbAccount, DbAccountState, DbAuditLog, DbCount, DbLimit, DbPayment, DbStatus, DbSum,
};

const PAYMENT_COLUMNS: &str = "id, idempotency_key, fingerprint, source_account_id, \
     target_account_id, amount, currency, description, status, created_by, created_by_role, \
     approved_by, rejection_reason, failure_reason, created_at, updated_at";

const ACCOUNT_COLUMNS: &str =
    "id, iban, owner, balance, currency, is_active, version, created_at, updated_at";

/// Timestamps are stored as fixed-precision RFC 3339 text so that
/// lexicographic ordering matches chronological ordering.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn db_err(e: sqlx::Error) -> RepoError {
    RepoError::Database(e.to_string())
}

fn tx_err(e: sqlx::Error) -> RepoError {
    RepoError::Transaction(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_create_tables.sql");
        sqlx::query(ddl).execute(&pool).await?;

        tracing::debug!("SQLite schema applied");
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Appends an audit entry inside an open transaction. Every mutating
    /// operation goes through this, so an entry that cannot be written rolls
    /// the whole mutation back.
    async fn append_audit_tx(
        tx: &mut Transaction<'_, Sqlite>,
        entry: &AuditLog,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO audit_logs (id, entity_type, entity_id, action, performed_by, correlation_id, details, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.entity_type)
        .bind(entry.entity_id.to_string())
        .bind(entry.action.to_string())
        .bind(entry.performed_by.to_string())
        .bind(&entry.correlation_id)
        .bind(entry.details.as_ref().map(|d| d.to_string()))
        .bind(fmt_ts(entry.created_at))
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn fetch_payment_tx(
        tx: &mut Transaction<'_, Sqlite>,
        id: PaymentId,
    ) -> Result<Payment, RepoError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?");
        let row: Option<DbPayment> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }

    /// Shared CAS guard for payment transitions: zero rows affected means the
    /// payment either vanished (NotFound) or is no longer in the expected
    /// status (Conflict).
    async fn explain_cas_miss(
        tx: &mut Transaction<'_, Sqlite>,
        id: PaymentId,
    ) -> Result<RepoError, RepoError> {
        let row: Option<DbStatus> = sqlx::query_as("SELECT status FROM payments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?;

        Ok(match row {
            None => RepoError::NotFound,
            Some(s) => RepoError::Conflict(format!("payment is {}", s.status)),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRepository for SqliteRepo {
    async fn create_account(&self, account: &Account, audit: AuditLog) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        let result = sqlx::query(
            r#"INSERT INTO accounts (id, iban, owner, balance, currency, is_active, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(account.id.to_string())
        .bind(account.iban.as_str())
        .bind(&account.owner)
        .bind(account.balance.amount())
        .bind(account.currency().to_string())
        .bind(account.is_active as i64)
        .bind(account.version)
        .bind(fmt_ts(account.created_at))
        .bind(fmt_ts(account.updated_at))
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            if is_unique_violation(&e) {
                return Err(RepoError::Conflict(format!(
                    "account with IBAN {} already exists",
                    account.iban
                )));
            }
            return Err(db_err(e));
        }

        Self::append_audit_tx(&mut tx, &audit).await?;
        tx.commit().await.map_err(tx_err)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepoError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?");
        let row: Option<DbAccount> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbAccount::into_domain).transpose()
    }

    async fn find_account_by_iban(&self, iban: &Iban) -> Result<Option<Account>, RepoError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE iban = ?");
        let row: Option<DbAccount> = sqlx::query_as(&sql)
            .bind(iban.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbAccount::into_domain).transpose()
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, RepoError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at DESC");
        let rows: Vec<DbAccount> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(DbAccount::into_domain).collect()
    }

    async fn deactivate_account(
        &self,
        id: AccountId,
        audit: AuditLog,
    ) -> Result<Account, RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        let result = sqlx::query("UPDATE accounts SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(fmt_ts(Utc::now()))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        Self::append_audit_tx(&mut tx, &audit).await?;

        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?");
        let row: DbAccount = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(tx_err)?;
        row.into_domain()
    }

    async fn insert_payment(&self, payment: &Payment, audit: AuditLog) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        let result = sqlx::query(
            r#"INSERT INTO payments (id, idempotency_key, fingerprint, source_account_id, target_account_id,
                                     amount, currency, description, status, created_by, created_by_role,
                                     approved_by, rejection_reason, failure_reason, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL, ?, ?)"#,
        )
        .bind(payment.id.to_string())
        .bind(&payment.idempotency_key)
        .bind(&payment.fingerprint)
        .bind(payment.source_account_id.to_string())
        .bind(payment.target_account_id.to_string())
        .bind(payment.amount.amount())
        .bind(payment.amount.currency().to_string())
        .bind(&payment.description)
        .bind(payment.status.to_string())
        .bind(payment.created_by.to_string())
        .bind(payment.created_by_role.to_string())
        .bind(fmt_ts(payment.created_at))
        .bind(fmt_ts(payment.updated_at))
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            if is_unique_violation(&e) {
                return Err(RepoError::Conflict(format!(
                    "idempotency key {} already used",
                    payment.idempotency_key
                )));
            }
            return Err(db_err(e));
        }

        Self::append_audit_tx(&mut tx, &audit).await?;
        tx.commit().await.map_err(tx_err)
    }

    async fn find_payment_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Payment>, RepoError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE idempotency_key = ?");
        let row: Option<DbPayment> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbPayment::into_domain).transpose()
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?");
        let row: Option<DbPayment> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbPayment::into_domain).transpose()
    }

    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, RepoError> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            binds.push(status.to_string());
        }
        if let Some(creator) = filter.created_by {
            conditions.push("created_by = ?");
            binds.push(creator.to_string());
        }
        if let Some(checker) = filter.pending_for {
            conditions.push("status = 'PENDING' AND created_by != ?");
            binds.push(checker.to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) AS total FROM payments{where_clause}");
        let mut count_query = sqlx::query_as::<_, DbCount>(&count_sql);
        for b in &binds {
            count_query = count_query.bind(b);
        }
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .total;

        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments{where_clause} \
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        let mut query = sqlx::query_as::<_, DbPayment>(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        let rows = query
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let content: Result<Vec<Payment>, RepoError> =
            rows.into_iter().map(DbPayment::into_domain).collect();

        Ok(Page::new(content?, page, total as u64))
    }

    async fn mark_approved(
        &self,
        id: PaymentId,
        checker: ActorId,
        audit: AuditLog,
    ) -> Result<Payment, RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        let result = sqlx::query(
            r#"UPDATE payments SET status = 'APPROVED', approved_by = ?, updated_at = ?
               WHERE id = ? AND status = 'PENDING'"#,
        )
        .bind(checker.to_string())
        .bind(fmt_ts(Utc::now()))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Self::explain_cas_miss(&mut tx, id).await?);
        }

        Self::append_audit_tx(&mut tx, &audit).await?;
        let payment = Self::fetch_payment_tx(&mut tx, id).await?;
        tx.commit().await.map_err(tx_err)?;

        Ok(payment)
    }

    async fn mark_rejected(
        &self,
        id: PaymentId,
        checker: ActorId,
        reason: &str,
        audit: AuditLog,
    ) -> Result<Payment, RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        let result = sqlx::query(
            r#"UPDATE payments SET status = 'REJECTED', approved_by = ?, rejection_reason = ?, updated_at = ?
               WHERE id = ? AND status = 'PENDING'"#,
        )
        .bind(checker.to_string())
        .bind(reason)
        .bind(fmt_ts(Utc::now()))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Self::explain_cas_miss(&mut tx, id).await?);
        }

        Self::append_audit_tx(&mut tx, &audit).await?;
        let payment = Self::fetch_payment_tx(&mut tx, id).await?;
        tx.commit().await.map_err(tx_err)?;

        Ok(payment)
    }

    async fn settle_payment(
        &self,
        payment: &Payment,
        audit: AuditLog,
    ) -> Result<Settlement, RepoError> {
        let amount = payment.amount.amount();
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        let source: Option<DbAccountState> = sqlx::query_as(
            "SELECT balance, currency, is_active, version FROM accounts WHERE id = ?",
        )
        .bind(payment.source_account_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let source = source.ok_or(RepoError::Ledger(LedgerError::AccountNotFound(
            payment.source_account_id,
        )))?;

        let target: Option<DbAccountState> = sqlx::query_as(
            "SELECT balance, currency, is_active, version FROM accounts WHERE id = ?",
        )
        .bind(payment.target_account_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let target = target.ok_or(RepoError::Ledger(LedgerError::AccountNotFound(
            payment.target_account_id,
        )))?;

        if source.is_active == 0 {
            return Err(RepoError::Ledger(LedgerError::AccountInactive(
                payment.source_account_id,
            )));
        }
        if target.is_active == 0 {
            return Err(RepoError::Ledger(LedgerError::AccountInactive(
                payment.target_account_id,
            )));
        }
        if source.balance < amount {
            return Err(RepoError::Ledger(LedgerError::InsufficientFunds {
                available: source.balance,
                requested: amount,
            }));
        }

        let now = fmt_ts(Utc::now());

        // Version-checked debit and credit. A concurrent writer bumps the
        // version between our read and this update, so zero rows affected
        // means the balance we validated is stale.
        let debit = sqlx::query(
            r#"UPDATE accounts SET balance = balance - ?, version = version + 1, updated_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(amount)
        .bind(&now)
        .bind(payment.source_account_id.to_string())
        .bind(source.version)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if debit.rows_affected() == 0 {
            return Err(RepoError::Ledger(LedgerError::VersionConflict(
                payment.source_account_id,
            )));
        }

        let credit = sqlx::query(
            r#"UPDATE accounts SET balance = balance + ?, version = version + 1, updated_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(amount)
        .bind(&now)
        .bind(payment.target_account_id.to_string())
        .bind(target.version)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if credit.rows_affected() == 0 {
            return Err(RepoError::Ledger(LedgerError::VersionConflict(
                payment.target_account_id,
            )));
        }

        let completed = sqlx::query(
            r#"UPDATE payments SET status = 'COMPLETED', updated_at = ?
               WHERE id = ? AND status = 'APPROVED'"#,
        )
        .bind(&now)
        .bind(payment.id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if completed.rows_affected() == 0 {
            return Err(Self::explain_cas_miss(&mut tx, payment.id).await?);
        }

        Self::append_audit_tx(&mut tx, &audit).await?;
        let settled = Self::fetch_payment_tx(&mut tx, payment.id).await?;
        tx.commit().await.map_err(tx_err)?;

        Ok(Settlement {
            payment: settled,
            source_balance: source.balance - amount,
            target_balance: target.balance + amount,
        })
    }

    async fn mark_failed(
        &self,
        id: PaymentId,
        cause: &str,
        audit: AuditLog,
    ) -> Result<Payment, RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        let result = sqlx::query(
            r#"UPDATE payments SET status = 'FAILED', failure_reason = ?, updated_at = ?
               WHERE id = ? AND status = 'APPROVED'"#,
        )
        .bind(cause)
        .bind(fmt_ts(Utc::now()))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Self::explain_cas_miss(&mut tx, id).await?);
        }

        Self::append_audit_tx(&mut tx, &audit).await?;
        let payment = Self::fetch_payment_tx(&mut tx, id).await?;
        tx.commit().await.map_err(tx_err)?;

        Ok(payment)
    }

    async fn create_limit(&self, limit: &Limit, audit: AuditLog) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        let result = sqlx::query(
            r#"INSERT INTO limits (id, role, currency, max_single_amount, max_daily_amount, is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(limit.id.to_string())
        .bind(limit.role.to_string())
        .bind(limit.currency.to_string())
        .bind(limit.max_single_amount)
        .bind(limit.max_daily_amount)
        .bind(limit.is_active as i64)
        .bind(fmt_ts(limit.created_at))
        .bind(fmt_ts(limit.updated_at))
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            if is_unique_violation(&e) {
                return Err(RepoError::Conflict(format!(
                    "limit already exists for role {} and currency {}",
                    limit.role, limit.currency
                )));
            }
            return Err(db_err(e));
        }

        Self::append_audit_tx(&mut tx, &audit).await?;
        tx.commit().await.map_err(tx_err)
    }

    async fn update_limit(
        &self,
        id: LimitId,
        changes: &UpdateLimitRequest,
        audit: AuditLog,
    ) -> Result<Limit, RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        let row: Option<DbLimit> = sqlx::query_as(
            r#"SELECT id, role, currency, max_single_amount, max_daily_amount, is_active, created_at, updated_at
               FROM limits WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let current = row.ok_or(RepoError::NotFound)?.into_domain()?;

        let single = changes.max_single_amount.unwrap_or(current.max_single_amount);
        let daily = changes.max_daily_amount.unwrap_or(current.max_daily_amount);
        if single <= 0 || daily <= 0 {
            return Err(RepoError::Domain(cashgrid_types::DomainError::Validation(
                "Limit amounts must be positive".into(),
            )));
        }
        if single > daily {
            return Err(RepoError::Domain(cashgrid_types::DomainError::Validation(
                "Single-transaction limit cannot exceed the daily limit".into(),
            )));
        }

        sqlx::query(
            r#"UPDATE limits SET max_single_amount = ?, max_daily_amount = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(single)
        .bind(daily)
        .bind(fmt_ts(Utc::now()))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        Self::append_audit_tx(&mut tx, &audit).await?;

        let row: DbLimit = sqlx::query_as(
            r#"SELECT id, role, currency, max_single_amount, max_daily_amount, is_active, created_at, updated_at
               FROM limits WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(tx_err)?;
        row.into_domain()
    }

    async fn find_active_limit(
        &self,
        role: Role,
        currency: Currency,
    ) -> Result<Option<Limit>, RepoError> {
        let row: Option<DbLimit> = sqlx::query_as(
            r#"SELECT id, role, currency, max_single_amount, max_daily_amount, is_active, created_at, updated_at
               FROM limits WHERE role = ? AND currency = ? AND is_active = 1"#,
        )
        .bind(role.to_string())
        .bind(currency.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(DbLimit::into_domain).transpose()
    }

    async fn list_limits(&self) -> Result<Vec<Limit>, RepoError> {
        let rows: Vec<DbLimit> = sqlx::query_as(
            r#"SELECT id, role, currency, max_single_amount, max_daily_amount, is_active, created_at, updated_at
               FROM limits ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DbLimit::into_domain).collect()
    }

    async fn sum_spent_since(
        &self,
        maker: ActorId,
        currency: Currency,
        since: DateTime<Utc>,
    ) -> Result<i64, RepoError> {
        let row: DbSum = sqlx::query_as(
            r#"SELECT COALESCE(SUM(amount), 0) AS total FROM payments
               WHERE created_by = ? AND currency = ? AND status IN ('APPROVED', 'COMPLETED')
                 AND created_at >= ?"#,
        )
        .bind(maker.to_string())
        .bind(currency.to_string())
        .bind(fmt_ts(since))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.total.unwrap_or(0))
    }

    async fn append_audit(&self, entry: &AuditLog) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_err)?;
        Self::append_audit_tx(&mut tx, entry).await?;
        tx.commit().await.map_err(tx_err)
    }

    async fn search_audit_logs(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, RepoError> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(action) = filter.action {
            conditions.push("action = ?");
            binds.push(action.to_string());
        }
        if let Some(performer) = filter.performed_by {
            conditions.push("performed_by = ?");
            binds.push(performer.to_string());
        }
        if let Some(entity_type) = &filter.entity_type {
            conditions.push("entity_type = ?");
            binds.push(entity_type.clone());
        }
        if let Some(entity_id) = filter.entity_id {
            conditions.push("entity_id = ?");
            binds.push(entity_id.to_string());
        }
        if let Some(correlation_id) = &filter.correlation_id {
            conditions.push("correlation_id = ?");
            binds.push(correlation_id.clone());
        }
        if let Some(from) = filter.from {
            conditions.push("created_at >= ?");
            binds.push(fmt_ts(from));
        }
        if let Some(to) = filter.to {
            conditions.push("created_at <= ?");
            binds.push(fmt_ts(to));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) AS total FROM audit_logs{where_clause}");
        let mut count_query = sqlx::query_as::<_, DbCount>(&count_sql);
        for b in &binds {
            count_query = count_query.bind(b);
        }
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .total;

        let sql = format!(
            "SELECT id, entity_type, entity_id, action, performed_by, correlation_id, details, created_at \
             FROM audit_logs{where_clause} ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        let mut query = sqlx::query_as::<_, DbAuditLog>(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        let rows = query
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let content: Result<Vec<AuditLog>, RepoError> =
            rows.into_iter().map(DbAuditLog::into_domain).collect();

        Ok(Page::new(content?, page, total as u64))
    }
}
