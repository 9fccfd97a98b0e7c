//! Payment Authorization Engine
//!
//! Orchestrates domain operations through the repository port.
//! Contains NO infrastructure logic - pure business orchestration.
//!
//! Concurrency is delegated to the repository contract: idempotent inserts
//! resolve through the unique key constraint, status transitions through
//! compare-and-set, and settlement through version-checked balance updates.
//! The engine turns each storage outcome into the caller-facing error.

use serde_json::json;

use cashgrid_types::{
    Account, AccountId, AppError, AuditAction, AuditFilter, AuditLog, Capability,
    CreateAccountRequest, CreateLimitRequest, CreatePaymentRequest, DomainError, Iban, Limit,
    LimitId, MissingLimitPolicy, Money, Page, PageRequest, Payment, PaymentFilter, PaymentId,
    PaymentRepository, PaymentStatus, RejectPaymentRequest, RepoError, RequestContext,
    UpdateLimitRequest,
};

use crate::{fingerprint, limits};

/// Tunable engine behavior, sourced from configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnginePolicy {
    /// What to do when no limit row exists for a (role, currency) pair.
    pub missing_limit: MissingLimitPolicy,
}

/// Application service for the maker-checker payment flow.
///
/// Generic over `R: PaymentRepository` - the adapter is injected at compile
/// time. This enables:
/// - Swapping repositories without code changes
/// - Testing with an in-memory repo
/// - Compile-time checks for port implementation
pub struct PaymentEngine<R: PaymentRepository> {
    repo: R,
    policy: EnginePolicy,
}

impl<R: PaymentRepository> PaymentEngine<R> {
    /// Creates a new engine with the given repository and policy.
    pub fn new(repo: R, policy: EnginePolicy) -> Self {
        Self { repo, policy }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Single authorization gate. Every operation names the capability it
    /// needs and nothing else consults the role.
    fn require(&self, ctx: &RequestContext, cap: Capability) -> Result<(), AppError> {
        if ctx.actor.role.can(cap) {
            Ok(())
        } else {
            Err(AppError::Forbidden { required: cap })
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Payment submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Submits a payment for approval.
    ///
    /// Replaying the same idempotency key with the same payload returns the
    /// stored payment in whatever status it has reached; the same key with a
    /// different payload is a conflict.
    pub async fn create_payment(
        &self,
        ctx: &RequestContext,
        req: CreatePaymentRequest,
    ) -> Result<Payment, AppError> {
        self.require(ctx, Capability::CreatePayment)?;

        if req.idempotency_key.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Idempotency key cannot be empty".into(),
            ));
        }

        let amount = Money::positive(req.amount, req.currency)?;
        let source_iban = Iban::parse(&req.source_iban)?;
        let target_iban = Iban::parse(&req.target_iban)?;
        let fp = fingerprint::request_fingerprint(&source_iban, &target_iban, &req);

        // Fast path for replays; the insert below still guards the race
        // where two first submissions arrive together.
        if let Some(existing) = self
            .repo
            .find_payment_by_idempotency_key(&req.idempotency_key)
            .await?
        {
            return replay_or_conflict(existing, &fp);
        }

        let source = self
            .repo
            .find_account_by_iban(&source_iban)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Source account {source_iban}")))?;
        let target = self
            .repo
            .find_account_by_iban(&target_iban)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Target account {target_iban}")))?;

        if !source.is_active {
            return Err(AppError::BadRequest("Source account is inactive".into()));
        }
        if !target.is_active {
            return Err(AppError::BadRequest("Target account is inactive".into()));
        }
        if source.currency() != amount.currency() {
            return Err(DomainError::CurrencyMismatch {
                expected: source.currency(),
                got: amount.currency(),
            }
            .into());
        }
        if target.currency() != amount.currency() {
            return Err(DomainError::CurrencyMismatch {
                expected: target.currency(),
                got: amount.currency(),
            }
            .into());
        }

        limits::enforce(
            &self.repo,
            self.policy.missing_limit,
            ctx.actor.role,
            ctx.actor.id,
            amount,
        )
        .await?;

        let payment = Payment::new(
            req.idempotency_key.clone(),
            fp.clone(),
            source.id,
            target.id,
            amount,
            req.description.clone(),
            ctx.actor.id,
            ctx.actor.role,
        )?;

        let audit = AuditLog::new(
            "PAYMENT",
            *payment.id.as_uuid(),
            AuditAction::PaymentCreated,
            ctx.actor.id,
            &ctx.correlation_id,
            Some(json!({
                "amount": amount.amount(),
                "currency": amount.currency(),
                "source_iban": source_iban.as_str(),
                "target_iban": target_iban.as_str(),
            })),
        );

        match self.repo.insert_payment(&payment, audit).await {
            Ok(()) => {
                tracing::info!(
                    payment_id = %payment.id,
                    amount = amount.amount(),
                    currency = %amount.currency(),
                    "payment submitted"
                );
                Ok(payment)
            }
            // Lost the insert race: someone else landed this key first.
            Err(RepoError::Conflict(_)) => {
                let existing = self
                    .repo
                    .find_payment_by_idempotency_key(&req.idempotency_key)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal("Idempotency key vanished after conflict".into())
                    })?;
                replay_or_conflict(existing, &fp)
            }
            Err(e) => Err(e.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Approval flow
    // ─────────────────────────────────────────────────────────────────────────

    /// Approves a pending payment and settles it.
    ///
    /// Limits are re-validated against the maker before the transition, since
    /// the rolling window has moved since submission. A ledger failure during
    /// settlement marks the payment FAILED and returns it; FAILED payments
    /// are never retried.
    pub async fn approve_payment(
        &self,
        ctx: &RequestContext,
        id: PaymentId,
    ) -> Result<Payment, AppError> {
        self.require(ctx, Capability::DecidePayment)?;

        let payment = self
            .repo
            .get_payment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {id}")))?;

        if payment.created_by == ctx.actor.id {
            return Err(AppError::SelfApproval);
        }
        if payment.status != PaymentStatus::Pending {
            return Err(AppError::InvalidState {
                current: payment.status,
            });
        }

        if let Err(err) = limits::enforce(
            &self.repo,
            self.policy.missing_limit,
            payment.created_by_role,
            payment.created_by,
            payment.amount,
        )
        .await
        {
            // The breach itself is an auditable event; the payment stays
            // PENDING for a later decision inside the window.
            if let AppError::LimitExceeded {
                scope,
                limit,
                attempted,
            } = &err
            {
                let entry = AuditLog::new(
                    "PAYMENT",
                    *id.as_uuid(),
                    AuditAction::PaymentLimitBreached,
                    ctx.actor.id,
                    &ctx.correlation_id,
                    Some(json!({
                        "scope": scope.to_string(),
                        "limit": limit,
                        "attempted": attempted,
                    })),
                );
                self.repo.append_audit(&entry).await?;
            }
            return Err(err);
        }

        let audit = AuditLog::new(
            "PAYMENT",
            *id.as_uuid(),
            AuditAction::PaymentApproved,
            ctx.actor.id,
            &ctx.correlation_id,
            None,
        );

        let approved = match self.repo.mark_approved(id, ctx.actor.id, audit).await {
            Ok(p) => p,
            Err(RepoError::Conflict(_)) => {
                // Lost the decision race; report where the payment ended up.
                let current = self
                    .repo
                    .get_payment(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Payment {id}")))?;
                return Err(AppError::InvalidState {
                    current: current.status,
                });
            }
            Err(RepoError::NotFound) => {
                return Err(AppError::NotFound(format!("Payment {id}")));
            }
            Err(e) => return Err(e.into()),
        };

        self.settle(ctx, approved).await
    }

    async fn settle(&self, ctx: &RequestContext, approved: Payment) -> Result<Payment, AppError> {
        let id = approved.id;
        let audit = AuditLog::new(
            "PAYMENT",
            *id.as_uuid(),
            AuditAction::PaymentCompleted,
            ctx.actor.id,
            &ctx.correlation_id,
            Some(json!({ "amount": approved.amount.amount() })),
        );

        match self.repo.settle_payment(&approved, audit).await {
            Ok(settlement) => {
                tracing::info!(
                    payment_id = %id,
                    source_balance = settlement.source_balance,
                    target_balance = settlement.target_balance,
                    "payment settled"
                );
                Ok(settlement.payment)
            }
            Err(RepoError::Ledger(cause)) => {
                let reason = cause.to_string();
                tracing::warn!(payment_id = %id, %reason, "settlement failed");

                let audit = AuditLog::new(
                    "PAYMENT",
                    *id.as_uuid(),
                    AuditAction::PaymentFailed,
                    ctx.actor.id,
                    &ctx.correlation_id,
                    Some(json!({ "reason": reason })),
                );
                let failed = self.repo.mark_failed(id, &reason, audit).await?;
                Ok(failed)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rejects a pending payment with a mandatory reason.
    pub async fn reject_payment(
        &self,
        ctx: &RequestContext,
        id: PaymentId,
        req: RejectPaymentRequest,
    ) -> Result<Payment, AppError> {
        self.require(ctx, Capability::DecidePayment)?;

        if req.reason.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Rejection reason cannot be empty".into(),
            ));
        }

        let payment = self
            .repo
            .get_payment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {id}")))?;

        if payment.created_by == ctx.actor.id {
            return Err(AppError::SelfApproval);
        }
        if payment.status != PaymentStatus::Pending {
            return Err(AppError::InvalidState {
                current: payment.status,
            });
        }

        let audit = AuditLog::new(
            "PAYMENT",
            *id.as_uuid(),
            AuditAction::PaymentRejected,
            ctx.actor.id,
            &ctx.correlation_id,
            Some(json!({ "reason": req.reason })),
        );

        match self
            .repo
            .mark_rejected(id, ctx.actor.id, &req.reason, audit)
            .await
        {
            Ok(p) => {
                tracing::info!(payment_id = %id, "payment rejected");
                Ok(p)
            }
            Err(RepoError::Conflict(_)) => {
                let current = self
                    .repo
                    .get_payment(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Payment {id}")))?;
                Err(AppError::InvalidState {
                    current: current.status,
                })
            }
            Err(RepoError::NotFound) => Err(AppError::NotFound(format!("Payment {id}"))),
            Err(e) => Err(e.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Payment queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Gets a payment by ID.
    pub async fn get_payment(
        &self,
        _ctx: &RequestContext,
        id: PaymentId,
    ) -> Result<Payment, AppError> {
        self.repo
            .get_payment(id)
            .await
            .map_err(Into::into)
            .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Payment {id}"))))
    }

    /// Lists payments matching the filter.
    pub async fn list_payments(
        &self,
        _ctx: &RequestContext,
        filter: PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, AppError> {
        self.repo
            .list_payments(&filter, page)
            .await
            .map_err(Into::into)
    }

    /// Lists the caller's approval inbox: pending payments made by others.
    pub async fn pending_payments(
        &self,
        ctx: &RequestContext,
        page: PageRequest,
    ) -> Result<Page<Payment>, AppError> {
        self.require(ctx, Capability::DecidePayment)?;

        let filter = PaymentFilter {
            pending_for: Some(ctx.actor.id),
            ..Default::default()
        };
        self.repo
            .list_payments(&filter, page)
            .await
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Account operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a new account.
    pub async fn create_account(
        &self,
        ctx: &RequestContext,
        req: CreateAccountRequest,
    ) -> Result<Account, AppError> {
        self.require(ctx, Capability::ManageAccounts)?;

        let iban = Iban::parse(&req.iban)?;
        let balance = Money::new(req.opening_balance, req.currency)?;
        let account = Account::new(iban, req.owner, balance)?;

        let audit = AuditLog::new(
            "ACCOUNT",
            *account.id.as_uuid(),
            AuditAction::AccountCreated,
            ctx.actor.id,
            &ctx.correlation_id,
            Some(json!({
                "iban": account.iban.as_str(),
                "currency": account.currency(),
            })),
        );

        self.repo.create_account(&account, audit).await?;
        tracing::info!(account_id = %account.id, "account created");
        Ok(account)
    }

    /// Gets an account by ID.
    pub async fn get_account(
        &self,
        _ctx: &RequestContext,
        id: AccountId,
    ) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await
            .map_err(Into::into)
            .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Account {id}"))))
    }

    /// Lists all accounts.
    pub async fn list_accounts(&self, _ctx: &RequestContext) -> Result<Vec<Account>, AppError> {
        self.repo.list_accounts().await.map_err(Into::into)
    }

    /// Marks an account inactive. Existing payments referencing it fail at
    /// settlement rather than disappearing.
    pub async fn deactivate_account(
        &self,
        ctx: &RequestContext,
        id: AccountId,
    ) -> Result<Account, AppError> {
        self.require(ctx, Capability::ManageAccounts)?;

        let audit = AuditLog::new(
            "ACCOUNT",
            *id.as_uuid(),
            AuditAction::AccountDeactivated,
            ctx.actor.id,
            &ctx.correlation_id,
            None,
        );

        match self.repo.deactivate_account(id, audit).await {
            Ok(account) => {
                tracing::info!(account_id = %id, "account deactivated");
                Ok(account)
            }
            Err(RepoError::NotFound) => Err(AppError::NotFound(format!("Account {id}"))),
            Err(e) => Err(e.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Limit operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a limit for a (role, currency) pair.
    pub async fn create_limit(
        &self,
        ctx: &RequestContext,
        req: CreateLimitRequest,
    ) -> Result<Limit, AppError> {
        self.require(ctx, Capability::ManageLimits)?;

        let limit = Limit::new(
            req.role,
            req.currency,
            req.max_single_amount,
            req.max_daily_amount,
        )?;

        let audit = AuditLog::new(
            "LIMIT",
            *limit.id.as_uuid(),
            AuditAction::LimitCreated,
            ctx.actor.id,
            &ctx.correlation_id,
            Some(json!({
                "role": limit.role,
                "currency": limit.currency,
                "max_single_amount": limit.max_single_amount,
                "max_daily_amount": limit.max_daily_amount,
            })),
        );

        self.repo.create_limit(&limit, audit).await?;
        tracing::info!(limit_id = %limit.id, role = %limit.role, currency = %limit.currency, "limit created");
        Ok(limit)
    }

    /// Applies a partial update to a limit's ceilings.
    pub async fn update_limit(
        &self,
        ctx: &RequestContext,
        id: LimitId,
        req: UpdateLimitRequest,
    ) -> Result<Limit, AppError> {
        self.require(ctx, Capability::ManageLimits)?;

        let audit = AuditLog::new(
            "LIMIT",
            *id.as_uuid(),
            AuditAction::LimitUpdated,
            ctx.actor.id,
            &ctx.correlation_id,
            Some(json!({
                "max_single_amount": req.max_single_amount,
                "max_daily_amount": req.max_daily_amount,
            })),
        );

        match self.repo.update_limit(id, &req, audit).await {
            Ok(limit) => Ok(limit),
            Err(RepoError::NotFound) => Err(AppError::NotFound(format!("Limit {id}"))),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists all limits.
    pub async fn list_limits(&self, ctx: &RequestContext) -> Result<Vec<Limit>, AppError> {
        self.require(ctx, Capability::ManageLimits)?;
        self.repo.list_limits().await.map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audit queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Searches the audit trail.
    pub async fn search_audit_logs(
        &self,
        ctx: &RequestContext,
        filter: AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, AppError> {
        self.require(ctx, Capability::ViewAudit)?;
        self.repo
            .search_audit_logs(&filter, page)
            .await
            .map_err(Into::into)
    }
}

fn replay_or_conflict(existing: Payment, fingerprint: &str) -> Result<Payment, AppError> {
    if existing.fingerprint == fingerprint {
        Ok(existing)
    } else {
        Err(AppError::IdempotencyConflict {
            key: existing.idempotency_key.clone(),
        })
    }
}
