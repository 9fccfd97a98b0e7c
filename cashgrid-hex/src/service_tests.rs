//! PaymentEngine unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use cashgrid_types::{
        Account, AccountId, Actor, ActorId, AppError, AuditAction, AuditFilter, AuditLog,
        Capability, CreateAccountRequest, CreateLimitRequest, CreatePaymentRequest, Currency,
        Iban, LedgerError, Limit, LimitId, LimitScope, MissingLimitPolicy, Page, PageRequest,
        Payment, PaymentFilter, PaymentId, PaymentRepository, PaymentStatus, RejectPaymentRequest,
        RepoError, RequestContext, Role, Settlement, UpdateLimitRequest,
    };

    use crate::{EnginePolicy, PaymentEngine};

    const IBAN_A: &str = "TR330006100519786457841326";
    const IBAN_B: &str = "TR060006100519786457841327";
    const IBAN_C: &str = "TR760006100519786457841328";

    #[derive(Default)]
    struct Inner {
        accounts: HashMap<AccountId, Account>,
        payments: HashMap<PaymentId, Payment>,
        limits: Vec<Limit>,
        audits: Vec<AuditLog>,
    }

    /// In-memory repository with the same concurrency contract as the real
    /// adapter: unique idempotency keys, compare-and-set transitions, and
    /// atomic settlement under one lock.
    pub struct MockRepo {
        state: Mutex<Inner>,
        settle_failure: Mutex<Option<LedgerError>>,
        hide_key_lookup: Mutex<bool>,
    }

    impl MockRepo {
        pub fn new() -> Self {
            Self {
                state: Mutex::new(Inner::default()),
                settle_failure: Mutex::new(None),
                hide_key_lookup: Mutex::new(false),
            }
        }

        /// Makes the next settlement fail with the given ledger error.
        fn inject_settle_failure(&self, failure: LedgerError) {
            *self.settle_failure.lock().unwrap() = Some(failure);
        }

        /// Makes the next idempotency-key lookup miss, simulating a second
        /// first-submission landing between the lookup and the insert.
        fn hide_next_key_lookup(&self) {
            *self.hide_key_lookup.lock().unwrap() = true;
        }

        fn audit_actions(&self) -> Vec<AuditAction> {
            self.state
                .lock()
                .unwrap()
                .audits
                .iter()
                .map(|e| e.action)
                .collect()
        }
    }

    fn paginate<T: Clone>(items: Vec<T>, page: PageRequest) -> Page<T> {
        let total = items.len() as u64;
        let content = items
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Page::new(content, page, total)
    }

    #[async_trait]
    impl PaymentRepository for MockRepo {
        async fn create_account(
            &self,
            account: &Account,
            audit: AuditLog,
        ) -> Result<(), RepoError> {
            let mut state = self.state.lock().unwrap();
            if state.accounts.values().any(|a| a.iban == account.iban) {
                return Err(RepoError::Conflict("duplicate IBAN".into()));
            }
            state.accounts.insert(account.id, account.clone());
            state.audits.push(audit);
            Ok(())
        }

        async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepoError> {
            Ok(self.state.lock().unwrap().accounts.get(&id).cloned())
        }

        async fn find_account_by_iban(&self, iban: &Iban) -> Result<Option<Account>, RepoError> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .accounts
                .values()
                .find(|a| &a.iban == iban)
                .cloned())
        }

        async fn list_accounts(&self) -> Result<Vec<Account>, RepoError> {
            Ok(self.state.lock().unwrap().accounts.values().cloned().collect())
        }

        async fn deactivate_account(
            &self,
            id: AccountId,
            audit: AuditLog,
        ) -> Result<Account, RepoError> {
            let mut state = self.state.lock().unwrap();
            let account = state.accounts.get_mut(&id).ok_or(RepoError::NotFound)?;
            account.is_active = false;
            account.updated_at = Utc::now();
            let snapshot = account.clone();
            state.audits.push(audit);
            Ok(snapshot)
        }

        async fn insert_payment(
            &self,
            payment: &Payment,
            audit: AuditLog,
        ) -> Result<(), RepoError> {
            let mut state = self.state.lock().unwrap();
            if state
                .payments
                .values()
                .any(|p| p.idempotency_key == payment.idempotency_key)
            {
                return Err(RepoError::Conflict("duplicate idempotency key".into()));
            }
            state.payments.insert(payment.id, payment.clone());
            state.audits.push(audit);
            Ok(())
        }

        async fn find_payment_by_idempotency_key(
            &self,
            key: &str,
        ) -> Result<Option<Payment>, RepoError> {
            if std::mem::take(&mut *self.hide_key_lookup.lock().unwrap()) {
                return Ok(None);
            }
            Ok(self
                .state
                .lock()
                .unwrap()
                .payments
                .values()
                .find(|p| p.idempotency_key == key)
                .cloned())
        }

        async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError> {
            Ok(self.state.lock().unwrap().payments.get(&id).cloned())
        }

        async fn list_payments(
            &self,
            filter: &PaymentFilter,
            page: PageRequest,
        ) -> Result<Page<Payment>, RepoError> {
            let state = self.state.lock().unwrap();
            let mut matches: Vec<Payment> = state
                .payments
                .values()
                .filter(|p| filter.status.is_none_or(|s| p.status == s))
                .filter(|p| filter.created_by.is_none_or(|c| p.created_by == c))
                .filter(|p| {
                    filter
                        .pending_for
                        .is_none_or(|c| p.status == PaymentStatus::Pending && p.created_by != c)
                })
                .cloned()
                .collect();
            matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(paginate(matches, page))
        }

        async fn mark_approved(
            &self,
            id: PaymentId,
            checker: ActorId,
            audit: AuditLog,
        ) -> Result<Payment, RepoError> {
            let mut state = self.state.lock().unwrap();
            let payment = state.payments.get_mut(&id).ok_or(RepoError::NotFound)?;
            if payment.status != PaymentStatus::Pending {
                return Err(RepoError::Conflict(format!("payment is {}", payment.status)));
            }
            payment.status = PaymentStatus::Approved;
            payment.approved_by = Some(checker);
            payment.updated_at = Utc::now();
            let snapshot = payment.clone();
            state.audits.push(audit);
            Ok(snapshot)
        }

        async fn mark_rejected(
            &self,
            id: PaymentId,
            checker: ActorId,
            reason: &str,
            audit: AuditLog,
        ) -> Result<Payment, RepoError> {
            let mut state = self.state.lock().unwrap();
            let payment = state.payments.get_mut(&id).ok_or(RepoError::NotFound)?;
            if payment.status != PaymentStatus::Pending {
                return Err(RepoError::Conflict(format!("payment is {}", payment.status)));
            }
            payment.status = PaymentStatus::Rejected;
            payment.approved_by = Some(checker);
            payment.rejection_reason = Some(reason.to_string());
            payment.updated_at = Utc::now();
            let snapshot = payment.clone();
            state.audits.push(audit);
            Ok(snapshot)
        }

        async fn settle_payment(
            &self,
            payment: &Payment,
            audit: AuditLog,
        ) -> Result<Settlement, RepoError> {
            if let Some(failure) = self.settle_failure.lock().unwrap().take() {
                return Err(RepoError::Ledger(failure));
            }

            let mut state = self.state.lock().unwrap();

            let source = state
                .accounts
                .get(&payment.source_account_id)
                .ok_or(RepoError::Ledger(LedgerError::AccountNotFound(
                    payment.source_account_id,
                )))?
                .clone();
            let target = state
                .accounts
                .get(&payment.target_account_id)
                .ok_or(RepoError::Ledger(LedgerError::AccountNotFound(
                    payment.target_account_id,
                )))?
                .clone();

            if !source.is_active {
                return Err(RepoError::Ledger(LedgerError::AccountInactive(source.id)));
            }
            if !target.is_active {
                return Err(RepoError::Ledger(LedgerError::AccountInactive(target.id)));
            }

            let amount = payment.amount.amount();
            if source.balance.amount() < amount {
                return Err(RepoError::Ledger(LedgerError::InsufficientFunds {
                    available: source.balance.amount(),
                    requested: amount,
                }));
            }

            let source_balance = source.balance.amount() - amount;
            let target_balance = target.balance.amount() + amount;
            let currency = payment.amount.currency();

            {
                let src = state.accounts.get_mut(&source.id).unwrap();
                src.balance = cashgrid_types::Money::new(source_balance, currency).unwrap();
                src.version += 1;
            }
            {
                let tgt = state.accounts.get_mut(&target.id).unwrap();
                tgt.balance = cashgrid_types::Money::new(target_balance, currency).unwrap();
                tgt.version += 1;
            }

            let stored = state
                .payments
                .get_mut(&payment.id)
                .ok_or(RepoError::NotFound)?;
            if stored.status != PaymentStatus::Approved {
                return Err(RepoError::Conflict(format!("payment is {}", stored.status)));
            }
            stored.status = PaymentStatus::Completed;
            stored.updated_at = Utc::now();
            let snapshot = stored.clone();
            state.audits.push(audit);

            Ok(Settlement {
                payment: snapshot,
                source_balance,
                target_balance,
            })
        }

        async fn mark_failed(
            &self,
            id: PaymentId,
            cause: &str,
            audit: AuditLog,
        ) -> Result<Payment, RepoError> {
            let mut state = self.state.lock().unwrap();
            let payment = state.payments.get_mut(&id).ok_or(RepoError::NotFound)?;
            if payment.status != PaymentStatus::Approved {
                return Err(RepoError::Conflict(format!("payment is {}", payment.status)));
            }
            payment.status = PaymentStatus::Failed;
            payment.failure_reason = Some(cause.to_string());
            payment.updated_at = Utc::now();
            let snapshot = payment.clone();
            state.audits.push(audit);
            Ok(snapshot)
        }

        async fn create_limit(&self, limit: &Limit, audit: AuditLog) -> Result<(), RepoError> {
            let mut state = self.state.lock().unwrap();
            if state
                .limits
                .iter()
                .any(|l| l.role == limit.role && l.currency == limit.currency)
            {
                return Err(RepoError::Conflict("duplicate limit".into()));
            }
            state.limits.push(limit.clone());
            state.audits.push(audit);
            Ok(())
        }

        async fn update_limit(
            &self,
            id: LimitId,
            changes: &UpdateLimitRequest,
            audit: AuditLog,
        ) -> Result<Limit, RepoError> {
            let mut state = self.state.lock().unwrap();
            let limit = state
                .limits
                .iter_mut()
                .find(|l| l.id == id)
                .ok_or(RepoError::NotFound)?;
            if let Some(single) = changes.max_single_amount {
                limit.max_single_amount = single;
            }
            if let Some(daily) = changes.max_daily_amount {
                limit.max_daily_amount = daily;
            }
            limit.updated_at = Utc::now();
            let snapshot = limit.clone();
            state.audits.push(audit);
            Ok(snapshot)
        }

        async fn find_active_limit(
            &self,
            role: Role,
            currency: Currency,
        ) -> Result<Option<Limit>, RepoError> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .limits
                .iter()
                .find(|l| l.role == role && l.currency == currency && l.is_active)
                .cloned())
        }

        async fn list_limits(&self) -> Result<Vec<Limit>, RepoError> {
            Ok(self.state.lock().unwrap().limits.clone())
        }

        async fn sum_spent_since(
            &self,
            maker: ActorId,
            currency: Currency,
            since: DateTime<Utc>,
        ) -> Result<i64, RepoError> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .payments
                .values()
                .filter(|p| {
                    p.created_by == maker
                        && p.amount.currency() == currency
                        && matches!(
                            p.status,
                            PaymentStatus::Approved | PaymentStatus::Completed
                        )
                        && p.created_at >= since
                })
                .map(|p| p.amount.amount())
                .sum())
        }

        async fn append_audit(&self, entry: &AuditLog) -> Result<(), RepoError> {
            self.state.lock().unwrap().audits.push(entry.clone());
            Ok(())
        }

        async fn search_audit_logs(
            &self,
            filter: &AuditFilter,
            page: PageRequest,
        ) -> Result<Page<AuditLog>, RepoError> {
            let state = self.state.lock().unwrap();
            let mut matches: Vec<AuditLog> = state
                .audits
                .iter()
                .filter(|e| filter.action.is_none_or(|a| e.action == a))
                .filter(|e| filter.performed_by.is_none_or(|p| e.performed_by == p))
                .filter(|e| {
                    filter
                        .entity_type
                        .as_deref()
                        .is_none_or(|t| e.entity_type == t)
                })
                .cloned()
                .collect();
            matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(paginate(matches, page))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fixtures
    // ─────────────────────────────────────────────────────────────────────────

    fn engine() -> PaymentEngine<MockRepo> {
        PaymentEngine::new(MockRepo::new(), EnginePolicy::default())
    }

    fn deny_engine() -> PaymentEngine<MockRepo> {
        PaymentEngine::new(
            MockRepo::new(),
            EnginePolicy {
                missing_limit: MissingLimitPolicy::Deny,
            },
        )
    }

    fn ctx(role: Role) -> RequestContext {
        RequestContext::new(Actor::new(ActorId::new(), role), "corr-test")
    }

    fn payment_req(key: &str, source: &str, target: &str, amount: i64) -> CreatePaymentRequest {
        CreatePaymentRequest {
            idempotency_key: key.to_string(),
            source_iban: source.to_string(),
            target_iban: target.to_string(),
            amount,
            currency: Currency::TRY,
            description: Some("invoice".to_string()),
        }
    }

    async fn seed_account(
        engine: &PaymentEngine<MockRepo>,
        iban: &str,
        balance: i64,
    ) -> Account {
        engine
            .create_account(
                &ctx(Role::Admin),
                CreateAccountRequest {
                    iban: iban.to_string(),
                    owner: "Test Owner".to_string(),
                    currency: Currency::TRY,
                    opening_balance: balance,
                },
            )
            .await
            .unwrap()
    }

    async fn seed_limit(
        engine: &PaymentEngine<MockRepo>,
        role: Role,
        single: i64,
        daily: i64,
    ) -> Limit {
        engine
            .create_limit(
                &ctx(Role::Admin),
                CreateLimitRequest {
                    role,
                    currency: Currency::TRY,
                    max_single_amount: single,
                    max_daily_amount: daily,
                },
            )
            .await
            .unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Capability gate
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_checker_cannot_submit_payment() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let result = engine
            .create_payment(&ctx(Role::Checker), payment_req("k1", IBAN_A, IBAN_B, 100))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Forbidden {
                required: Capability::CreatePayment
            })
        ));
    }

    #[tokio::test]
    async fn test_maker_cannot_decide_payment() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let maker = ctx(Role::Maker);
        let payment = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 100))
            .await
            .unwrap();

        let result = engine.approve_payment(&ctx(Role::Maker), payment.id).await;
        assert!(matches!(
            result,
            Err(AppError::Forbidden {
                required: Capability::DecidePayment
            })
        ));
    }

    #[tokio::test]
    async fn test_admin_has_all_capabilities() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let admin = ctx(Role::Admin);
        let payment = engine
            .create_payment(&admin, payment_req("k1", IBAN_A, IBAN_B, 100))
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);

        // A different admin can decide it.
        let settled = engine.approve_payment(&ctx(Role::Admin), payment.id).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Completed);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission and idempotency
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_payment_pending_with_audit() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let maker = ctx(Role::Maker);
        let payment = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 2_500))
            .await
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount.amount(), 2_500);
        assert_eq!(payment.created_by, maker.actor.id);
        assert_eq!(payment.created_by_role, Role::Maker);
        assert!(payment.approved_by.is_none());

        assert!(engine
            .repo()
            .audit_actions()
            .contains(&AuditAction::PaymentCreated));
    }

    #[tokio::test]
    async fn test_replay_returns_existing_payment() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let maker = ctx(Role::Maker);
        let req = payment_req("k1", IBAN_A, IBAN_B, 2_500);

        let first = engine.create_payment(&maker, req.clone()).await.unwrap();
        let second = engine.create_payment(&maker, req).await.unwrap();

        assert_eq!(first.id, second.id);

        // No second PAYMENT_CREATED entry.
        let created = engine
            .repo()
            .audit_actions()
            .iter()
            .filter(|a| **a == AuditAction::PaymentCreated)
            .count();
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_replay_after_decision_returns_decided_payment() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let maker = ctx(Role::Maker);
        let req = payment_req("k1", IBAN_A, IBAN_B, 2_500);
        let payment = engine.create_payment(&maker, req.clone()).await.unwrap();

        engine
            .approve_payment(&ctx(Role::Checker), payment.id)
            .await
            .unwrap();

        let replay = engine.create_payment(&maker, req).await.unwrap();
        assert_eq!(replay.id, payment.id);
        assert_eq!(replay.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_same_key_different_payload_conflicts() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let maker = ctx(Role::Maker);
        engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 2_500))
            .await
            .unwrap();

        let result = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 9_999))
            .await;

        assert!(matches!(
            result,
            Err(AppError::IdempotencyConflict { key }) if key == "k1"
        ));
    }

    #[tokio::test]
    async fn test_replay_with_reformatted_iban_returns_existing() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let maker = ctx(Role::Maker);
        let first = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 2_500))
            .await
            .unwrap();

        // Same logical payload, source IBAN lowercased and spaced.
        let mut replay = payment_req("k1", IBAN_A, IBAN_B, 2_500);
        replay.source_iban = "tr33 0006 1005 1978 6457 8413 26".to_string();

        let second = engine.create_payment(&maker, replay).await.unwrap();
        assert_eq!(second.id, first.id);
    }

    #[tokio::test]
    async fn test_lost_insert_race_resolves_like_replay() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let maker = ctx(Role::Maker);
        let first = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 2_500))
            .await
            .unwrap();

        // Same payload past the lookup: the unique key resolves it as a replay.
        engine.repo().hide_next_key_lookup();
        let second = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 2_500))
            .await
            .unwrap();
        assert_eq!(second.id, first.id);

        let created = engine
            .repo()
            .audit_actions()
            .iter()
            .filter(|a| **a == AuditAction::PaymentCreated)
            .count();
        assert_eq!(created, 1);

        // Different payload past the lookup: the same race is a conflict.
        engine.repo().hide_next_key_lookup();
        let result = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 9_999))
            .await;
        assert!(matches!(
            result,
            Err(AppError::IdempotencyConflict { key }) if key == "k1"
        ));
    }

    #[tokio::test]
    async fn test_create_payment_validation() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;
        let maker = ctx(Role::Maker);

        // Non-positive amount.
        let result = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 0))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        // Same source and target.
        let result = engine
            .create_payment(&maker, payment_req("k2", IBAN_A, IBAN_A, 100))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        // Unknown target account.
        let result = engine
            .create_payment(&maker, payment_req("k3", IBAN_A, IBAN_C, 100))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        // Malformed IBAN.
        let mut req = payment_req("k4", IBAN_A, IBAN_B, 100);
        req.target_iban = "TR00NOTVALID".to_string();
        let result = engine.create_payment(&maker, req).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        // Blank idempotency key.
        let result = engine
            .create_payment(&maker, payment_req("  ", IBAN_A, IBAN_B, 100))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_inactive_source_rejected_at_submission() {
        let engine = engine();
        let source = seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        engine
            .deactivate_account(&ctx(Role::Admin), source.id)
            .await
            .unwrap();

        let result = engine
            .create_payment(&ctx(Role::Maker), payment_req("k1", IBAN_A, IBAN_B, 100))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Approval, rejection, settlement
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_approve_settles_and_moves_funds() {
        let engine = engine();
        let source = seed_account(&engine, IBAN_A, 10_000).await;
        let target = seed_account(&engine, IBAN_B, 500).await;

        let maker = ctx(Role::Maker);
        let checker = ctx(Role::Checker);

        let payment = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 3_000))
            .await
            .unwrap();

        let settled = engine.approve_payment(&checker, payment.id).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Completed);
        assert_eq!(settled.approved_by, Some(checker.actor.id));

        let src = engine.get_account(&maker, source.id).await.unwrap();
        let tgt = engine.get_account(&maker, target.id).await.unwrap();
        assert_eq!(src.balance.amount(), 7_000);
        assert_eq!(tgt.balance.amount(), 3_500);

        let actions = engine.repo().audit_actions();
        assert!(actions.contains(&AuditAction::PaymentApproved));
        assert!(actions.contains(&AuditAction::PaymentCompleted));
    }

    #[tokio::test]
    async fn test_self_approval_forbidden() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let admin = ctx(Role::Admin);
        let payment = engine
            .create_payment(&admin, payment_req("k1", IBAN_A, IBAN_B, 100))
            .await
            .unwrap();

        // Admins hold both capabilities but still cannot decide their own.
        let approve = engine.approve_payment(&admin, payment.id).await;
        assert!(matches!(approve, Err(AppError::SelfApproval)));

        let reject = engine
            .reject_payment(
                &admin,
                payment.id,
                RejectPaymentRequest {
                    reason: "mine".to_string(),
                },
            )
            .await;
        assert!(matches!(reject, Err(AppError::SelfApproval)));
    }

    #[tokio::test]
    async fn test_insufficient_funds_marks_failed() {
        let engine = engine();
        let source = seed_account(&engine, IBAN_A, 1_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let maker = ctx(Role::Maker);
        let payment = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 5_000))
            .await
            .unwrap();

        let result = engine
            .approve_payment(&ctx(Role::Checker), payment.id)
            .await
            .unwrap();

        assert_eq!(result.status, PaymentStatus::Failed);
        assert!(result.failure_reason.is_some());

        // Balances untouched.
        let src = engine.get_account(&maker, source.id).await.unwrap();
        assert_eq!(src.balance.amount(), 1_000);

        // FAILED is terminal: a second approval attempt reports the state.
        let again = engine.approve_payment(&ctx(Role::Checker), payment.id).await;
        assert!(matches!(
            again,
            Err(AppError::InvalidState {
                current: PaymentStatus::Failed
            })
        ));

        assert!(engine
            .repo()
            .audit_actions()
            .contains(&AuditAction::PaymentFailed));
    }

    #[tokio::test]
    async fn test_source_deactivated_after_submission_fails_settlement() {
        let engine = engine();
        let source = seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let payment = engine
            .create_payment(&ctx(Role::Maker), payment_req("k1", IBAN_A, IBAN_B, 100))
            .await
            .unwrap();

        engine
            .deactivate_account(&ctx(Role::Admin), source.id)
            .await
            .unwrap();

        let result = engine
            .approve_payment(&ctx(Role::Checker), payment.id)
            .await
            .unwrap();
        assert_eq!(result.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_reject_requires_reason() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let payment = engine
            .create_payment(&ctx(Role::Maker), payment_req("k1", IBAN_A, IBAN_B, 100))
            .await
            .unwrap();

        let result = engine
            .reject_payment(
                &ctx(Role::Checker),
                payment.id,
                RejectPaymentRequest {
                    reason: "   ".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_reject_then_approve_reports_state() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let payment = engine
            .create_payment(&ctx(Role::Maker), payment_req("k1", IBAN_A, IBAN_B, 100))
            .await
            .unwrap();

        let rejected = engine
            .reject_payment(
                &ctx(Role::Checker),
                payment.id,
                RejectPaymentRequest {
                    reason: "wrong beneficiary".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, PaymentStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("wrong beneficiary"));

        let approve = engine
            .approve_payment(&ctx(Role::Checker), payment.id)
            .await;
        assert!(matches!(
            approve,
            Err(AppError::InvalidState {
                current: PaymentStatus::Rejected
            })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_decisions_exactly_one_wins() {
        let engine = Arc::new(engine());
        seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let payment = engine
            .create_payment(&ctx(Role::Maker), payment_req("k1", IBAN_A, IBAN_B, 100))
            .await
            .unwrap();

        let approver = engine.clone();
        let rejecter = engine.clone();
        let id = payment.id;

        let approve = tokio::spawn(async move {
            approver.approve_payment(&ctx(Role::Checker), id).await
        });
        let reject = tokio::spawn(async move {
            rejecter
                .reject_payment(
                    &ctx(Role::Checker),
                    id,
                    RejectPaymentRequest {
                        reason: "race".to_string(),
                    },
                )
                .await
        });

        let outcomes = [approve.await.unwrap(), reject.await.unwrap()];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);

        let loser = outcomes.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            loser,
            Err(AppError::InvalidState { .. })
        ));

        // Exactly one terminal decision entry for the pair.
        let decisions = engine
            .repo()
            .audit_actions()
            .iter()
            .filter(|a| {
                matches!(
                    a,
                    AuditAction::PaymentApproved | AuditAction::PaymentRejected
                )
            })
            .count();
        assert_eq!(decisions, 1);
    }

    #[tokio::test]
    async fn test_version_conflict_marks_failed_without_retry() {
        let engine = engine();
        let source = seed_account(&engine, IBAN_A, 10_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let payment = engine
            .create_payment(&ctx(Role::Maker), payment_req("k1", IBAN_A, IBAN_B, 1_000))
            .await
            .unwrap();

        engine
            .repo()
            .inject_settle_failure(LedgerError::VersionConflict(source.id));

        let result = engine
            .approve_payment(&ctx(Role::Checker), payment.id)
            .await
            .unwrap();

        // The conflict surfaces as FAILED, never as a hidden retry.
        assert_eq!(result.status, PaymentStatus::Failed);
        assert!(result
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("Concurrent modification"));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Limits
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_single_limit_blocks_submission() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 100_000).await;
        seed_account(&engine, IBAN_B, 0).await;
        seed_limit(&engine, Role::Maker, 1_000, 5_000).await;

        let result = engine
            .create_payment(&ctx(Role::Maker), payment_req("k1", IBAN_A, IBAN_B, 1_001))
            .await;

        assert!(matches!(
            result,
            Err(AppError::LimitExceeded {
                scope: LimitScope::Single,
                limit: 1_000,
                attempted: 1_001,
            })
        ));
    }

    #[tokio::test]
    async fn test_daily_limit_counts_approved_only() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 1_000_000).await;
        seed_account(&engine, IBAN_B, 0).await;
        seed_limit(&engine, Role::Maker, 1_000, 5_000).await;

        let maker = ctx(Role::Maker);
        let checker = ctx(Role::Checker);

        // Five submissions of 1000 each, all approved and settled.
        for i in 0..5 {
            let payment = engine
                .create_payment(&maker, payment_req(&format!("k{i}"), IBAN_A, IBAN_B, 1_000))
                .await
                .unwrap();
            let settled = engine.approve_payment(&checker, payment.id).await.unwrap();
            assert_eq!(settled.status, PaymentStatus::Completed);
        }

        // The sixth breaches the daily ceiling at submission.
        let sixth = engine
            .create_payment(&maker, payment_req("k5", IBAN_A, IBAN_B, 1_000))
            .await;
        assert!(matches!(
            sixth,
            Err(AppError::LimitExceeded {
                scope: LimitScope::Daily,
                limit: 5_000,
                attempted: 6_000,
            })
        ));
    }

    #[tokio::test]
    async fn test_pending_payments_do_not_consume_daily_limit() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 1_000_000).await;
        seed_account(&engine, IBAN_B, 0).await;
        seed_limit(&engine, Role::Maker, 3_000, 5_000).await;

        let maker = ctx(Role::Maker);

        // Two pendings worth 6000 together: both accepted, since PENDING
        // does not consume the window.
        let first = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 3_000))
            .await
            .unwrap();
        let second = engine
            .create_payment(&maker, payment_req("k2", IBAN_A, IBAN_B, 3_000))
            .await
            .unwrap();

        // First approval consumes 3000 of the window.
        let checker = ctx(Role::Checker);
        engine.approve_payment(&checker, first.id).await.unwrap();

        // Re-validation at approval now catches the second.
        let result = engine.approve_payment(&checker, second.id).await;
        assert!(matches!(
            result,
            Err(AppError::LimitExceeded {
                scope: LimitScope::Daily,
                ..
            })
        ));

        // The payment stays PENDING; it was not failed.
        let still = engine.get_payment(&maker, second.id).await.unwrap();
        assert_eq!(still.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_limit_breach_at_decision_time_is_audited() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 1_000_000).await;
        seed_account(&engine, IBAN_B, 0).await;
        seed_limit(&engine, Role::Maker, 3_000, 5_000).await;

        let maker = ctx(Role::Maker);
        let checker = ctx(Role::Checker);

        let first = engine
            .create_payment(&maker, payment_req("k1", IBAN_A, IBAN_B, 3_000))
            .await
            .unwrap();
        let second = engine
            .create_payment(&maker, payment_req("k2", IBAN_A, IBAN_B, 3_000))
            .await
            .unwrap();

        engine.approve_payment(&checker, first.id).await.unwrap();
        let result = engine.approve_payment(&checker, second.id).await;
        assert!(matches!(result, Err(AppError::LimitExceeded { .. })));

        // The refused decision leaves its own trace.
        let breaches: Vec<AuditLog> = engine
            .repo()
            .state
            .lock()
            .unwrap()
            .audits
            .iter()
            .filter(|e| e.action == AuditAction::PaymentLimitBreached)
            .cloned()
            .collect();
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].entity_id, *second.id.as_uuid());
        assert_eq!(breaches[0].performed_by, checker.actor.id);
    }

    #[tokio::test]
    async fn test_limits_scoped_to_maker_role() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 1_000_000).await;
        seed_account(&engine, IBAN_B, 0).await;
        seed_limit(&engine, Role::Maker, 1_000, 5_000).await;

        // An admin maker is not bound by the Maker limit.
        let payment = engine
            .create_payment(&ctx(Role::Admin), payment_req("k1", IBAN_A, IBAN_B, 50_000))
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_limit_policy() {
        // Unrestricted: absent limit row means no ceiling.
        let engine_open = engine();
        seed_account(&engine_open, IBAN_A, 1_000_000).await;
        seed_account(&engine_open, IBAN_B, 0).await;
        let payment = engine_open
            .create_payment(&ctx(Role::Maker), payment_req("k1", IBAN_A, IBAN_B, 500_000))
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);

        // Deny: absent limit row blocks submission.
        let engine_deny = deny_engine();
        seed_account(&engine_deny, IBAN_A, 1_000_000).await;
        seed_account(&engine_deny, IBAN_B, 0).await;
        let result = engine_deny
            .create_payment(&ctx(Role::Maker), payment_req("k1", IBAN_A, IBAN_B, 100))
            .await;
        assert!(matches!(result, Err(AppError::LimitExceeded { .. })));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_pending_inbox_excludes_own_submissions() {
        let engine = engine();
        seed_account(&engine, IBAN_A, 1_000_000).await;
        seed_account(&engine, IBAN_B, 0).await;

        let admin = ctx(Role::Admin);
        let other = ctx(Role::Maker);

        engine
            .create_payment(&admin, payment_req("k1", IBAN_A, IBAN_B, 100))
            .await
            .unwrap();
        engine
            .create_payment(&other, payment_req("k2", IBAN_A, IBAN_B, 200))
            .await
            .unwrap();

        let inbox = engine
            .pending_payments(&admin, PageRequest::default())
            .await
            .unwrap();

        assert_eq!(inbox.total_elements, 1);
        assert_eq!(inbox.content[0].created_by, other.actor.id);
    }

    #[tokio::test]
    async fn test_audit_search_requires_admin() {
        let engine = engine();

        let result = engine
            .search_audit_logs(
                &ctx(Role::Checker),
                AuditFilter::default(),
                PageRequest::default(),
            )
            .await;
        assert!(matches!(
            result,
            Err(AppError::Forbidden {
                required: Capability::ViewAudit
            })
        ));

        let page = engine
            .search_audit_logs(
                &ctx(Role::Admin),
                AuditFilter::default(),
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total_elements, 0);
    }

    #[tokio::test]
    async fn test_limit_management_requires_admin() {
        let engine = engine();

        let result = engine
            .create_limit(
                &ctx(Role::Maker),
                CreateLimitRequest {
                    role: Role::Maker,
                    currency: Currency::TRY,
                    max_single_amount: 100,
                    max_daily_amount: 200,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden { .. })));

        let limit = seed_limit(&engine, Role::Maker, 100, 200).await;
        let updated = engine
            .update_limit(
                &ctx(Role::Admin),
                limit.id,
                UpdateLimitRequest {
                    max_single_amount: Some(150),
                    max_daily_amount: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.max_single_amount, 150);
    }
}
