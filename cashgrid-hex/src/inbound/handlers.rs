//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use cashgrid_types::{
    AccountId, ActorId, AppError, AuditAction, AuditFilter, CreateAccountRequest,
    CreateLimitRequest, CreatePaymentRequest, LimitId, PageRequest, PaymentFilter, PaymentId,
    PaymentRepository, PaymentStatus, RejectPaymentRequest, UpdateLimitRequest,
};

use super::context::RequestScope;
use crate::PaymentEngine;

/// Application state shared across handlers.
pub struct AppState<R: PaymentRepository> {
    pub engine: PaymentEngine<R>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden { .. } | AppError::SelfApproval => StatusCode::FORBIDDEN,
            AppError::IdempotencyConflict { .. } | AppError::InvalidState { .. } => {
                StatusCode::CONFLICT
            }
            AppError::LimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.0.to_string(),
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query parameters
// ─────────────────────────────────────────────────────────────────────────────

fn default_size() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.size)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub status: Option<PaymentStatus>,
    pub created_by: Option<ActorId>,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub action: Option<AuditAction>,
    pub performed_by: Option<ActorId>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub correlation_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────────────────────────

/// Submit a payment for approval.
#[tracing::instrument(skip(state, scope, req), fields(idempotency_key = %req.idempotency_key))]
pub async fn create_payment<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state.engine.create_payment(&scope.0, req).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Approve a pending payment.
#[tracing::instrument(skip(state, scope), fields(payment_id = %id))]
pub async fn approve_payment<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state
        .engine
        .approve_payment(&scope.0, PaymentId::from_uuid(id))
        .await?;
    Ok(Json(payment))
}

/// Reject a pending payment.
#[tracing::instrument(skip(state, scope, req), fields(payment_id = %id))]
pub async fn reject_payment<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state
        .engine
        .reject_payment(&scope.0, PaymentId::from_uuid(id), req)
        .await?;
    Ok(Json(payment))
}

/// Get a payment by ID.
#[tracing::instrument(skip(state, scope), fields(payment_id = %id))]
pub async fn get_payment<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state
        .engine
        .get_payment(&scope.0, PaymentId::from_uuid(id))
        .await?;
    Ok(Json(payment))
}

/// List payments, filtered and paginated.
#[tracing::instrument(skip(state, scope, query))]
pub async fn list_payments<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = PaymentFilter {
        status: query.status,
        created_by: query.created_by,
        pending_for: None,
    };
    let page = state
        .engine
        .list_payments(&scope.0, filter, PageRequest::new(query.page, query.size))
        .await?;
    Ok(Json(page))
}

/// The caller's approval inbox.
#[tracing::instrument(skip(state, scope, query))]
pub async fn pending_payments<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .engine
        .pending_payments(&scope.0, query.request())
        .await?;
    Ok(Json(page))
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────────────────────────

/// Create an account.
#[tracing::instrument(skip(state, scope, req), fields(iban = %req.iban))]
pub async fn create_account<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.engine.create_account(&scope.0, req).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Get an account by ID.
#[tracing::instrument(skip(state, scope), fields(account_id = %id))]
pub async fn get_account<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .engine
        .get_account(&scope.0, AccountId::from_uuid(id))
        .await?;
    Ok(Json(account))
}

/// List all accounts.
#[tracing::instrument(skip(state, scope))]
pub async fn list_accounts<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.engine.list_accounts(&scope.0).await?;
    Ok(Json(accounts))
}

/// Deactivate an account.
#[tracing::instrument(skip(state, scope), fields(account_id = %id))]
pub async fn deactivate_account<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .engine
        .deactivate_account(&scope.0, AccountId::from_uuid(id))
        .await?;
    Ok(Json(account))
}

// ─────────────────────────────────────────────────────────────────────────────
// Limits
// ─────────────────────────────────────────────────────────────────────────────

/// Create a limit for a (role, currency) pair.
#[tracing::instrument(skip(state, scope, req))]
pub async fn create_limit<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Json(req): Json<CreateLimitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = state.engine.create_limit(&scope.0, req).await?;
    Ok((StatusCode::CREATED, Json(limit)))
}

/// Update a limit's ceilings.
#[tracing::instrument(skip(state, scope, req), fields(limit_id = %id))]
pub async fn update_limit<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLimitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = state
        .engine
        .update_limit(&scope.0, LimitId::from_uuid(id), req)
        .await?;
    Ok(Json(limit))
}

/// List all limits.
#[tracing::instrument(skip(state, scope))]
pub async fn list_limits<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
) -> Result<impl IntoResponse, ApiError> {
    let limits = state.engine.list_limits(&scope.0).await?;
    Ok(Json(limits))
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit trail
// ─────────────────────────────────────────────────────────────────────────────

/// Search the audit trail.
#[tracing::instrument(skip(state, scope, query))]
pub async fn search_audit_logs<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    scope: RequestScope,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = AuditFilter {
        action: query.action,
        performed_by: query.performed_by,
        entity_type: query.entity_type,
        entity_id: query.entity_id,
        correlation_id: query.correlation_id,
        from: query.from,
        to: query.to,
    };
    let page = state
        .engine
        .search_audit_logs(&scope.0, filter, PageRequest::new(query.page, query.size))
        .await?;
    Ok(Json(page))
}
