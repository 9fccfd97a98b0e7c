//! Data Transfer Objects for requests, filters and pagination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ActorId, AuditAction, Currency, PaymentStatus, Role};

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a new payment (maker side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    /// Client-supplied at-most-once token
    pub idempotency_key: String,
    /// Source account IBAN (whitespace and case are normalized)
    pub source_iban: String,
    /// Target account IBAN
    pub target_iban: String,
    /// Amount in smallest currency unit, strictly positive
    pub amount: i64,
    /// Defaults to TRY when omitted
    #[serde(default = "default_currency")]
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_currency() -> Currency {
    Currency::TRY
}

/// Request to reject a pending payment (checker side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectPaymentRequest {
    /// Mandatory, non-blank rejection reason; recorded verbatim in the audit
    /// trail
    pub reason: String,
}

/// Filter for payment listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentFilter {
    /// Only payments in this status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    /// Only payments created by this actor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ActorId>,
    /// Checker inbox view: PENDING payments NOT created by this actor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_for: Option<ActorId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Account DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub iban: String,
    pub owner: String,
    #[serde(default = "default_currency")]
    pub currency: Currency,
    /// Opening balance in smallest currency unit, non-negative
    #[serde(default)]
    pub opening_balance: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Limit DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a limit for a (role, currency) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLimitRequest {
    pub role: Role,
    #[serde(default = "default_currency")]
    pub currency: Currency,
    pub max_single_amount: i64,
    pub max_daily_amount: i64,
}

/// Partial update of a limit's ceilings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLimitRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_single_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_daily_amount: Option<i64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Filter for audit-trail queries. All fields combine with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<AuditAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performed_by: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pagination
// ─────────────────────────────────────────────────────────────────────────────

/// Zero-based page request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, 200),
        }
    }

    pub fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }

    pub fn limit(&self) -> i64 {
        self.size as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, size: 20 }
    }
}

/// One page of results plus paging metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub last: bool,
}

impl<T> Page<T> {
    /// Assembles a page from a slice of results and the total match count.
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let total_pages = if total_elements == 0 {
            0
        } else {
            total_elements.div_ceil(request.size as u64) as u32
        };
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages,
            last: request.page + 1 >= total_pages.max(1),
        }
    }
}
