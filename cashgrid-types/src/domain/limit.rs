//! Spending-limit domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::Role;
use super::money::Currency;
use crate::error::DomainError;

/// Unique identifier for a Limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LimitId(Uuid);

impl LimitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LimitId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LimitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LimitId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Spending ceilings for one (role, currency) pair.
///
/// At most one limit exists per pair (unique constraint in storage). Amounts
/// are minor units of `currency`. The daily ceiling aggregates over a rolling
/// 24-hour window, not a calendar day, and counts only APPROVED and COMPLETED
/// payments of the maker - PENDING ones do not count toward the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limit {
    pub id: LimitId,
    pub role: Role,
    pub currency: Currency,
    /// Ceiling for a single payment, minor units
    pub max_single_amount: i64,
    /// Ceiling for the rolling 24h cumulative total, minor units
    pub max_daily_amount: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Limit {
    /// Creates a new active limit.
    ///
    /// # Validation
    /// - both ceilings must be strictly positive
    /// - the single ceiling cannot exceed the daily one
    pub fn new(
        role: Role,
        currency: Currency,
        max_single_amount: i64,
        max_daily_amount: i64,
    ) -> Result<Self, DomainError> {
        if max_single_amount <= 0 || max_daily_amount <= 0 {
            return Err(DomainError::Validation(
                "Limit amounts must be positive".into(),
            ));
        }
        if max_single_amount > max_daily_amount {
            return Err(DomainError::Validation(
                "Single-transaction limit cannot exceed the daily limit".into(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: LimitId::new(),
            role,
            currency,
            max_single_amount,
            max_daily_amount,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstructs a limit from storage fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: LimitId,
        role: Role,
        currency: Currency,
        max_single_amount: i64,
        max_daily_amount: i64,
        is_active: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            role,
            currency,
            max_single_amount,
            max_daily_amount,
            is_active,
            created_at,
            updated_at,
        }
    }
}

/// What the engine does when no active limit exists for a (role, currency)
/// pair. An explicit policy choice, configured at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingLimitPolicy {
    /// No limit row means unrestricted spending (default).
    Unrestricted,
    /// No limit row means every payment for that pair is refused.
    Deny,
}

impl Default for MissingLimitPolicy {
    fn default() -> Self {
        MissingLimitPolicy::Unrestricted
    }
}

impl std::str::FromStr for MissingLimitPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unrestricted" => Ok(MissingLimitPolicy::Unrestricted),
            "deny" => Ok(MissingLimitPolicy::Deny),
            other => Err(DomainError::Validation(format!(
                "Unknown missing-limit policy: {other}"
            ))),
        }
    }
}
