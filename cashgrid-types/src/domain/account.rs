//! Account domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::iban::Iban;
use super::money::{Currency, Money};
use crate::error::DomainError;

/// Unique identifier for an Account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Creates a new random AccountId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an AccountId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A ledger account holding a balance in a single currency.
///
/// The currency is fixed at creation. Mutation happens only through the
/// ledger during payment execution, guarded by the `version` field
/// (optimistic locking): every balance write bumps the version and is
/// conditional on the version it read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Unique account address used at the API boundary
    pub iban: Iban,
    /// Account owner's display name
    pub owner: String,
    /// Current balance (includes currency information), never negative
    pub balance: Money,
    /// Inactive accounts cannot take part in payments
    pub is_active: bool,
    /// Optimistic-lock version, bumped on every balance write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new active account.
    ///
    /// # Validation
    /// - Owner name cannot be blank
    /// - Opening balance cannot be negative (enforced by `Money`)
    pub fn new(iban: Iban, owner: String, balance: Money) -> Result<Self, DomainError> {
        if owner.trim().is_empty() {
            return Err(DomainError::Validation(
                "Account owner cannot be empty".into(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: AccountId::new(),
            iban,
            owner,
            balance,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstructs an account from storage fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: AccountId,
        iban: Iban,
        owner: String,
        balance: Money,
        is_active: bool,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            iban,
            owner,
            balance,
            is_active,
            version,
            created_at,
            updated_at,
        }
    }

    /// Returns the currency of this account.
    pub fn currency(&self) -> Currency {
        self.balance.currency()
    }

    /// Checks whether the account can cover a debit of `amount`.
    pub fn has_sufficient_funds(&self, amount: &Money) -> bool {
        self.balance.currency() == amount.currency() && self.balance.gte(amount)
    }
}
