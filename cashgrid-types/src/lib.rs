//! # CashGrid Types
//!
//! Domain types and port traits for the maker-checker payment authorization
//! core. This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, Iban, Account, Payment, Limit, AuditLog, Actor)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain, repository and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Account, AccountId, Actor, ActorId, AuditAction, AuditLog, Capability, Currency, Iban, Limit,
    LimitId, MissingLimitPolicy, Money, Payment, PaymentId, PaymentStatus, RequestContext, Role,
};
pub use dto::*;
pub use error::{AppError, DomainError, LedgerError, LimitScope, RepoError};
pub use ports::{PaymentRepository, Settlement};
