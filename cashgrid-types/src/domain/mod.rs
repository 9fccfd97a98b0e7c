//! Pure domain types - no IO, no framework dependencies.

mod account;
mod actor;
mod audit;
mod iban;
mod limit;
mod money;
mod payment;

pub use account::{Account, AccountId};
pub use actor::{Actor, ActorId, Capability, RequestContext, Role};
pub use audit::{AuditAction, AuditLog};
pub use iban::Iban;
pub use limit::{Limit, LimitId, MissingLimitPolicy};
pub use money::{Currency, Money};
pub use payment::{Payment, PaymentId, PaymentStatus};
