//! Port traits implemented by storage adapters.

mod repository;

pub use repository::{PaymentRepository, Settlement};
