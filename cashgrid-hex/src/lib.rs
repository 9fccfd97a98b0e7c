//! # CashGrid Hex
//!
//! Application service layer and HTTP adapter for the payment
//! authorization core.
//!
//! ## Architecture
//!
//! - `service` - Application service (orchestrates domain operations)
//! - `inbound` - HTTP adapter (Axum server)
//!
//! The engine is generic over `R: PaymentRepository`, allowing
//! different repository implementations to be injected.

pub mod inbound;
pub mod service;

mod fingerprint;
mod limits;

#[cfg(test)]
mod service_tests;

pub use service::{EnginePolicy, PaymentEngine};
