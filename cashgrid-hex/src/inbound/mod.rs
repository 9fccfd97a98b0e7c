//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the application layer. Caller
//! identity arrives through trusted headers set by the edge proxy; the
//! adapter never authenticates, it only extracts.

mod context;
mod handlers;
mod server;

pub use context::{CorrelationId, RequestScope};
pub use server::HttpServer;
