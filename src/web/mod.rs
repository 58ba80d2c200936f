//! Diagnostic HTTP surface
//!
//! Read-only view of the configured buttons plus simulated presses.

mod handlers;
mod routes;

pub use routes::create_router;
