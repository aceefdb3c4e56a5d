//! osync-daemon library target.
//!
//! Exposes the router, gate and state for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod gate;
pub mod routes;
pub mod state;
