//! # Tollgate Server
//!
//! HTTP surface for the Tollgate authentication service: registration,
//! login, refresh-cookie rotation, logout and admin tooling over
//! [`tollgate_core`].

pub mod handlers;
pub mod infra;
pub mod middleware;
pub mod routes;

pub use infra::app_state::AppState;
