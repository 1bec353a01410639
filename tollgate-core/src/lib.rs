//! # Tollgate Core
//!
//! Credential handling, token issuance and the refresh-token lifecycle for
//! the Tollgate authentication server.
//!
//! ## Overview
//!
//! - **Token Issuer**: signed short-lived access tokens plus opaque refresh
//!   secrets and their storage digests
//! - **Refresh lifecycle**: issue, validate-and-rotate, revoke and bulk
//!   revocation against a durable store
//! - **Revocation cache**: optional fast-path denylist with cross-instance
//!   notifications, treated strictly as best-effort
//! - **Services**: [`AuthService`] and [`AdminService`] orchestrate the flows
//!   used by the HTTP layer
//!
//! ## Feature Flags
//!
//! - `database` (default): Postgres repositories, the Redis revocation cache
//!   and the embedded [`MIGRATOR`]
//! - `postgres-tests`: runs the Postgres adapter tests against a live
//!   database

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Admin-only operations and the audit trail
pub mod admin;
/// Token issuance, password hashing and the refresh-token lifecycle
pub mod auth;
/// Domain types shared across the crate
pub mod domain;
/// Service-level error taxonomy
pub mod error;
/// Durable store ports and adapters
pub mod repository;

pub use admin::{AdminService, UserStats};
pub use auth::service::{AuthService, Session};
pub use domain::{AdminAudit, RefreshTokenRecord, RevocationReason, Role, User};
pub use error::AuthError;

/// Embedded schema migrations for the Postgres store.
#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
