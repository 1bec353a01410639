//! Durable store contracts.
//!
//! The refresh-token port exposes conditional writes (`revoke_if_active`,
//! `rotate`) so concurrent callers presenting the same token can never both
//! observe success.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    AdminAudit, RefreshTokenRecord, RevocationReason, Role, User,
};

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use memory::{
    InMemoryAuditRepository, InMemoryRefreshTokenRepository,
    InMemoryUserRepository,
};
#[cfg(feature = "database")]
pub use postgres::{
    PostgresAuditRepository, PostgresRefreshTokenRepository,
    PostgresUserRepository,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A uniqueness constraint rejected the write.
    #[error("record conflicts with an existing entry")]
    Conflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with [`RepositoryError::Conflict`] when the
    /// email is taken.
    async fn create(&self, user: &User) -> RepositoryResult<()>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>>;
    /// Returns `false` when no user has the given id.
    async fn update_role(&self, id: Uuid, role: Role) -> RepositoryResult<bool>;
    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> RepositoryResult<bool>;
    /// All users, oldest first.
    async fn list_all(&self) -> RepositoryResult<Vec<User>>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, record: &RefreshTokenRecord) -> RepositoryResult<()>;

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> RepositoryResult<Option<RefreshTokenRecord>>;

    async fn find_by_user(
        &self,
        user_id: Uuid,
    ) -> RepositoryResult<Vec<RefreshTokenRecord>>;

    /// Revoke the token if it is currently unrevoked. Returns `true` only for
    /// the call that performed the transition.
    async fn revoke_if_active(
        &self,
        token_hash: &str,
        reason: RevocationReason,
    ) -> RepositoryResult<bool>;

    /// Revoke `old_hash` and insert `replacement` as one atomic step.
    ///
    /// Returns the revoked record, or `None` without inserting anything when
    /// the presented token was already revoked, expired or unknown at the
    /// moment of the conditional update.
    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshTokenRecord,
    ) -> RepositoryResult<Option<RefreshTokenRecord>>;

    /// Revoke every unrevoked token owned by the user, returning the hashes
    /// that this call revoked.
    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
    ) -> RepositoryResult<Vec<String>>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn create(&self, entry: &AdminAudit) -> RepositoryResult<()>;
    /// Most recent entries first.
    async fn list(&self, limit: usize) -> RepositoryResult<Vec<AdminAudit>>;
}
