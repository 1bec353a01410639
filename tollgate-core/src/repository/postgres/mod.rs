//! Postgres adapters built on runtime-checked `sqlx` queries.

mod audit;
mod refresh_tokens;
mod users;

pub use audit::PostgresAuditRepository;
pub use refresh_tokens::PostgresRefreshTokenRepository;
pub use users::PostgresUserRepository;

use super::RepositoryError;

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() => RepositoryError::Conflict,
            _ => RepositoryError::Backend(anyhow::Error::new(err)),
        }
    }
}
