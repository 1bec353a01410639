use thiserror::Error;

use crate::auth::{IssuerError, PasswordError, RefreshError};
use crate::domain::ValidationError;
use crate::repository::RepositoryError;

/// Errors surfaced by [`AuthService`](crate::AuthService) and
/// [`AdminService`](crate::AdminService).
///
/// `InvalidCredentials` deliberately covers unknown users, wrong passwords and
/// every refresh-token rejection.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("User not found")]
    UserNotFound,
    #[error("Internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict => {
                Self::Internal(anyhow::anyhow!("unexpected uniqueness conflict"))
            }
            RepositoryError::Backend(err) => Self::Internal(err),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        Self::internal(err)
    }
}

impl From<IssuerError> for AuthError {
    fn from(err: IssuerError) -> Self {
        match err {
            IssuerError::InvalidToken(_) => Self::Unauthenticated,
            other => Self::internal(other),
        }
    }
}

impl From<RefreshError> for AuthError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Invalid(_) => Self::InvalidCredentials,
            RefreshError::Issuer(err) => Self::internal(err),
            RefreshError::Repository(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RejectReason;

    #[test]
    fn every_refresh_rejection_is_invalid_credentials() {
        for reason in [
            RejectReason::Denylisted,
            RejectReason::Unknown,
            RejectReason::Revoked,
            RejectReason::Expired,
            RejectReason::OwnerMissing,
            RejectReason::AlreadyRotated,
        ] {
            let err = AuthError::from(RefreshError::Invalid(reason));
            assert!(matches!(err, AuthError::InvalidCredentials));
            assert_eq!(err.to_string(), "Invalid credentials");
        }
    }

    #[test]
    fn store_failures_become_internal() {
        let err = AuthError::from(RefreshError::Repository(
            RepositoryError::Backend(anyhow::anyhow!("connection reset")),
        ));
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
