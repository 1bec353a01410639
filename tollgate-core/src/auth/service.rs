use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use super::{
    AccessClaims, AccessToken, IssuedRefresh, PasswordHasher,
    RefreshLifecycle, TokenIssuer,
};
use crate::domain::user::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, normalize_email,
    normalize_name, validate_password,
};
use crate::domain::{RevocationReason, Role, User};
use crate::error::AuthError;
use crate::repository::{RepositoryError, UserRepository};

/// Tokens handed out after register, login or refresh.
#[derive(Debug)]
pub struct Session {
    pub access_token: AccessToken,
    pub user: User,
    /// Travels only in the refresh cookie.
    pub refresh: IssuedRefresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created,
    AlreadyExists,
}

/// Orchestrates registration, login, refresh and logout.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    issuer: Arc<TokenIssuer>,
    hasher: PasswordHasher,
    refresh: RefreshLifecycle,
    access_ttl: Duration,
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        issuer: Arc<TokenIssuer>,
        hasher: PasswordHasher,
        refresh: RefreshLifecycle,
        access_ttl: Duration,
    ) -> Self {
        Self {
            users,
            issuer,
            hasher,
            refresh,
            access_ttl,
        }
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    pub fn refresh_lifecycle(&self) -> &RefreshLifecycle {
        &self.refresh
    }

    pub async fn register(
        &self,
        request: RegisterRequest,
    ) -> Result<Session, AuthError> {
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;
        let name = normalize_name(&request.name)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = self.hasher.hash(&request.password).await?;
        let user = User::new(email, name, password_hash, Role::User);
        match self.users.create(&user).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration for the same email.
            Err(RepositoryError::Conflict) => return Err(AuthError::DuplicateEmail),
            Err(err) => return Err(err.into()),
        }

        tracing::info!(user_id = %user.id, "registered user");
        self.start_session(user).await
    }

    /// Unknown emails and wrong passwords fail identically.
    pub async fn login(&self, request: LoginRequest) -> Result<Session, AuthError> {
        let email = request.email.trim().to_lowercase();

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.hasher.verify_dummy(&request.password).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(&request.password, &user.password_hash).await? {
            tracing::debug!(user_id = %user.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "user logged in");
        self.start_session(user).await
    }

    /// Rotate the refresh cookie and mint a new access token.
    pub async fn refresh(
        &self,
        cookie_secret: Option<&str>,
    ) -> Result<Session, AuthError> {
        let secret = cookie_secret
            .filter(|secret| !secret.is_empty())
            .ok_or(AuthError::InvalidCredentials)?;

        let rotation = self.refresh.validate_and_rotate(secret).await?;
        let access_token = self.issue_access(&rotation.owner)?;

        Ok(Session {
            access_token,
            user: rotation.owner,
            refresh: rotation.issued,
        })
    }

    /// Revoke the presented token if there is one. Never reports an invalid
    /// or missing token.
    pub async fn logout(&self, cookie_secret: Option<&str>) -> Result<(), AuthError> {
        let Some(secret) = cookie_secret.filter(|secret| !secret.is_empty())
        else {
            return Ok(());
        };
        self.refresh
            .revoke_secret(secret, RevocationReason::UserLogout)
            .await?;
        Ok(())
    }

    /// End every session of the user. Returns how many tokens were revoked.
    pub async fn logout_everywhere(&self, user_id: Uuid) -> Result<usize, AuthError> {
        let revoked = self
            .refresh
            .revoke_all_for_user(user_id, RevocationReason::LogoutEverywhere)
            .await?;
        Ok(revoked.count)
    }

    /// Replace the password after verifying the current one, then revoke all
    /// refresh tokens of the user.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        validate_password(&request.new_password)?;

        let user = self.current_user(user_id).await?;
        if !self
            .hasher
            .verify(&request.current_password, &user.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = self.hasher.hash(&request.new_password).await?;
        if !self
            .users
            .update_password_hash(user.id, &password_hash)
            .await?
        {
            return Err(AuthError::UserNotFound);
        }

        self.refresh
            .revoke_all_for_user(user.id, RevocationReason::PasswordChange)
            .await?;
        tracing::info!(user_id = %user.id, "password changed");
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        Ok(self.issuer.verify_access_token(token)?)
    }

    /// Create an admin account unless the email is already registered.
    pub async fn seed_admin(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<SeedOutcome, AuthError> {
        let email = normalize_email(email)?;
        validate_password(password)?;
        let name = normalize_name(name)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Ok(SeedOutcome::AlreadyExists);
        }

        let password_hash = self.hasher.hash(password).await?;
        let user = User::new(email, name, password_hash, Role::Admin);
        match self.users.create(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "seeded admin user");
                Ok(SeedOutcome::Created)
            }
            Err(RepositoryError::Conflict) => Ok(SeedOutcome::AlreadyExists),
            Err(err) => Err(err.into()),
        }
    }

    fn issue_access(&self, user: &User) -> Result<AccessToken, AuthError> {
        Ok(self
            .issuer
            .issue_access_token(user.id, user.role, self.access_ttl)?)
    }

    async fn start_session(&self, user: User) -> Result<Session, AuthError> {
        let access_token = self.issue_access(&user)?;
        let refresh = self.refresh.issue(user.id).await?;
        Ok(Session {
            access_token,
            user,
            refresh,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{RefreshPolicy, RevocationPublisher};
    use crate::repository::{
        InMemoryRefreshTokenRepository, InMemoryUserRepository,
    };

    fn service() -> AuthService {
        let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::default());
        let issuer = Arc::new(TokenIssuer::new("service-test-secret-0123456789ab").unwrap());
        let refresh = RefreshLifecycle::new(
            Arc::new(InMemoryRefreshTokenRepository::default()),
            Arc::clone(&users),
            Arc::clone(&issuer),
            RevocationPublisher::disabled(),
            RefreshPolicy::default(),
        );
        AuthService::new(
            users,
            issuer,
            PasswordHasher::insecure_fast().unwrap(),
            refresh,
            Duration::minutes(15),
        )
    }

    fn alice() -> RegisterRequest {
        RegisterRequest {
            email: "alice@example.com".into(),
            password: "secret1".into(),
            name: "Alice".into(),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_then_login_yields_tokens() {
        let service = service();
        let registered = service.register(alice()).await.unwrap();
        assert_eq!(registered.user.role, Role::User);
        assert!(!registered.access_token.token.is_empty());

        let session = service
            .login(login("Alice@Example.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(session.user.id, registered.user.id);
        assert!(!session.access_token.token.is_empty());
        assert!(!session.refresh.secret.is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let service = service();
        service.register(alice()).await.unwrap();
        let err = service.register(alice()).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn short_password_is_a_validation_error() {
        let service = service();
        let mut request = alice();
        request.password = "short".into();
        assert!(matches!(
            service.register(request).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_identically() {
        let service = service();
        service.register(alice()).await.unwrap();

        let wrong = service
            .login(login("alice@example.com", "not-it"))
            .await
            .unwrap_err();
        let unknown = service
            .login(login("nobody@example.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_reuse() {
        let service = service();
        let session = service.register(alice()).await.unwrap();
        let r1 = session.refresh.secret.clone();

        let refreshed = service.refresh(Some(r1.expose())).await.unwrap();
        assert_ne!(refreshed.access_token.token, session.access_token.token);
        assert_ne!(refreshed.refresh.secret, r1);

        assert!(matches!(
            service.refresh(Some(r1.expose())).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(
            service
                .refresh(Some(refreshed.refresh.secret.expose()))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn missing_cookie_is_invalid_credentials() {
        let service = service();
        assert!(matches!(
            service.refresh(None).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            service.refresh(Some("")).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn logout_is_idempotent_and_blocks_refresh() {
        let service = service();
        let session = service.register(alice()).await.unwrap();
        let secret = session.refresh.secret.expose();

        service.logout(Some(secret)).await.unwrap();
        service.logout(Some(secret)).await.unwrap();
        service.logout(Some("garbage")).await.unwrap();
        service.logout(None).await.unwrap();

        assert!(matches!(
            service.refresh(Some(secret)).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn password_change_revokes_sessions_and_swaps_credentials() {
        let service = service();
        let session = service.register(alice()).await.unwrap();
        let other = service
            .login(login("alice@example.com", "secret1"))
            .await
            .unwrap();

        service
            .change_password(
                session.user.id,
                ChangePasswordRequest {
                    current_password: "secret1".into(),
                    new_password: "secret2".into(),
                },
            )
            .await
            .unwrap();

        for secret in [&session.refresh.secret, &other.refresh.secret] {
            assert!(service.refresh(Some(secret.expose())).await.is_err());
        }
        assert!(
            service
                .login(login("alice@example.com", "secret1"))
                .await
                .is_err()
        );
        assert!(
            service
                .login(login("alice@example.com", "secret2"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn password_change_requires_the_current_password() {
        let service = service();
        let session = service.register(alice()).await.unwrap();
        let err = service
            .change_password(
                session.user.id,
                ChangePasswordRequest {
                    current_password: "wrong!".into(),
                    new_password: "secret2".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn seeding_an_admin_is_idempotent() {
        let service = service();
        assert_eq!(
            service
                .seed_admin("root@example.com", "rootpass", "Admin")
                .await
                .unwrap(),
            SeedOutcome::Created
        );
        assert_eq!(
            service
                .seed_admin("root@example.com", "rootpass", "Admin")
                .await
                .unwrap(),
            SeedOutcome::AlreadyExists
        );
        let session = service
            .login(login("root@example.com", "rootpass"))
            .await
            .unwrap();
        assert_eq!(session.user.role, Role::Admin);
    }
}
