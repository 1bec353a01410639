use std::{fmt, sync::Arc};

use anyhow::Context;
use sqlx::PgPool;

use crate::infra::config::Config;
use tollgate_core::auth::{
    PasswordHasher, RefreshLifecycle, RefreshPolicy, RevocationCache,
    RevocationPublisher, TokenIssuer,
};
use tollgate_core::repository::{
    AuditRepository, InMemoryAuditRepository, InMemoryRefreshTokenRepository,
    InMemoryUserRepository, PostgresAuditRepository,
    PostgresRefreshTokenRepository, PostgresUserRepository,
    RefreshTokenRepository, UserRepository,
};
use tollgate_core::{AdminService, AuthService};

/// Durable store handles shared by the services.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl fmt::Debug for Repositories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}

impl Repositories {
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            refresh_tokens: Arc::new(PostgresRefreshTokenRepository::new(
                pool.clone(),
            )),
            audit: Arc::new(PostgresAuditRepository::new(pool.clone())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::default()),
            refresh_tokens: Arc::new(InMemoryRefreshTokenRepository::default()),
            audit: Arc::new(InMemoryAuditRepository::default()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub admin: Arc<AdminService>,
    pub config: Arc<Config>,
    /// Absent when running over in-memory repositories.
    pub postgres: Option<PgPool>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .field("postgres", &self.postgres.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the services from already-connected backends.
    pub fn from_parts(
        config: Arc<Config>,
        repositories: Repositories,
        cache: Option<Arc<dyn RevocationCache>>,
        hasher: PasswordHasher,
        postgres: Option<PgPool>,
    ) -> anyhow::Result<Self> {
        let issuer = Arc::new(
            TokenIssuer::new(config.auth.jwt_secret.as_bytes())
                .context("failed to initialise token issuer")?,
        );

        let policy = RefreshPolicy {
            lifetime: chrono::Duration::from_std(config.auth.refresh_token_ttl)
                .context("REFRESH_TOKEN_TTL out of range")?,
            denylist_ttl: config.auth.revocation_ttl,
            ..RefreshPolicy::default()
        };
        let access_ttl = chrono::Duration::from_std(config.auth.access_token_ttl)
            .context("ACCESS_TOKEN_TTL out of range")?;

        let lifecycle = RefreshLifecycle::new(
            Arc::clone(&repositories.refresh_tokens),
            Arc::clone(&repositories.users),
            Arc::clone(&issuer),
            RevocationPublisher::new(cache),
            policy,
        );

        let auth = AuthService::new(
            Arc::clone(&repositories.users),
            issuer,
            hasher,
            lifecycle,
            access_ttl,
        );
        let admin = AdminService::new(repositories.users, repositories.audit);

        Ok(Self {
            auth: Arc::new(auth),
            admin: Arc::new(admin),
            config,
            postgres,
        })
    }

    pub fn revocations(&self) -> &RevocationPublisher {
        self.auth.refresh_lifecycle().revocations()
    }
}
