use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{info, warn};

use crate::infra::{
    app_state::{AppState, Repositories},
    config::{Config, RedisConfig},
};
use tollgate_core::auth::service::SeedOutcome;
use tollgate_core::auth::{PasswordHasher, RedisRevocationCache, RevocationCache};

/// Bound on the Redis connect plus `PING` performed at startup.
pub const CACHE_STARTUP_TIMEOUT: Duration = Duration::from_secs(3);
const DATABASE_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn connect_postgres(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(DATABASE_ACQUIRE_TIMEOUT)
        .connect(&config.database.url)
        .await
        .context("failed to connect to PostgreSQL")
}

/// Connect to Redis when configured. A configured cache that does not answer
/// `PING` is fatal.
pub async fn connect_cache(
    redis: Option<&RedisConfig>,
) -> Result<Option<Arc<dyn RevocationCache>>> {
    let Some(redis) = redis else {
        warn!("REDIS_URL not set; revocation cache disabled");
        return Ok(None);
    };

    let cache = RedisRevocationCache::connect(&redis.url, redis.timeout)
        .await
        .context("failed to connect to Redis")?;
    tokio::time::timeout(CACHE_STARTUP_TIMEOUT, cache.ping())
        .await
        .context("Redis did not answer PING in time")?
        .context("Redis PING failed")?;

    info!("connected to revocation cache");
    let cache: Arc<dyn RevocationCache> = Arc::new(cache);
    Ok(Some(cache))
}

/// Connect every backend and build the production state.
pub async fn build_state(config: Arc<Config>) -> Result<AppState> {
    let pool = connect_postgres(&config).await?;
    info!("connected to PostgreSQL");

    tollgate_core::MIGRATOR
        .run(&pool)
        .await
        .context("failed to apply database migrations")?;

    let cache = connect_cache(config.redis.as_ref()).await?;
    let hasher = PasswordHasher::new().context("invalid Argon2 parameters")?;

    AppState::from_parts(
        config,
        Repositories::postgres(&pool),
        cache,
        hasher,
        Some(pool),
    )
}

#[async_trait]
pub trait StartupHooks: Send + Sync {
    async fn run(&self, state: &AppState) -> Result<()>;
}

/// Seeds the configured admin account.
#[derive(Debug, Default)]
pub struct ProdStartupHooks;

#[async_trait]
impl StartupHooks for ProdStartupHooks {
    async fn run(&self, state: &AppState) -> Result<()> {
        let Some(seed) = state.config.admin_seed.as_ref() else {
            return Ok(());
        };

        match state
            .auth
            .seed_admin(&seed.email, &seed.password, &seed.name)
            .await
            .context("failed to seed admin user")?
        {
            SeedOutcome::Created => info!(email = %seed.email, "admin user seeded"),
            SeedOutcome::AlreadyExists => {
                info!(email = %seed.email, "admin user already present")
            }
        }
        Ok(())
    }
}
