//! Fast-path denylist for refresh-token digests plus cross-instance
//! notifications.
//!
//! The durable store stays authoritative. Everything written here is
//! best-effort: failures are logged and reported as [`BestEffort::Failed`],
//! never as the caller's error. The one exception is a denylist hit, which
//! always rejects.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Key prefix for denylisted refresh-token digests.
pub const DENYLIST_PREFIX: &str = "revoked_rt:";
/// Channel carrying the digest of a single revoked token.
pub const REVOKED_TOKEN_CHANNEL: &str = "revoked_refresh";
/// Channel carrying `user:<id>` when every token of a user is revoked.
pub const REVOKED_USER_CHANNEL: &str = "revoked_refresh_user";

/// Default lifetime of a denylist entry.
pub const DEFAULT_DENYLIST_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationEvent {
    Token { token_hash: String },
    User { user_id: Uuid },
}

impl RevocationEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Token { .. } => REVOKED_TOKEN_CHANNEL,
            Self::User { .. } => REVOKED_USER_CHANNEL,
        }
    }

    pub fn payload(&self) -> String {
        match self {
            Self::Token { token_hash } => token_hash.clone(),
            Self::User { user_id } => format!("user:{user_id}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache call timed out after {0:?}")]
    Timeout(Duration),
    #[error("cache backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Expiring key-value store with publish/subscribe.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RevocationCache: Send + Sync {
    async fn deny(&self, token_hash: &str, ttl: Duration) -> Result<(), CacheError>;
    async fn is_denied(&self, token_hash: &str) -> Result<bool, CacheError>;
    async fn publish(&self, event: &RevocationEvent) -> Result<(), CacheError>;
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Outcome of a side-channel write. Never converted into the primary
/// operation's error.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort {
    Delivered,
    /// No cache is configured.
    Skipped,
    Failed(String),
}

impl BestEffort {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Keep the first failure when folding several outcomes.
    pub fn and(self, other: BestEffort) -> BestEffort {
        match (self, other) {
            (failed @ Self::Failed(_), _) => failed,
            (_, failed @ Self::Failed(_)) => failed,
            (Self::Skipped, _) | (_, Self::Skipped) => Self::Skipped,
            _ => Self::Delivered,
        }
    }

    fn observe(result: Result<(), CacheError>, operation: &'static str) -> Self {
        match result {
            Ok(()) => Self::Delivered,
            Err(err) => {
                tracing::warn!(
                    operation,
                    error = %err,
                    "revocation cache write failed; durable store remains authoritative"
                );
                Self::Failed(err.to_string())
            }
        }
    }
}

/// Result of the fast-path denylist lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenylistCheck {
    Denied,
    Clear,
    /// Cache missing or unreachable; the durable store decides.
    Unknown,
}

/// Optional cache handle shared by the refresh lifecycle.
#[derive(Clone, Default)]
pub struct RevocationPublisher {
    cache: Option<Arc<dyn RevocationCache>>,
}

impl fmt::Debug for RevocationPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevocationPublisher")
            .field("enabled", &self.cache.is_some())
            .finish()
    }
}

impl RevocationPublisher {
    pub fn new(cache: Option<Arc<dyn RevocationCache>>) -> Self {
        Self { cache }
    }

    pub fn disabled() -> Self {
        Self { cache: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub async fn check(&self, token_hash: &str) -> DenylistCheck {
        let Some(cache) = &self.cache else {
            return DenylistCheck::Unknown;
        };
        match cache.is_denied(token_hash).await {
            Ok(true) => DenylistCheck::Denied,
            Ok(false) => DenylistCheck::Clear,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "revocation cache lookup failed; falling back to durable store"
                );
                DenylistCheck::Unknown
            }
        }
    }

    /// Denylist one digest and announce it.
    pub async fn revoke_token(&self, token_hash: &str, ttl: Duration) -> BestEffort {
        let Some(cache) = &self.cache else {
            return BestEffort::Skipped;
        };
        let denied = BestEffort::observe(cache.deny(token_hash, ttl).await, "deny");
        let event = RevocationEvent::Token {
            token_hash: token_hash.to_string(),
        };
        denied.and(BestEffort::observe(cache.publish(&event).await, "publish"))
    }

    /// Denylist every digest of a user and announce a user-scoped event.
    pub async fn revoke_user(
        &self,
        user_id: Uuid,
        token_hashes: &[String],
        ttl: Duration,
    ) -> BestEffort {
        let Some(cache) = &self.cache else {
            return BestEffort::Skipped;
        };
        let mut outcome = BestEffort::Delivered;
        for token_hash in token_hashes {
            outcome = outcome.and(BestEffort::observe(
                cache.deny(token_hash, ttl).await,
                "deny",
            ));
        }
        let event = RevocationEvent::User { user_id };
        outcome.and(BestEffort::observe(cache.publish(&event).await, "publish"))
    }

    pub async fn ping(&self) -> BestEffort {
        match &self.cache {
            Some(cache) => BestEffort::observe(cache.ping().await, "ping"),
            None => BestEffort::Skipped,
        }
    }
}

#[cfg(feature = "database")]
pub use self::redis_cache::RedisRevocationCache;

#[cfg(feature = "database")]
mod redis_cache {
    use std::fmt;
    use std::future::Future;
    use std::time::Duration;

    use anyhow::Context;
    use async_trait::async_trait;
    use redis::RedisResult;
    use redis::aio::ConnectionManager;

    use super::{CacheError, DENYLIST_PREFIX, RevocationCache, RevocationEvent};

    /// Redis-backed denylist. Every command is bounded by `timeout`.
    #[derive(Clone)]
    pub struct RedisRevocationCache {
        conn: ConnectionManager,
        timeout: Duration,
    }

    impl fmt::Debug for RedisRevocationCache {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RedisRevocationCache")
                .field("timeout", &self.timeout)
                .finish_non_exhaustive()
        }
    }

    impl RedisRevocationCache {
        pub async fn connect(
            redis_url: &str,
            timeout: Duration,
        ) -> anyhow::Result<Self> {
            let client = redis::Client::open(redis_url)
                .context("Failed to create Redis client")?;
            let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
                .await
                .context("Timed out connecting to Redis")?
                .context("Failed to create Redis connection manager")?;
            Ok(Self { conn, timeout })
        }

        fn key(token_hash: &str) -> String {
            format!("{DENYLIST_PREFIX}{token_hash}")
        }

        async fn bounded<T>(
            &self,
            call: impl Future<Output = RedisResult<T>>,
        ) -> Result<T, CacheError> {
            tokio::time::timeout(self.timeout, call)
                .await
                .map_err(|_| CacheError::Timeout(self.timeout))?
                .map_err(|err| CacheError::Backend(err.into()))
        }
    }

    #[async_trait]
    impl RevocationCache for RedisRevocationCache {
        async fn deny(&self, token_hash: &str, ttl: Duration) -> Result<(), CacheError> {
            let mut conn = self.conn.clone();
            let mut cmd = redis::cmd("SET");
            cmd.arg(Self::key(token_hash))
                .arg(1)
                .arg("EX")
                .arg(ttl.as_secs().max(1));
            self.bounded(cmd.query_async::<()>(&mut conn)).await
        }

        async fn is_denied(&self, token_hash: &str) -> Result<bool, CacheError> {
            let mut conn = self.conn.clone();
            let mut cmd = redis::cmd("EXISTS");
            cmd.arg(Self::key(token_hash));
            let hits = self.bounded(cmd.query_async::<i64>(&mut conn)).await?;
            Ok(hits > 0)
        }

        async fn publish(&self, event: &RevocationEvent) -> Result<(), CacheError> {
            let mut conn = self.conn.clone();
            let mut cmd = redis::cmd("PUBLISH");
            cmd.arg(event.channel()).arg(event.payload());
            self.bounded(cmd.query_async::<i64>(&mut conn)).await?;
            Ok(())
        }

        async fn ping(&self) -> Result<(), CacheError> {
            let mut conn = self.conn.clone();
            let cmd = redis::cmd("PING");
            self.bounded(cmd.query_async::<String>(&mut conn)).await?;
            Ok(())
        }
    }
}

/// Process-local cache honouring TTLs. Records every published event and can
/// be switched offline to exercise degraded paths.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRevocationCache {
    entries: Arc<Mutex<HashMap<String, Instant>>>,
    events: Arc<Mutex<Vec<RevocationEvent>>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryRevocationCache {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<RevocationEvent> {
        self.events.lock().await.clone()
    }

    pub async fn contains(&self, token_hash: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .get(token_hash)
            .is_some_and(|expires| *expires > now)
    }

    fn ensure_online(&self) -> Result<(), CacheError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Backend(anyhow::anyhow!("cache offline")));
        }
        Ok(())
    }
}

#[async_trait]
impl RevocationCache for InMemoryRevocationCache {
    async fn deny(&self, token_hash: &str, ttl: Duration) -> Result<(), CacheError> {
        self.ensure_online()?;
        self.entries
            .lock()
            .await
            .insert(token_hash.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn is_denied(&self, token_hash: &str) -> Result<bool, CacheError> {
        self.ensure_online()?;
        Ok(self.contains(token_hash).await)
    }

    async fn publish(&self, event: &RevocationEvent) -> Result<(), CacheError> {
        self.ensure_online()?;
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.ensure_online()
    }
}
