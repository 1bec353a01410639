//! Refresh-token lifecycle: issue, validate-and-rotate, revoke.
//!
//! Rotation happens through [`RefreshTokenRepository::rotate`], a conditional
//! update, so two requests presenting the same secret can never both win.

use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::issuer::{IssuerError, MIN_SECRET_BYTES, TokenIssuer};
use super::revocation::{
    BestEffort, DEFAULT_DENYLIST_TTL, DenylistCheck, RevocationPublisher,
};
use super::RefreshSecret;
use crate::domain::{RefreshTokenRecord, RevocationReason, User};
use crate::repository::{
    RefreshTokenRepository, RepositoryError, UserRepository,
};

/// Which check turned a refresh token away. Logged, never shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Denylisted,
    Unknown,
    Revoked,
    Expired,
    OwnerMissing,
    /// Another request consumed the token first.
    AlreadyRotated,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Denylisted => "denylisted",
            Self::Unknown => "unknown",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::OwnerMissing => "owner_missing",
            Self::AlreadyRotated => "already_rotated",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh token rejected ({0})")]
    Invalid(RejectReason),
    #[error(transparent)]
    Issuer(#[from] IssuerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Lifetime and denylist settings.
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    pub lifetime: Duration,
    pub denylist_ttl: StdDuration,
    pub secret_bytes: usize,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            lifetime: Duration::hours(24),
            denylist_ttl: DEFAULT_DENYLIST_TTL,
            secret_bytes: MIN_SECRET_BYTES,
        }
    }
}

impl RefreshPolicy {
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            lifetime,
            ..Self::default()
        }
    }

    /// Denylist entries must outlive any token they shadow.
    pub fn effective_denylist_ttl(&self) -> StdDuration {
        let lifetime = self.lifetime.to_std().unwrap_or_default();
        self.denylist_ttl.max(lifetime)
    }
}

/// A newly persisted refresh token and the raw secret for the cookie.
#[derive(Debug, Clone)]
pub struct IssuedRefresh {
    pub secret: RefreshSecret,
    pub record: RefreshTokenRecord,
}

/// Outcome of a successful rotation.
#[derive(Debug)]
pub struct Rotation {
    pub issued: IssuedRefresh,
    pub owner: User,
    pub propagation: BestEffort,
}

impl Rotation {
    pub fn owner_id(&self) -> Uuid {
        self.owner.id
    }
}

#[derive(Debug)]
pub struct Revoked {
    /// Number of tokens this call moved to revoked.
    pub count: usize,
    pub propagation: BestEffort,
}

#[derive(Clone)]
pub struct RefreshLifecycle {
    tokens: Arc<dyn RefreshTokenRepository>,
    users: Arc<dyn UserRepository>,
    issuer: Arc<TokenIssuer>,
    revocations: RevocationPublisher,
    policy: RefreshPolicy,
}

impl fmt::Debug for RefreshLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshLifecycle")
            .field("revocations", &self.revocations)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RefreshLifecycle {
    pub fn new(
        tokens: Arc<dyn RefreshTokenRepository>,
        users: Arc<dyn UserRepository>,
        issuer: Arc<TokenIssuer>,
        revocations: RevocationPublisher,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            tokens,
            users,
            issuer,
            revocations,
            policy,
        }
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    pub fn revocations(&self) -> &RevocationPublisher {
        &self.revocations
    }

    fn mint(&self, user_id: Uuid) -> Result<IssuedRefresh, IssuerError> {
        let secret = self.issuer.generate_opaque_secret(self.policy.secret_bytes)?;
        let record = RefreshTokenRecord::new(
            self.issuer.hash_secret(secret.expose()),
            user_id,
            Utc::now(),
            self.policy.lifetime,
        );
        Ok(IssuedRefresh { secret, record })
    }

    /// Generate, hash and persist a new live token for `user_id`.
    pub async fn issue(&self, user_id: Uuid) -> Result<IssuedRefresh, RefreshError> {
        let issued = self.mint(user_id)?;
        self.tokens.create(&issued.record).await?;
        tracing::info!(
            user_id = %user_id,
            token_id = %issued.record.id,
            expires_at = %issued.record.expires_at,
            "issued refresh token"
        );
        Ok(issued)
    }

    /// Exchange a presented secret for a replacement, consuming it.
    pub async fn validate_and_rotate(
        &self,
        raw_secret: &str,
    ) -> Result<Rotation, RefreshError> {
        let token_hash = self.issuer.hash_secret(raw_secret);

        // A hit rejects even if the durable record still looks live.
        if self.revocations.check(&token_hash).await == DenylistCheck::Denied {
            return Err(self.reject(RejectReason::Denylisted, None));
        }

        let record = self
            .tokens
            .find_by_hash(&token_hash)
            .await?
            .ok_or_else(|| self.reject(RejectReason::Unknown, None))?;

        if record.revoked {
            tracing::warn!(
                user_id = %record.user_id,
                token_id = %record.id,
                revoked_reason = ?record.revoked_reason,
                "revoked refresh token presented again"
            );
            return Err(self.reject(RejectReason::Revoked, Some(&record)));
        }
        if record.is_expired(Utc::now()) {
            return Err(self.reject(RejectReason::Expired, Some(&record)));
        }

        let owner = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or_else(|| self.reject(RejectReason::OwnerMissing, Some(&record)))?;

        let issued = self.mint(owner.id)?;
        let Some(consumed) = self.tokens.rotate(&token_hash, &issued.record).await?
        else {
            return Err(self.reject(RejectReason::AlreadyRotated, Some(&record)));
        };

        let propagation = self
            .revocations
            .revoke_token(&token_hash, self.policy.effective_denylist_ttl())
            .await;

        tracing::info!(
            user_id = %owner.id,
            old_token_id = %consumed.id,
            new_token_id = %issued.record.id,
            "rotated refresh token"
        );

        Ok(Rotation {
            issued,
            owner,
            propagation,
        })
    }

    /// Revoke a single token by digest. Safe to repeat.
    pub async fn revoke(
        &self,
        token_hash: &str,
        reason: RevocationReason,
    ) -> Result<Revoked, RefreshError> {
        let flipped = self.tokens.revoke_if_active(token_hash, reason).await?;
        let propagation = self
            .revocations
            .revoke_token(token_hash, self.policy.effective_denylist_ttl())
            .await;

        if flipped {
            tracing::info!(reason = %reason, "revoked refresh token");
        } else {
            tracing::debug!(
                reason = %reason,
                "refresh token already revoked or unknown"
            );
        }

        Ok(Revoked {
            count: usize::from(flipped),
            propagation,
        })
    }

    /// Revoke a token given the raw secret presented by the client.
    pub async fn revoke_secret(
        &self,
        raw_secret: &str,
        reason: RevocationReason,
    ) -> Result<Revoked, RefreshError> {
        let token_hash = self.issuer.hash_secret(raw_secret);
        self.revoke(&token_hash, reason).await
    }

    /// Revoke every live token owned by `user_id`.
    pub async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
    ) -> Result<Revoked, RefreshError> {
        let hashes = self.tokens.revoke_all_for_user(user_id, reason).await?;
        let propagation = self
            .revocations
            .revoke_user(user_id, &hashes, self.policy.effective_denylist_ttl())
            .await;

        tracing::info!(
            user_id = %user_id,
            reason = %reason,
            revoked = hashes.len(),
            "revoked all refresh tokens for user"
        );

        Ok(Revoked {
            count: hashes.len(),
            propagation,
        })
    }

    fn reject(
        &self,
        reason: RejectReason,
        record: Option<&RefreshTokenRecord>,
    ) -> RefreshError {
        tracing::debug!(
            reason = %reason,
            token_id = ?record.map(|r| r.id),
            "refresh token rejected"
        );
        RefreshError::Invalid(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::{
        InMemoryRevocationCache, RevocationCache, RevocationEvent,
    };
    use crate::domain::Role;
    use crate::repository::{
        InMemoryRefreshTokenRepository, InMemoryUserRepository,
    };

    struct Harness {
        lifecycle: RefreshLifecycle,
        tokens: InMemoryRefreshTokenRepository,
        users: InMemoryUserRepository,
        cache: InMemoryRevocationCache,
        issuer: Arc<TokenIssuer>,
    }

    fn harness() -> Harness {
        let tokens = InMemoryRefreshTokenRepository::default();
        let users = InMemoryUserRepository::default();
        let cache = InMemoryRevocationCache::default();
        let issuer =
            Arc::new(TokenIssuer::new("lifecycle-test-secret-0123456789").unwrap());
        let lifecycle = RefreshLifecycle::new(
            Arc::new(tokens.clone()),
            Arc::new(users.clone()),
            Arc::clone(&issuer),
            RevocationPublisher::new(Some(Arc::new(cache.clone()))),
            RefreshPolicy::default(),
        );
        Harness {
            lifecycle,
            tokens,
            users,
            cache,
            issuer,
        }
    }

    async fn seed_user(users: &InMemoryUserRepository) -> User {
        let user = User::new(
            format!("{}@example.com", Uuid::now_v7()),
            "Test".into(),
            "hash".into(),
            Role::User,
        );
        users.create(&user).await.unwrap();
        user
    }

    fn assert_rejected(result: Result<Rotation, RefreshError>, expected: RejectReason) {
        match result {
            Err(RefreshError::Invalid(reason)) => assert_eq!(reason, expected),
            other => panic!("expected rejection {expected}, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn issue_persists_only_the_digest() {
        let h = harness();
        let user = seed_user(&h.users).await;
        let issued = h.lifecycle.issue(user.id).await.unwrap();

        assert_ne!(issued.record.token_hash, issued.secret.expose());
        let stored = h
            .tokens
            .find_by_hash(&h.issuer.hash_secret(issued.secret.expose()))
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.revoked);
        assert_eq!(stored.expires_at - stored.issued_at, Duration::hours(24));
    }

    #[tokio::test]
    async fn rotation_replaces_the_token_and_denylists_the_old_one() {
        let h = harness();
        let user = seed_user(&h.users).await;
        let first = h.lifecycle.issue(user.id).await.unwrap();

        let rotation = h
            .lifecycle
            .validate_and_rotate(first.secret.expose())
            .await
            .unwrap();
        assert_eq!(rotation.owner_id(), user.id);
        assert_ne!(rotation.issued.secret, first.secret);
        assert!(rotation.propagation.is_delivered());
        assert!(h.cache.contains(&first.record.token_hash).await);

        let old = h
            .tokens
            .find_by_hash(&first.record.token_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old.revoked_reason, Some(RevocationReason::Rotation));
    }

    #[tokio::test]
    async fn reused_secret_is_rejected_but_its_successor_works() {
        let h = harness();
        let user = seed_user(&h.users).await;
        let first = h.lifecycle.issue(user.id).await.unwrap();
        let second = h
            .lifecycle
            .validate_and_rotate(first.secret.expose())
            .await
            .unwrap();

        assert_rejected(
            h.lifecycle.validate_and_rotate(first.secret.expose()).await,
            RejectReason::Denylisted,
        );
        assert!(
            h.lifecycle
                .validate_and_rotate(second.issued.secret.expose())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn reuse_is_caught_by_the_durable_store_when_cache_is_down() {
        let h = harness();
        let user = seed_user(&h.users).await;
        let first = h.lifecycle.issue(user.id).await.unwrap();

        h.cache.set_offline(true);
        let rotation = h
            .lifecycle
            .validate_and_rotate(first.secret.expose())
            .await
            .unwrap();
        assert!(rotation.propagation.is_failed());

        assert_rejected(
            h.lifecycle.validate_and_rotate(first.secret.expose()).await,
            RejectReason::Revoked,
        );
    }

    #[tokio::test]
    async fn denylist_hit_rejects_even_when_the_record_is_live() {
        let h = harness();
        let user = seed_user(&h.users).await;
        let issued = h.lifecycle.issue(user.id).await.unwrap();
        h.cache
            .deny(&issued.record.token_hash, StdDuration::from_secs(60))
            .await
            .unwrap();

        assert_rejected(
            h.lifecycle.validate_and_rotate(issued.secret.expose()).await,
            RejectReason::Denylisted,
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected_without_revocation() {
        let h = harness();
        let user = seed_user(&h.users).await;
        let secret = h.issuer.generate_opaque_secret(MIN_SECRET_BYTES).unwrap();
        let record = RefreshTokenRecord::new(
            h.issuer.hash_secret(secret.expose()),
            user.id,
            Utc::now() - Duration::hours(25),
            Duration::hours(24),
        );
        h.tokens.create(&record).await.unwrap();

        assert_rejected(
            h.lifecycle.validate_and_rotate(secret.expose()).await,
            RejectReason::Expired,
        );
    }

    #[tokio::test]
    async fn unknown_secret_and_missing_owner_are_rejected() {
        let h = harness();
        assert_rejected(
            h.lifecycle.validate_and_rotate("never-issued").await,
            RejectReason::Unknown,
        );

        let issued = h.lifecycle.issue(Uuid::now_v7()).await.unwrap();
        assert_rejected(
            h.lifecycle.validate_and_rotate(issued.secret.expose()).await,
            RejectReason::OwnerMissing,
        );
    }

    #[tokio::test]
    async fn concurrent_rotations_have_exactly_one_winner() {
        let h = harness();
        let user = seed_user(&h.users).await;
        let issued = h.lifecycle.issue(user.id).await.unwrap();

        let attempts = (0..8).map(|_| {
            let lifecycle = h.lifecycle.clone();
            let secret = issued.secret.clone();
            tokio::spawn(async move {
                lifecycle.validate_and_rotate(secret.expose()).await
            })
        });
        let results = futures::future::join_all(attempts).await;

        let winners = results
            .into_iter()
            .map(|joined| joined.unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_always_denylists() {
        let h = harness();
        let user = seed_user(&h.users).await;
        let issued = h.lifecycle.issue(user.id).await.unwrap();

        let first = h
            .lifecycle
            .revoke_secret(issued.secret.expose(), RevocationReason::UserLogout)
            .await
            .unwrap();
        let second = h
            .lifecycle
            .revoke_secret(issued.secret.expose(), RevocationReason::UserLogout)
            .await
            .unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(second.count, 0);
        assert!(second.propagation.is_delivered());

        let unknown = h
            .lifecycle
            .revoke_secret("never-issued", RevocationReason::UserLogout)
            .await
            .unwrap();
        assert_eq!(unknown.count, 0);
        assert!(h.cache.contains(&h.issuer.hash_secret("never-issued")).await);
    }

    #[tokio::test]
    async fn revoke_all_invalidates_every_live_token() {
        let h = harness();
        let user = seed_user(&h.users).await;
        let a = h.lifecycle.issue(user.id).await.unwrap();
        let b = h.lifecycle.issue(user.id).await.unwrap();

        let revoked = h
            .lifecycle
            .revoke_all_for_user(user.id, RevocationReason::LogoutEverywhere)
            .await
            .unwrap();
        assert_eq!(revoked.count, 2);

        for issued in [a, b] {
            assert!(
                h.lifecycle
                    .validate_and_rotate(issued.secret.expose())
                    .await
                    .is_err()
            );
        }
        assert!(
            h.cache
                .published()
                .await
                .contains(&RevocationEvent::User { user_id: user.id })
        );
    }

    #[test]
    fn denylist_ttl_never_undercuts_token_lifetime() {
        let policy = RefreshPolicy {
            lifetime: Duration::days(60),
            denylist_ttl: StdDuration::from_secs(60),
            secret_bytes: MIN_SECRET_BYTES,
        };
        assert_eq!(
            policy.effective_denylist_ttl(),
            StdDuration::from_secs(60 * 24 * 60 * 60)
        );
        assert_eq!(
            RefreshPolicy::default().effective_denylist_ttl(),
            DEFAULT_DENYLIST_TTL
        );
    }
}
