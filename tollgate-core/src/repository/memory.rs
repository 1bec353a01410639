use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AuditRepository, RefreshTokenRepository, RepositoryError,
    RepositoryResult, UserRepository,
};
use crate::domain::{
    AdminAudit, RefreshTokenRecord, RevocationReason, Role, User,
};

/// Process-local user store for tests and single-node development.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> RepositoryResult<()> {
        let mut guard = self.users.lock().await;
        if guard.values().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let guard = self.users.lock().await;
        Ok(guard.values().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let guard = self.users.lock().await;
        Ok(guard.get(&id).cloned())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> RepositoryResult<bool> {
        let mut guard = self.users.lock().await;
        Ok(guard
            .get_mut(&id)
            .map(|user| {
                user.role = role;
                user.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> RepositoryResult<bool> {
        let mut guard = self.users.lock().await;
        Ok(guard
            .get_mut(&id)
            .map(|user| {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn list_all(&self) -> RepositoryResult<Vec<User>> {
        let guard = self.users.lock().await;
        let mut users: Vec<User> = guard.values().cloned().collect();
        users.sort_by_key(|user| (user.created_at, user.id));
        Ok(users)
    }
}

/// Refresh tokens keyed by digest. Every conditional write happens under a
/// single lock acquisition.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRefreshTokenRepository {
    tokens: Arc<Mutex<HashMap<String, RefreshTokenRecord>>>,
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn create(&self, record: &RefreshTokenRecord) -> RepositoryResult<()> {
        let mut guard = self.tokens.lock().await;
        if guard.contains_key(&record.token_hash) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> RepositoryResult<Option<RefreshTokenRecord>> {
        let guard = self.tokens.lock().await;
        Ok(guard.get(token_hash).cloned())
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
    ) -> RepositoryResult<Vec<RefreshTokenRecord>> {
        let guard = self.tokens.lock().await;
        let mut records: Vec<RefreshTokenRecord> = guard
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.issued_at);
        Ok(records)
    }

    async fn revoke_if_active(
        &self,
        token_hash: &str,
        reason: RevocationReason,
    ) -> RepositoryResult<bool> {
        let mut guard = self.tokens.lock().await;
        match guard.get_mut(token_hash) {
            Some(record) if !record.revoked => {
                record.mark_revoked(reason, Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshTokenRecord,
    ) -> RepositoryResult<Option<RefreshTokenRecord>> {
        let mut guard = self.tokens.lock().await;
        let now = Utc::now();

        if guard.contains_key(&replacement.token_hash) {
            return Err(RepositoryError::Conflict);
        }

        let Some(record) = guard.get_mut(old_hash) else {
            return Ok(None);
        };
        if !record.is_live(now) {
            return Ok(None);
        }
        record.mark_revoked(RevocationReason::Rotation, now);
        let revoked = record.clone();

        guard.insert(replacement.token_hash.clone(), replacement.clone());
        Ok(Some(revoked))
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
    ) -> RepositoryResult<Vec<String>> {
        let mut guard = self.tokens.lock().await;
        let now = Utc::now();
        let mut revoked = Vec::new();
        for record in guard
            .values_mut()
            .filter(|record| record.user_id == user_id && !record.revoked)
        {
            record.mark_revoked(reason, now);
            revoked.push(record.token_hash.clone());
        }
        Ok(revoked)
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditRepository {
    entries: Arc<Mutex<Vec<AdminAudit>>>,
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn create(&self, entry: &AdminAudit) -> RepositoryResult<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }

    async fn list(&self, limit: usize) -> RepositoryResult<Vec<AdminAudit>> {
        let guard = self.entries.lock().await;
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(email: &str) -> User {
        User::new(email.into(), "Test".into(), "hash".into(), Role::User)
    }

    fn token(hash: &str, user_id: Uuid) -> RefreshTokenRecord {
        RefreshTokenRecord::new(
            hash.into(),
            user_id,
            Utc::now(),
            Duration::hours(24),
        )
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let repo = InMemoryUserRepository::default();
        repo.create(&user("a@example.com")).await.unwrap();
        let err = repo.create(&user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict));
    }

    #[tokio::test]
    async fn find_by_user_lists_only_the_owners_tokens_oldest_first() {
        let repo = InMemoryRefreshTokenRepository::default();
        let owner = Uuid::now_v7();
        let other = Uuid::now_v7();
        let now = Utc::now();
        for (hash, user_id, age) in [
            ("newest", owner, 1),
            ("foreign", other, 2),
            ("oldest", owner, 30),
            ("middle", owner, 10),
        ] {
            let record = RefreshTokenRecord::new(
                hash.into(),
                user_id,
                now - Duration::minutes(age),
                Duration::hours(24),
            );
            repo.create(&record).await.unwrap();
        }
        repo.revoke_if_active("middle", RevocationReason::UserLogout)
            .await
            .unwrap();

        let hashes: Vec<String> = repo
            .find_by_user(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.token_hash)
            .collect();
        assert_eq!(hashes, ["oldest", "middle", "newest"]);
        assert!(repo.find_by_user(Uuid::now_v7()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rotation_consumes_the_presented_token_once() {
        let repo = InMemoryRefreshTokenRepository::default();
        let owner = Uuid::now_v7();
        repo.create(&token("old", owner)).await.unwrap();

        let first = repo.rotate("old", &token("new-1", owner)).await.unwrap();
        assert_eq!(
            first.and_then(|r| r.revoked_reason),
            Some(RevocationReason::Rotation)
        );

        let second = repo.rotate("old", &token("new-2", owner)).await.unwrap();
        assert!(second.is_none());
        assert!(repo.find_by_hash("new-2").await.unwrap().is_none());
        assert!(repo.find_by_hash("new-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rotation_refuses_expired_tokens() {
        let repo = InMemoryRefreshTokenRepository::default();
        let owner = Uuid::now_v7();
        let mut stale = token("stale", owner);
        stale.issued_at = Utc::now() - Duration::hours(48);
        stale.expires_at = Utc::now() - Duration::hours(24);
        repo.create(&stale).await.unwrap();

        let outcome = repo.rotate("stale", &token("next", owner)).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn revoke_if_active_reports_the_transition_once() {
        let repo = InMemoryRefreshTokenRepository::default();
        repo.create(&token("t", Uuid::now_v7())).await.unwrap();
        assert!(
            repo.revoke_if_active("t", RevocationReason::UserLogout)
                .await
                .unwrap()
        );
        assert!(
            !repo
                .revoke_if_active("t", RevocationReason::UserLogout)
                .await
                .unwrap()
        );
        assert!(
            !repo
                .revoke_if_active("missing", RevocationReason::UserLogout)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn revoke_all_only_touches_the_owner() {
        let repo = InMemoryRefreshTokenRepository::default();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        repo.create(&token("a1", alice)).await.unwrap();
        repo.create(&token("a2", alice)).await.unwrap();
        repo.create(&token("b1", bob)).await.unwrap();

        let mut revoked = repo
            .revoke_all_for_user(alice, RevocationReason::LogoutEverywhere)
            .await
            .unwrap();
        revoked.sort();
        assert_eq!(revoked, vec!["a1".to_string(), "a2".to_string()]);
        assert!(!repo.find_by_hash("b1").await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn audit_lists_newest_first() {
        let repo = InMemoryAuditRepository::default();
        let actor = Uuid::now_v7();
        repo.create(&AdminAudit::promotion(actor, "first@example.com"))
            .await
            .unwrap();
        repo.create(&AdminAudit::promotion(actor, "second@example.com"))
            .await
            .unwrap();

        let entries = repo.list(10).await.unwrap();
        assert_eq!(entries[0].target, "user:second@example.com");
        assert_eq!(repo.list(1).await.unwrap().len(), 1);
    }
}
