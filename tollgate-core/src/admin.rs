use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::user::normalize_email;
use crate::domain::{AdminAudit, Role, User};
use crate::error::AuthError;
use crate::repository::{AuditRepository, UserRepository};

/// Upper bound on audit entries returned by one listing.
pub const MAX_AUDIT_PAGE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub users: usize,
    pub admins: usize,
}

#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UserRepository>,
    audit: Arc<dyn AuditRepository>,
}

impl fmt::Debug for AdminService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminService").finish_non_exhaustive()
    }
}

impl AdminService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        audit: Arc<dyn AuditRepository>,
    ) -> Self {
        Self { users, audit }
    }

    /// Grant the admin role and record who did it.
    pub async fn promote_user(
        &self,
        actor_id: Uuid,
        email: &str,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self.users.update_role(user.id, Role::Admin).await? {
            return Err(AuthError::UserNotFound);
        }
        user.role = Role::Admin;

        self.audit
            .create(&AdminAudit::promotion(actor_id, &user.email))
            .await?;

        tracing::info!(
            actor_id = %actor_id,
            user_id = %user.id,
            "promoted user to admin"
        );
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.list_all().await?)
    }

    pub async fn list_audit(&self, limit: usize) -> Result<Vec<AdminAudit>, AuthError> {
        Ok(self.audit.list(limit.clamp(1, MAX_AUDIT_PAGE)).await?)
    }

    pub async fn stats(&self) -> Result<UserStats, AuthError> {
        let users = self.users.list_all().await?;
        Ok(UserStats {
            users: users.len(),
            admins: users.iter().filter(|user| user.is_admin()).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::PROMOTE_USER;
    use crate::repository::{InMemoryAuditRepository, InMemoryUserRepository};

    async fn setup() -> (AdminService, User, User) {
        let users = InMemoryUserRepository::default();
        let admin = User::new(
            "root@example.com".into(),
            "Admin".into(),
            "hash".into(),
            Role::Admin,
        );
        let member = User::new(
            "bob@example.com".into(),
            "Bob".into(),
            "hash".into(),
            Role::User,
        );
        users.create(&admin).await.unwrap();
        users.create(&member).await.unwrap();
        let service = AdminService::new(
            Arc::new(users),
            Arc::new(InMemoryAuditRepository::default()),
        );
        (service, admin, member)
    }

    #[tokio::test]
    async fn promotion_updates_role_and_writes_audit() {
        let (service, admin, member) = setup().await;

        let promoted = service
            .promote_user(admin.id, "Bob@Example.com")
            .await
            .unwrap();
        assert_eq!(promoted.id, member.id);
        assert_eq!(promoted.role, Role::Admin);

        let entries = service.list_audit(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor_id, admin.id);
        assert_eq!(entries[0].action, PROMOTE_USER);
        assert_eq!(entries[0].target, "user:bob@example.com");
        assert_eq!(entries[0].details, "promoted to admin");

        assert_eq!(
            service.stats().await.unwrap(),
            UserStats { users: 2, admins: 2 }
        );
    }

    #[tokio::test]
    async fn promoting_an_unknown_email_is_not_found() {
        let (service, admin, _) = setup().await;
        let err = service
            .promote_user(admin.id, "ghost@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
        assert!(service.list_audit(10).await.unwrap().is_empty());
    }
}
