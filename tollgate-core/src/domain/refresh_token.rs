use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::RevocationReason;

/// Durable state of one issued refresh token.
///
/// Only the digest of the opaque secret is stored. `revoked` moves from
/// `false` to `true` once and never back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<RevocationReason>,
}

impl RefreshTokenRecord {
    /// New live record expiring `lifetime` after `issued_at`.
    pub fn new(
        token_hash: String,
        user_id: Uuid,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            token_hash,
            user_id,
            issued_at,
            expires_at: issued_at + lifetime,
            revoked: false,
            revoked_at: None,
            revoked_reason: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Live means not revoked and not yet expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired(now)
    }

    /// Flip the revoked flag, keeping the first recorded reason.
    pub fn mark_revoked(
        &mut self,
        reason: RevocationReason,
        at: DateTime<Utc>,
    ) {
        if self.revoked {
            return;
        }
        self.revoked = true;
        self.revoked_at = Some(at);
        self.revoked_reason = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lifetime: Duration) -> RefreshTokenRecord {
        RefreshTokenRecord::new("digest".into(), Uuid::now_v7(), Utc::now(), lifetime)
    }

    #[test]
    fn fresh_record_is_live() {
        let token = record(Duration::hours(24));
        assert!(token.is_live(Utc::now()));
    }

    #[test]
    fn expired_record_is_dead_without_revocation() {
        let token = record(Duration::hours(24));
        let later = token.expires_at + Duration::seconds(1);
        assert!(!token.revoked);
        assert!(!token.is_live(later));
    }

    #[test]
    fn revocation_is_monotonic_and_keeps_first_reason() {
        let mut token = record(Duration::hours(24));
        let first = Utc::now();
        token.mark_revoked(RevocationReason::Rotation, first);
        token.mark_revoked(
            RevocationReason::UserLogout,
            first + Duration::seconds(5),
        );
        assert!(token.revoked);
        assert_eq!(token.revoked_reason, Some(RevocationReason::Rotation));
        assert_eq!(token.revoked_at, Some(first));
        assert!(!token.is_live(Utc::now()));
    }
}
