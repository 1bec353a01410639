use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Action recorded when an admin grants the admin role to another account.
pub const PROMOTE_USER: &str = "promote_user";

/// Append-only record of an administrative action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminAudit {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: String,
    pub target: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl AdminAudit {
    pub fn new(
        actor_id: Uuid,
        action: impl Into<String>,
        target: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            actor_id,
            action: action.into(),
            target: target.into(),
            details: details.into(),
            created_at: Utc::now(),
        }
    }

    pub fn promotion(actor_id: Uuid, email: &str) -> Self {
        Self::new(
            actor_id,
            PROMOTE_USER,
            format!("user:{email}"),
            "promoted to admin",
        )
    }
}
