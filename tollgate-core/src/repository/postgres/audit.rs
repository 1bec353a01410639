use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::domain::AdminAudit;
use crate::repository::{AuditRepository, RepositoryResult};

pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl fmt::Debug for PostgresAuditRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresAuditRepository").finish()
    }
}

impl PostgresAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct AuditRow {
    id: Uuid,
    actor_id: Uuid,
    action: String,
    target: String,
    details: String,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AdminAudit {
    fn from(row: AuditRow) -> Self {
        AdminAudit {
            id: row.id,
            actor_id: row.actor_id,
            action: row.action,
            target: row.target,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn create(&self, entry: &AdminAudit) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_audit (
                id, actor_id, action, target, details, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_id)
        .bind(&entry.action)
        .bind(&entry.target)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, limit: usize) -> RepositoryResult<Vec<AdminAudit>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, actor_id, action, target, details, created_at
            FROM admin_audit
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AdminAudit::from).collect())
    }
}
