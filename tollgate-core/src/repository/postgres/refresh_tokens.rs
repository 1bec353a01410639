use std::fmt;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::domain::{RefreshTokenRecord, RevocationReason};
use crate::repository::{RefreshTokenRepository, RepositoryResult};

pub struct PostgresRefreshTokenRepository {
    pool: PgPool,
}

impl fmt::Debug for PostgresRefreshTokenRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresRefreshTokenRepository").finish()
    }
}

impl PostgresRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    token_hash: String,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
    revoked_reason: Option<String>,
}

impl TryFrom<RefreshTokenRow> for RefreshTokenRecord {
    type Error = anyhow::Error;

    fn try_from(row: RefreshTokenRow) -> Result<Self, Self::Error> {
        let revoked_reason = row
            .revoked_reason
            .as_deref()
            .map(str::parse::<RevocationReason>)
            .transpose()
            .map_err(|err| anyhow!("refresh token {}: {err}", row.id))?;

        Ok(RefreshTokenRecord {
            id: row.id,
            token_hash: row.token_hash,
            user_id: row.user_id,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            revoked: row.revoked,
            revoked_at: row.revoked_at,
            revoked_reason,
        })
    }
}

const TOKEN_COLUMNS: &str = "id, token_hash, user_id, issued_at, expires_at, \
     revoked, revoked_at, revoked_reason";

#[async_trait]
impl RefreshTokenRepository for PostgresRefreshTokenRepository {
    async fn create(&self, record: &RefreshTokenRecord) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                id, token_hash, user_id, issued_at, expires_at, revoked
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.token_hash)
        .bind(record.user_id)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(record.revoked)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> RepositoryResult<Option<RefreshTokenRecord>> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RefreshTokenRecord::try_from).transpose()?)
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
    ) -> RepositoryResult<Vec<RefreshTokenRecord>> {
        let rows: Vec<RefreshTokenRow> = sqlx::query_as(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens \
             WHERE user_id = $1 ORDER BY issued_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(RefreshTokenRecord::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    async fn revoke_if_active(
        &self,
        token_hash: &str,
        reason: RevocationReason,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE,
                revoked_at = NOW(),
                revoked_reason = $2
            WHERE token_hash = $1
              AND revoked = FALSE
            "#,
        )
        .bind(token_hash)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshTokenRecord,
    ) -> RepositoryResult<Option<RefreshTokenRecord>> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken by this UPDATE serialises concurrent rotations
        // of the same hash; the loser re-evaluates the predicate and matches
        // nothing.
        let revoked: Option<RefreshTokenRow> = sqlx::query_as(&format!(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE,
                revoked_at = NOW(),
                revoked_reason = $2
            WHERE token_hash = $1
              AND revoked = FALSE
              AND expires_at > NOW()
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(old_hash)
        .bind(RevocationReason::Rotation.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(revoked) = revoked else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                id, token_hash, user_id, issued_at, expires_at, revoked
            )
            VALUES ($1, $2, $3, $4, $5, FALSE)
            "#,
        )
        .bind(replacement.id)
        .bind(&replacement.token_hash)
        .bind(replacement.user_id)
        .bind(replacement.issued_at)
        .bind(replacement.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(RefreshTokenRecord::try_from(revoked)?))
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
    ) -> RepositoryResult<Vec<String>> {
        let hashes: Vec<(String,)> = sqlx::query_as(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE,
                revoked_at = NOW(),
                revoked_reason = $2
            WHERE user_id = $1
              AND revoked = FALSE
            RETURNING token_hash
            "#,
        )
        .bind(user_id)
        .bind(reason.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(hashes.into_iter().map(|(hash,)| hash).collect())
    }
}
