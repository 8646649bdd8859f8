//! Opaque bearer session tokens, stored only as a hash (spec §3 SessionToken).

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{DbResult, DbSessionToken};

#[derive(Clone)]
pub struct SessionRepo {
    pool: PgPool,
}

impl SessionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs against either the shared pool or an in-flight transaction, so
    /// issuance can share atomicity with the WebAuthn ceremony that
    /// triggered it.
    pub async fn create<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<DbSessionToken>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbSessionToken>(
            r#"
            INSERT INTO session_tokens (id, token_hash, root_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, token_hash, root_id, expires_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(token_hash)
        .bind(root_id)
        .bind(expires_at)
        .bind(Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    pub async fn find_by_hash(&self, token_hash: &str) -> DbResult<Option<DbSessionToken>> {
        let row = sqlx::query_as::<_, DbSessionToken>(
            "SELECT id, token_hash, root_id, expires_at, created_at FROM session_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM session_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
