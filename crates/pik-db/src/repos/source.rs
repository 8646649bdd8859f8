//! Upstream sources and the per-(root, source) consent links they need to
//! mutate a user (spec §3 Source / SourceLink).

use chrono::Utc;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{DbResult, DbSource, DbSourceLink};

#[derive(Clone)]
pub struct SourceRepo {
    pool: PgPool,
}

impl SourceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create(&self, id: &str, name: &str, api_key_hash: &str) -> DbResult<DbSource> {
        let row = sqlx::query_as::<_, DbSource>(
            r#"
            INSERT INTO sources (id, name, status, api_key_hash, created_at)
            VALUES ($1, $2, 'active', $3, $4)
            RETURNING id, name, status, api_key_hash, created_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(api_key_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<DbSource>> {
        let row = sqlx::query_as::<_, DbSource>(
            "SELECT id, name, status, api_key_hash, created_at FROM sources WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_key_hash(&self, api_key_hash: &str) -> DbResult<Option<DbSource>> {
        let row = sqlx::query_as::<_, DbSource>(
            "SELECT id, name, status, api_key_hash, created_at FROM sources WHERE api_key_hash = $1 AND status = 'active'",
        )
        .bind(api_key_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_all(&self) -> DbResult<Vec<DbSource>> {
        let rows = sqlx::query_as::<_, DbSource>(
            "SELECT id, name, status, api_key_hash, created_at FROM sources ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn rotate_key(&self, id: &str, new_key_hash: &str) -> DbResult<()> {
        sqlx::query("UPDATE sources SET api_key_hash = $1 WHERE id = $2")
            .bind(new_key_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_status(&self, id: &str, status: &str) -> DbResult<()> {
        sqlx::query("UPDATE sources SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -- Consent links -------------------------------------------------

    pub async fn create_link<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        source_id: &str,
        scope: &str,
        granted_by: &str,
    ) -> DbResult<DbSourceLink>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbSourceLink>(
            r#"
            INSERT INTO source_links (id, root_id, source_id, scope, status, granted_by, granted_at, revoked_at, revoked_by)
            VALUES ($1, $2, $3, $4, 'active', $5, $6, NULL, NULL)
            RETURNING id, root_id, source_id, scope, status, granted_by, granted_at, revoked_at, revoked_by
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(root_id)
        .bind(source_id)
        .bind(scope)
        .bind(granted_by)
        .bind(Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    pub async fn find_active_link<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        source_id: &str,
    ) -> DbResult<Option<DbSourceLink>>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbSourceLink>(
            "SELECT id, root_id, source_id, scope, status, granted_by, granted_at, revoked_at, revoked_by
             FROM source_links WHERE root_id = $1 AND source_id = $2 AND status = 'active'",
        )
        .bind(root_id)
        .bind(source_id)
        .fetch_optional(exec)
        .await?;
        Ok(row)
    }

    pub async fn find_link_by_id(&self, link_id: Uuid) -> DbResult<Option<DbSourceLink>> {
        let row = sqlx::query_as::<_, DbSourceLink>(
            "SELECT id, root_id, source_id, scope, status, granted_by, granted_at, revoked_at, revoked_by
             FROM source_links WHERE id = $1",
        )
        .bind(link_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_links_for_root(&self, root_id: Uuid) -> DbResult<Vec<DbSourceLink>> {
        let rows = sqlx::query_as::<_, DbSourceLink>(
            "SELECT id, root_id, source_id, scope, status, granted_by, granted_at, revoked_at, revoked_by
             FROM source_links WHERE root_id = $1 ORDER BY granted_at DESC",
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn revoke_link<'c, E>(
        &self,
        exec: E,
        link_id: Uuid,
        revoked_by: Option<&str>,
    ) -> DbResult<()>
    where
        E: PgExecutor<'c>,
    {
        sqlx::query(
            "UPDATE source_links SET status = 'revoked', revoked_at = $1, revoked_by = $2 WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(revoked_by)
        .bind(link_id)
        .execute(exec)
        .await?;
        Ok(())
    }
}
