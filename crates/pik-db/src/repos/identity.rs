//! Root identities, personas, the title catalog, and fate markers.

use chrono::Utc;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{DbError, DbFateMarker, DbPersona, DbResult, DbRootIdentity, DbTitle, DbUserTitle};

#[derive(Clone)]
pub struct IdentityRepo {
    pool: PgPool,
}

impl IdentityRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the root identity row. Callers run this inside the same
    /// transaction as the primary persona and the `identity.enrolled`
    /// ledger append (spec §4.6 registration phase 2).
    pub async fn create<'c, E>(
        &self,
        exec: E,
        hero_name: &str,
        fate_alignment: &str,
        origin: Option<&str>,
        enrolled_by: &str,
    ) -> DbResult<DbRootIdentity>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbRootIdentity>(
            r#"
            INSERT INTO root_identities
                (id, hero_name, fate_alignment, origin, fate_xp, fate_level, status, enrolled_by, enrolled_at, equipped_title_id)
            VALUES ($1, $2, $3, $4, 0, 1, 'active', $5, $6, NULL)
            RETURNING id, hero_name, fate_alignment, origin, fate_xp, fate_level, status, enrolled_by, enrolled_at, equipped_title_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(hero_name)
        .bind(fate_alignment)
        .bind(origin)
        .bind(enrolled_by)
        .bind(Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    pub async fn create_persona<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        display_name: &str,
        is_primary: bool,
    ) -> DbResult<DbPersona>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbPersona>(
            r#"
            INSERT INTO personas (id, root_id, display_name, is_primary, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, root_id, display_name, is_primary, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(root_id)
        .bind(display_name)
        .bind(is_primary)
        .bind(Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    pub async fn find_by_id(&self, root_id: Uuid) -> DbResult<Option<DbRootIdentity>> {
        let row = sqlx::query_as::<_, DbRootIdentity>(
            "SELECT id, hero_name, fate_alignment, origin, fate_xp, fate_level, status, enrolled_by, enrolled_at, equipped_title_id
             FROM root_identities WHERE id = $1",
        )
        .bind(root_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn require(&self, root_id: Uuid) -> DbResult<DbRootIdentity> {
        self.find_by_id(root_id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("root identity {root_id}")))
    }

    pub async fn list_all(&self) -> DbResult<Vec<DbRootIdentity>> {
        let rows = sqlx::query_as::<_, DbRootIdentity>(
            "SELECT id, hero_name, fate_alignment, origin, fate_xp, fate_level, status, enrolled_by, enrolled_at, equipped_title_id
             FROM root_identities ORDER BY enrolled_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_persona_primary(&self, root_id: Uuid) -> DbResult<Option<DbPersona>> {
        let row = sqlx::query_as::<_, DbPersona>(
            "SELECT id, root_id, display_name, is_primary, created_at
             FROM personas WHERE root_id = $1 AND is_primary = true",
        )
        .bind(root_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Applies `(fate_xp, fate_level)` inside the caller's transaction —
    /// the level cascade in spec §4.10.1 writes both fields atomically
    /// alongside the top-level ledger append.
    pub async fn update_progression<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        fate_xp: i64,
        fate_level: i32,
    ) -> DbResult<()>
    where
        E: PgExecutor<'c>,
    {
        sqlx::query("UPDATE root_identities SET fate_xp = $1, fate_level = $2 WHERE id = $3")
            .bind(fate_xp)
            .bind(fate_level)
            .bind(root_id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn update_profile<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        hero_name: Option<&str>,
        fate_alignment: Option<&str>,
        origin: Option<&str>,
    ) -> DbResult<()>
    where
        E: PgExecutor<'c>,
    {
        sqlx::query(
            r#"
            UPDATE root_identities SET
                hero_name = COALESCE($1, hero_name),
                fate_alignment = COALESCE($2, fate_alignment),
                origin = COALESCE($3, origin)
            WHERE id = $4
            "#,
        )
        .bind(hero_name)
        .bind(fate_alignment)
        .bind(origin)
        .bind(root_id)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn set_equipped_title<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        title_id: Option<&str>,
    ) -> DbResult<()>
    where
        E: PgExecutor<'c>,
    {
        sqlx::query("UPDATE root_identities SET equipped_title_id = $1 WHERE id = $2")
            .bind(title_id)
            .bind(root_id)
            .execute(exec)
            .await?;
        Ok(())
    }

    /// Grants `(root, title)`. Returns `false` — without error — when the
    /// pair already exists, per the idempotence rule in spec §4.10.2.
    pub async fn try_grant_title<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        title_id: &str,
    ) -> DbResult<bool>
    where
        E: PgExecutor<'c>,
    {
        let result = sqlx::query(
            "INSERT INTO user_titles (root_id, title_id, granted_at) VALUES ($1, $2, $3)
             ON CONFLICT (root_id, title_id) DO NOTHING",
        )
        .bind(root_id)
        .bind(title_id)
        .bind(Utc::now())
        .execute(exec)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn title_exists(&self, title_id: &str) -> DbResult<bool> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM titles WHERE id = $1")
            .bind(title_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn list_titles_for(&self, root_id: Uuid) -> DbResult<Vec<DbUserTitle>> {
        let rows = sqlx::query_as::<_, DbUserTitle>(
            "SELECT root_id, title_id, granted_at FROM user_titles WHERE root_id = $1 ORDER BY granted_at",
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn title_catalog(&self) -> DbResult<Vec<DbTitle>> {
        let rows = sqlx::query_as::<_, DbTitle>("SELECT id, name, description FROM titles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn insert_marker<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        source_id: Option<&str>,
        marker: &str,
    ) -> DbResult<DbFateMarker>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbFateMarker>(
            r#"
            INSERT INTO fate_markers (id, root_id, source_id, marker, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, root_id, source_id, marker, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(root_id)
        .bind(source_id)
        .bind(marker)
        .bind(Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    pub async fn list_markers(&self, root_id: Uuid) -> DbResult<Vec<DbFateMarker>> {
        let rows = sqlx::query_as::<_, DbFateMarker>(
            "SELECT id, root_id, source_id, marker, created_at FROM fate_markers WHERE root_id = $1 ORDER BY created_at DESC",
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
