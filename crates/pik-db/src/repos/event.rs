//! The append-only identity event ledger (spec §3 IdentityEvent, §4.3 Ledger).

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{DbIdentityEvent, DbResult};

#[derive(Clone)]
pub struct EventRepo {
    pool: PgPool,
}

impl EventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Appends one ledger row. No business logic ever updates or deletes
    /// from `identity_events` — this is the only write path (spec §8
    /// property 1).
    pub async fn append<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        event_type: &str,
        source_id: Option<&str>,
        payload: serde_json::Value,
        changes_applied: Option<serde_json::Value>,
    ) -> DbResult<DbIdentityEvent>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbIdentityEvent>(
            r#"
            INSERT INTO identity_events (id, root_id, event_type, source_id, payload, changes_applied, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING id, root_id, event_type, source_id, payload, changes_applied, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(root_id)
        .bind(event_type)
        .bind(source_id)
        .bind(payload)
        .bind(changes_applied)
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    /// Newest-first timeline, ties on `created_at` broken by event id
    /// ordering, as spec §3 requires.
    pub async fn timeline(&self, root_id: Uuid) -> DbResult<Vec<DbIdentityEvent>> {
        let rows = sqlx::query_as::<_, DbIdentityEvent>(
            "SELECT id, root_id, event_type, source_id, payload, changes_applied, created_at
             FROM identity_events WHERE root_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn timeline_limited(&self, root_id: Uuid, limit: i64) -> DbResult<Vec<DbIdentityEvent>> {
        let rows = sqlx::query_as::<_, DbIdentityEvent>(
            "SELECT id, root_id, event_type, source_id, payload, changes_applied, created_at
             FROM identity_events WHERE root_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(root_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_by_type(&self, root_id: Uuid, event_type: &str) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM identity_events WHERE root_id = $1 AND event_type = $2",
        )
        .bind(root_id)
        .bind(event_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    pub async fn total_count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM identity_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn counts_by_type(&self) -> DbResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT event_type, COUNT(*) FROM identity_events GROUP BY event_type ORDER BY event_type",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
