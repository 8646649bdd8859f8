//! Sealed reward caches and the weighted loot table they draw from
//! (spec §3 FateCache/LootTable, §4.11 LootEngine).

use chrono::Utc;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{DbError, DbFateCache, DbLootTableEntry, DbResult};

#[derive(Clone)]
pub struct LootRepo {
    pool: PgPool,
}

impl LootRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create_cache<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        cache_type: &str,
        rarity: &str,
        trigger: &str,
    ) -> DbResult<DbFateCache>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbFateCache>(
            r#"
            INSERT INTO fate_caches (id, root_id, cache_type, rarity, status, trigger, reward_type, reward_value, opened_at, created_at)
            VALUES ($1, $2, $3, $4, 'sealed', $5, NULL, NULL, NULL, $6)
            RETURNING id, root_id, cache_type, rarity, status, trigger, reward_type, reward_value, opened_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(root_id)
        .bind(cache_type)
        .bind(rarity)
        .bind(trigger)
        .bind(Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    pub async fn find_by_id(&self, cache_id: Uuid) -> DbResult<Option<DbFateCache>> {
        let row = sqlx::query_as::<_, DbFateCache>(
            "SELECT id, root_id, cache_type, rarity, status, trigger, reward_type, reward_value, opened_at, created_at
             FROM fate_caches WHERE id = $1",
        )
        .bind(cache_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_for_root(&self, root_id: Uuid) -> DbResult<Vec<DbFateCache>> {
        let rows = sqlx::query_as::<_, DbFateCache>(
            "SELECT id, root_id, cache_type, rarity, status, trigger, reward_type, reward_value, opened_at, created_at
             FROM fate_caches WHERE root_id = $1 ORDER BY created_at DESC",
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Transitions `sealed -> opened` exactly once (spec §3 invariant);
    /// the `status = 'sealed'` guard makes a double-open race fail with
    /// zero rows affected rather than a second silent write.
    pub async fn open_cache<'c, E>(
        &self,
        exec: E,
        cache_id: Uuid,
        reward_type: &str,
        reward_value: &str,
    ) -> DbResult<DbFateCache>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbFateCache>(
            r#"
            UPDATE fate_caches
            SET status = 'opened', reward_type = $1, reward_value = $2, opened_at = $3
            WHERE id = $4 AND status = 'sealed'
            RETURNING id, root_id, cache_type, rarity, status, trigger, reward_type, reward_value, opened_at, created_at
            "#,
        )
        .bind(reward_type)
        .bind(reward_value)
        .bind(Utc::now())
        .bind(cache_id)
        .fetch_optional(exec)
        .await?
        .ok_or_else(|| DbError::Duplicate(format!("cache {cache_id} already opened")))?;
        Ok(row)
    }

    pub async fn loot_table_for(&self, cache_type: &str, min_level: i32) -> DbResult<Vec<DbLootTableEntry>> {
        let rows = sqlx::query_as::<_, DbLootTableEntry>(
            "SELECT id, cache_type, reward_type, reward_value, display_name, weight, rarity, min_level
             FROM loot_table WHERE cache_type = $1 AND min_level <= $2",
        )
        .bind(cache_type)
        .bind(min_level)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
