//! The kernel's live-mutable tunable key/value store (spec §3/§4.4 Config).
//!
//! Not to be confused with [`crate::config::DatabaseConfig`], the
//! connection-level settings used to open the pool itself.

use chrono::Utc;
use sqlx::PgPool;

use crate::{DbConfigEntry, DbResult};

#[derive(Clone)]
pub struct ConfigRepo {
    pool: PgPool,
}

impl ConfigRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get_all(&self) -> DbResult<Vec<DbConfigEntry>> {
        let rows = sqlx::query_as::<_, DbConfigEntry>(
            "SELECT config_key, config_value, updated_at FROM config ORDER BY config_key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<DbConfigEntry>> {
        let row = sqlx::query_as::<_, DbConfigEntry>(
            "SELECT config_key, config_value, updated_at FROM config WHERE config_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Upserts a key that is already known to the caller — callers must
    /// check [`pik_core::config_keys::is_known`] before calling this, since
    /// the store itself has no notion of "valid key" (spec §4.4).
    pub async fn set(&self, key: &str, value: &str) -> DbResult<DbConfigEntry> {
        let row = sqlx::query_as::<_, DbConfigEntry>(
            r#"
            INSERT INTO config (config_key, config_value, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (config_key) DO UPDATE SET config_value = EXCLUDED.config_value, updated_at = EXCLUDED.updated_at
            RETURNING config_key, config_value, updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn seed_defaults(&self, defaults: &std::collections::HashMap<String, String>) -> DbResult<()> {
        for (key, value) in defaults {
            sqlx::query(
                "INSERT INTO config (config_key, config_value, updated_at) VALUES ($1, $2, $3)
                 ON CONFLICT (config_key) DO NOTHING",
            )
            .bind(key)
            .bind(value)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
