//! Passkeys (`AuthKey`) and the one-shot `WebAuthnChallenge` nonces.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{DbAuthKey, DbResult, DbWebAuthnChallenge};

#[derive(Clone)]
pub struct AuthKeyRepo {
    pool: PgPool,
}

impl AuthKeyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Exposes the pool for callers that need to run a generic-executor
    /// method outside of any larger transaction.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        credential_id: &str,
        public_key: serde_json::Value,
        counter: i64,
        device_type: Option<&str>,
        backed_up: bool,
        transports: serde_json::Value,
        friendly_name: Option<&str>,
    ) -> DbResult<DbAuthKey>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbAuthKey>(
            r#"
            INSERT INTO auth_keys
                (id, root_id, credential_id, public_key, counter, device_type, backed_up, transports, friendly_name, status, created_at, last_used_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'active', $10, NULL, NULL)
            RETURNING id, root_id, credential_id, public_key, counter, device_type, backed_up, transports, friendly_name, status, created_at, last_used_at, revoked_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(root_id)
        .bind(credential_id)
        .bind(public_key)
        .bind(counter)
        .bind(device_type)
        .bind(backed_up)
        .bind(transports)
        .bind(friendly_name)
        .bind(Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    pub async fn find_by_credential_id(&self, credential_id: &str) -> DbResult<Option<DbAuthKey>> {
        let row = sqlx::query_as::<_, DbAuthKey>(
            "SELECT id, root_id, credential_id, public_key, counter, device_type, backed_up, transports, friendly_name, status, created_at, last_used_at, revoked_at
             FROM auth_keys WHERE credential_id = $1",
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_id(&self, key_id: Uuid) -> DbResult<Option<DbAuthKey>> {
        let row = sqlx::query_as::<_, DbAuthKey>(
            "SELECT id, root_id, credential_id, public_key, counter, device_type, backed_up, transports, friendly_name, status, created_at, last_used_at, revoked_at
             FROM auth_keys WHERE id = $1",
        )
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_for_root(&self, root_id: Uuid) -> DbResult<Vec<DbAuthKey>> {
        let rows = sqlx::query_as::<_, DbAuthKey>(
            "SELECT id, root_id, credential_id, public_key, counter, device_type, backed_up, transports, friendly_name, status, created_at, last_used_at, revoked_at
             FROM auth_keys WHERE root_id = $1 ORDER BY created_at DESC",
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn active_for_root(&self, root_id: Uuid) -> DbResult<Vec<DbAuthKey>> {
        let rows = sqlx::query_as::<_, DbAuthKey>(
            "SELECT id, root_id, credential_id, public_key, counter, device_type, backed_up, transports, friendly_name, status, created_at, last_used_at, revoked_at
             FROM auth_keys WHERE root_id = $1 AND status = 'active' ORDER BY created_at DESC",
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_active_for_root<'c, E>(&self, exec: E, root_id: Uuid) -> DbResult<i64>
    where
        E: PgExecutor<'c>,
    {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM auth_keys WHERE root_id = $1 AND status = 'active'")
                .bind(root_id)
                .fetch_one(exec)
                .await?;
        Ok(row.0)
    }

    /// Bumps the stored counter after a successful assertion (spec §4.6
    /// counter check). Callers must have already verified monotonicity.
    pub async fn update_counter_and_last_used<'c, E>(
        &self,
        exec: E,
        key_id: Uuid,
        new_counter: i64,
    ) -> DbResult<()>
    where
        E: PgExecutor<'c>,
    {
        sqlx::query("UPDATE auth_keys SET counter = $1, last_used_at = $2 WHERE id = $3")
            .bind(new_counter)
            .bind(Utc::now())
            .bind(key_id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn revoke<'c, E>(&self, exec: E, key_id: Uuid) -> DbResult<()>
    where
        E: PgExecutor<'c>,
    {
        sqlx::query("UPDATE auth_keys SET status = 'revoked', revoked_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(key_id)
            .execute(exec)
            .await?;
        Ok(())
    }

    // -- WebAuthn challenges ------------------------------------------------

    pub async fn create_challenge<'c, E>(
        &self,
        exec: E,
        challenge: &str,
        challenge_type: &str,
        root_id: Option<Uuid>,
        metadata: Option<serde_json::Value>,
        ttl_secs: i64,
    ) -> DbResult<DbWebAuthnChallenge>
    where
        E: PgExecutor<'c>,
    {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::seconds(ttl_secs);
        let row = sqlx::query_as::<_, DbWebAuthnChallenge>(
            r#"
            INSERT INTO webauthn_challenges (id, challenge, challenge_type, root_id, metadata, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, challenge, challenge_type, root_id, metadata, expires_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(challenge)
        .bind(challenge_type)
        .bind(root_id)
        .bind(metadata)
        .bind(expires_at)
        .bind(now)
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    /// Deletes-and-returns the challenge in one statement so that two
    /// concurrent phase-2 attempts can never both consume it (spec §8
    /// property 5, single use).
    pub async fn consume_challenge<'c, E>(
        &self,
        exec: E,
        challenge: &str,
    ) -> DbResult<Option<DbWebAuthnChallenge>>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbWebAuthnChallenge>(
            "DELETE FROM webauthn_challenges WHERE challenge = $1
             RETURNING id, challenge, challenge_type, root_id, metadata, expires_at, created_at",
        )
        .bind(challenge)
        .fetch_optional(exec)
        .await?;
        Ok(row)
    }

    pub async fn delete_expired_challenges(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM webauthn_challenges WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
