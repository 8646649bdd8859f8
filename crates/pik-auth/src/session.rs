//! Session tokens issued after a successful WebAuthn ceremony (spec §4.8).
//! Tokens are opaque random bytes; only their SHA-256 hash is ever
//! persisted, mirroring how [`crate::source`] stores source API keys.

use chrono::{DateTime, Duration, Utc};
use pik_db::{DbSessionToken, SessionRepo};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::AuthResult;

const TOKEN_BYTES: usize = 32;

pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionIssuer {
    sessions: SessionRepo,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(sessions: SessionRepo, ttl_secs: i64) -> Self {
        Self { sessions, ttl: Duration::seconds(ttl_secs) }
    }

    /// Mints a new session token for `root_id` and persists its hash
    /// within the caller's transaction, so a failed ceremony never leaves
    /// a dangling session row.
    pub async fn issue<'c, E>(&self, exec: E, root_id: Uuid) -> AuthResult<IssuedSession>
    where
        E: PgExecutor<'c>,
    {
        let token = generate_token();
        let token_hash = hash_token(&token);
        let expires_at = Utc::now() + self.ttl;

        self.sessions.create(exec, root_id, &token_hash, expires_at).await?;

        Ok(IssuedSession { token, expires_at })
    }

    /// Resolves a bearer token to its root identity, rejecting missing or
    /// expired sessions without distinguishing the two to the caller.
    pub async fn validate(&self, token: &str) -> AuthResult<Uuid> {
        let token_hash = hash_token(token);
        let session = self
            .sessions
            .find_by_hash(&token_hash)
            .await?
            .filter(|s| s.expires_at > Utc::now())
            .ok_or(crate::error::AuthError::InvalidSession)?;

        Ok(session.root_id)
    }

    pub async fn find_raw(&self, token: &str) -> AuthResult<Option<DbSessionToken>> {
        let token_hash = hash_token(token);
        Ok(self.sessions.find_by_hash(&token_hash).await?)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_deterministic_and_sha256_length() {
        let h1 = hash_token("abc");
        let h2 = hash_token("abc");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn different_tokens_hash_differently() {
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[test]
    fn generated_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), TOKEN_BYTES * 2);
    }
}
