//! Source registration, API key issuance/rotation, and the middleware-side
//! key guard (spec §4.5).

use pik_db::{DbSource, SourceRepo};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{AuthError, AuthResult};

const API_KEY_PREFIX: &str = "pik_";
const API_KEY_RANDOM_BYTES: usize = 24;

pub struct IssuedKey {
    pub source: DbSource,
    pub plaintext_key: String,
}

#[derive(Clone)]
pub struct SourceRegistry {
    sources: SourceRepo,
}

impl SourceRegistry {
    pub fn new(sources: SourceRepo) -> Self {
        Self { sources }
    }

    pub async fn register(&self, id: &str, name: &str) -> AuthResult<IssuedKey> {
        validate_id(id)?;
        let plaintext_key = generate_api_key();
        let key_hash = hash_api_key(&plaintext_key);
        let source = self.sources.create(id, name, &key_hash).await?;
        Ok(IssuedKey { source, plaintext_key })
    }

    pub async fn rotate(&self, id: &str) -> AuthResult<IssuedKey> {
        let source = self
            .sources
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("source {id}")))?;

        let plaintext_key = generate_api_key();
        let key_hash = hash_api_key(&plaintext_key);
        self.sources.rotate_key(id, &key_hash).await?;

        Ok(IssuedKey {
            source: DbSource { api_key_hash: key_hash, ..source },
            plaintext_key,
        })
    }

    pub async fn set_status(&self, id: &str, status: &str) -> AuthResult<()> {
        self.sources
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("source {id}")))?;
        self.sources.set_status(id, status).await?;
        Ok(())
    }

    pub async fn find(&self, id: &str) -> AuthResult<Option<DbSource>> {
        Ok(self.sources.find_by_id(id).await?)
    }

    pub async fn list_all(&self) -> AuthResult<Vec<DbSource>> {
        Ok(self.sources.list_all().await?)
    }
}

/// Checks `^[a-z0-9][a-z0-9-]{2,48}[a-z0-9]$` by hand rather than pulling in
/// a regex engine for one pattern (spec §3 Source.id).
fn validate_id(id: &str) -> AuthResult<()> {
    let bytes = id.as_bytes();
    let is_head_or_tail = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let is_body = |b: u8| is_head_or_tail(b) || b == b'-';

    let valid = bytes.len() >= 4
        && bytes.len() <= 50
        && is_head_or_tail(bytes[0])
        && is_head_or_tail(bytes[bytes.len() - 1])
        && bytes[1..bytes.len() - 1].iter().all(|&b| is_body(b));

    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidInput(format!(
            "source id {id:?} must match ^[a-z0-9][a-z0-9-]{{2,48}}[a-z0-9]$"
        )))
    }
}

fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{API_KEY_PREFIX}{}", hex::encode(bytes))
}

fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub id: String,
    pub name: String,
}

/// Authenticates the `X-PIK-API-Key` header. The failure path never
/// distinguishes missing, unknown, or suspended keys — spec §4.5 requires
/// a single opaque message regardless of cause.
#[derive(Clone)]
pub struct ApiKeyAuth {
    sources: SourceRepo,
}

impl ApiKeyAuth {
    pub fn new(sources: SourceRepo) -> Self {
        Self { sources }
    }

    pub async fn authenticate(&self, presented_key: Option<&str>) -> AuthResult<ResolvedSource> {
        let presented_key = presented_key.ok_or(AuthError::InvalidApiKey)?;
        let key_hash = hash_api_key(presented_key);
        let source = self
            .sources
            .find_by_key_hash(&key_hash)
            .await?
            .ok_or(AuthError::InvalidApiKey)?;

        Ok(ResolvedSource { id: source.id, name: source.name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_pattern_accepts_valid_ids() {
        assert!(validate_id("checkpoint-forge").is_ok());
        assert!(validate_id("abc").is_ok());
    }

    #[test]
    fn id_pattern_rejects_too_short_or_uppercase() {
        assert!(validate_id("ab").is_err());
        assert!(validate_id("Abc-def").is_err());
        assert!(validate_id("-abc").is_err());
        assert!(validate_id("abc-").is_err());
    }

    #[test]
    fn api_key_has_expected_shape() {
        let key = generate_api_key();
        assert!(key.starts_with(API_KEY_PREFIX));
        assert_eq!(key.len(), API_KEY_PREFIX.len() + API_KEY_RANDOM_BYTES * 2);
    }

    #[test]
    fn api_key_hash_is_sha256_hex() {
        assert_eq!(hash_api_key("x").len(), 64);
    }
}
