//! Authentication/authorization errors, mapped onto [`pik_core::Kind`].

use pik_core::{Kind, PikError};
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid API key")]
    InvalidApiKey,

    #[error("missing or invalid session token")]
    InvalidSession,

    #[error("WebAuthn verification failed: {0}")]
    VerificationFailed(String),

    #[error("unknown or already-used challenge")]
    UnknownChallenge,

    #[error("challenge expired")]
    ChallengeExpired,

    #[error("credential counter did not advance; possible cloned authenticator")]
    CounterRegression,

    #[error("no active consent link")]
    NoActiveLink,

    #[error("an active link already exists")]
    DuplicateLink,

    #[error("cannot revoke the last active key")]
    LastActiveKey,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Db(#[from] pik_db::DbError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AuthError {
    pub fn kind(&self) -> Kind {
        match self {
            AuthError::InvalidApiKey | AuthError::NoActiveLink => Kind::Forbidden,
            AuthError::InvalidSession | AuthError::VerificationFailed(_) | AuthError::CounterRegression => {
                Kind::Unauthorized
            }
            AuthError::UnknownChallenge | AuthError::ChallengeExpired | AuthError::InvalidInput(_) => {
                Kind::BadRequest
            }
            AuthError::DuplicateLink | AuthError::LastActiveKey => Kind::Conflict,
            AuthError::NotFound(_) => Kind::NotFound,
            AuthError::RateLimited { .. } => Kind::TooMany,
            AuthError::Db(e) => e.kind(),
            AuthError::Serde(_) => Kind::Internal,
        }
    }
}

impl From<AuthError> for PikError {
    fn from(err: AuthError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        match kind {
            Kind::Internal => PikError::internal(message),
            _ => PikError::new(kind, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_errors_map_to_forbidden() {
        assert_eq!(AuthError::InvalidApiKey.kind(), Kind::Forbidden);
        assert_eq!(AuthError::NoActiveLink.kind(), Kind::Forbidden);
    }

    #[test]
    fn counter_regression_is_unauthorized() {
        assert_eq!(AuthError::CounterRegression.kind(), Kind::Unauthorized);
    }

    #[test]
    fn last_active_key_is_conflict() {
        assert_eq!(AuthError::LastActiveKey.kind(), Kind::Conflict);
    }
}
