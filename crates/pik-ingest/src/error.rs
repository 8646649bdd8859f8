//! Ingest/loot errors, mapped onto [`pik_core::Kind`].

use pik_core::{Kind, PikError};
use thiserror::Error;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unknown root identity: {0}")]
    UnknownRoot(uuid::Uuid),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unknown title: {0}")]
    UnknownTitle(String),

    #[error("unknown cache: {0}")]
    CacheNotFound(uuid::Uuid),

    #[error("cache {0} does not belong to root {1}")]
    CacheNotOwned(uuid::Uuid, uuid::Uuid),

    #[error("cache already opened")]
    CacheAlreadyOpened,

    #[error("no loot table entries available for this cache")]
    EmptyLootTable,

    #[error("gear item not found in catalog: {0}")]
    UnknownGearItem(String),

    #[error(transparent)]
    Auth(#[from] pik_auth::AuthError),

    #[error(transparent)]
    Db(#[from] pik_db::DbError),
}

impl IngestError {
    pub fn kind(&self) -> Kind {
        match self {
            IngestError::UnknownRoot(_) | IngestError::UnknownTitle(_) | IngestError::CacheNotFound(_) => {
                Kind::NotFound
            }
            IngestError::UnknownEventType(_) | IngestError::InvalidPayload(_) => Kind::BadRequest,
            IngestError::CacheNotOwned(..) => Kind::Forbidden,
            IngestError::CacheAlreadyOpened => Kind::Conflict,
            IngestError::EmptyLootTable | IngestError::UnknownGearItem(_) => Kind::Internal,
            IngestError::Auth(e) => e.kind(),
            IngestError::Db(e) => e.kind(),
        }
    }
}

impl From<IngestError> for PikError {
    fn from(err: IngestError) -> Self {
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
    fn unknown_event_type_is_bad_request() {
        let err = IngestError::UnknownEventType("bogus".into());
        assert_eq!(err.kind(), Kind::BadRequest);
    }

    #[test]
    fn cache_already_opened_is_conflict() {
        assert_eq!(IngestError::CacheAlreadyOpened.kind(), Kind::Conflict);
    }
}
