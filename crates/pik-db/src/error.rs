//! Database error types, mapped onto the kernel-wide [`pik_core::Kind`] taxonomy.

use pik_core::{Kind, PikError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

/// True when a query failed because of a unique-index violation — the
/// signal every `try_grant_*`/`rotate_*` caller uses to turn a raw SQL
/// error into a domain-level "already exists" outcome (spec §4.10.2).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

impl DbError {
    pub fn kind(&self) -> Kind {
        match self {
            DbError::NotFound(_) => Kind::NotFound,
            DbError::Duplicate(_) => Kind::Conflict,
            DbError::InvalidInput(_) => Kind::BadRequest,
            DbError::Query(e) if is_unique_violation(e) => Kind::Conflict,
            _ => Kind::Internal,
        }
    }
}

impl From<DbError> for PikError {
    fn from(err: DbError) -> Self {
        let kind = err.kind();
        match kind {
            Kind::NotFound => PikError::not_found(err.to_string()),
            Kind::Conflict => PikError::conflict("resource already exists"),
            Kind::BadRequest => PikError::bad_request(err.to_string()),
            _ => PikError::internal(err.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = DbError::NotFound("root identity".into());
        assert_eq!(err.kind(), Kind::NotFound);
    }

    #[test]
    fn duplicate_maps_to_409() {
        let err = DbError::Duplicate("source link".into());
        assert_eq!(err.kind(), Kind::Conflict);
    }
}
