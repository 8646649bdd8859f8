//! Shared error taxonomy for the Persistent Identity Kernel.
//!
//! Every crate in the workspace maps its own error enum onto [`Kind`] so
//! that `pik-api` has exactly one place that turns an error into an HTTP
//! status code and envelope, per spec §7.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven-way HTTP-mapped error taxonomy from spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    TooMany,
    Internal,
}

impl Kind {
    pub fn status_code(self) -> u16 {
        match self {
            Kind::BadRequest => 400,
            Kind::Unauthorized => 401,
            Kind::Forbidden => 403,
            Kind::NotFound => 404,
            Kind::Conflict => 409,
            Kind::TooMany => 429,
            Kind::Internal => 500,
        }
    }
}

/// A kernel-wide error: a [`Kind`] plus a message.
///
/// Unexpected (`Internal`) errors keep their full context in `detail` for
/// server-side logging but never put it in `message`, which is what
/// reaches the client (spec §7 policy).
#[derive(Debug, Clone)]
pub struct PikError {
    pub kind: Kind,
    pub message: String,
    pub detail: Option<String>,
}

impl PikError {
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(Kind::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(Kind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(Kind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Kind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(Kind::Conflict, message)
    }

    pub fn too_many(message: impl Into<String>) -> Self {
        Self::new(Kind::TooMany, message)
    }

    /// Build an internal error, keeping the real cause server-side only.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            kind: Kind::Internal,
            message: "Internal server error".to_string(),
            detail: Some(detail.into()),
        }
    }

    /// The message safe to return to an external client.
    pub fn client_message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PikError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PikError {}

impl From<serde_json::Error> for PikError {
    fn from(err: serde_json::Error) -> Self {
        PikError::bad_request(format!("invalid JSON payload: {err}"))
    }
}

pub type PikResult<T> = std::result::Result<T, PikError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(Kind::BadRequest.status_code(), 400);
        assert_eq!(Kind::Unauthorized.status_code(), 401);
        assert_eq!(Kind::Forbidden.status_code(), 403);
        assert_eq!(Kind::NotFound.status_code(), 404);
        assert_eq!(Kind::Conflict.status_code(), 409);
        assert_eq!(Kind::TooMany.status_code(), 429);
        assert_eq!(Kind::Internal.status_code(), 500);
    }

    #[test]
    fn internal_errors_hide_detail_from_client() {
        let err = PikError::internal("password=hunter2 leaked in log line");
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.detail.unwrap().contains("hunter2"));
    }
}
