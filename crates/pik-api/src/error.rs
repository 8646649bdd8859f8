//! The uniform response envelope and the single place an error becomes an
//! HTTP status code (spec §6/§7).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pik_auth::AuthError;
use pik_core::{Kind, PikError};
use pik_db::DbError;
use pik_ingest::IngestError;
use serde::Serialize;

/// Every handler's success body: `{"status": "ok", "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    status: &'static str,
    data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { status: "ok", data })
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

/// A [`Kind`]-tagged failure, with the HTTP status derived straight from
/// the taxonomy rather than hardcoded per handler.
#[derive(Debug)]
pub struct ApiError {
    kind: Kind,
    message: String,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), retry_after_secs: None }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response =
            (self.status_code(), Json(ErrorBody { status: "error", message: self.message })).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<PikError> for ApiError {
    fn from(err: PikError) -> Self {
        Self::new(err.kind, err.client_message().to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if let AuthError::RateLimited { retry_after_secs } = err {
            return Self {
                kind: Kind::TooMany,
                message: "rate limit exceeded".to_string(),
                retry_after_secs: Some(retry_after_secs),
            };
        }
        PikError::from(err).into()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        PikError::from(err).into()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        PikError::from(err).into()
    }
}
