//! Request extractors for the two credential types the kernel accepts —
//! an opaque session bearer token and a source API key — plus the
//! client-IP extractor used for rate-limit keying (spec §4.5, §4.8, §4.12).
//!
//! Unlike a middleware-populated-extensions model, each extractor here
//! resolves its credential directly against [`AppState`] inline: the
//! kernel only has two credential shapes, so there's no shared upstream
//! layer worth factoring out.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use pik_auth::rate_limit::extract_client_ip;
use pik_core::Kind;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// The identity behind a validated `Authorization: Bearer <hex64>` token.
pub struct SessionPrincipal {
    pub root_id: Uuid,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for SessionPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::new(Kind::Unauthorized, "missing or invalid session token"))?;

        let root_id = state.auth.sessions.validate(token).await?;
        Ok(SessionPrincipal { root_id })
    }
}

/// The source behind a validated `X-PIK-API-Key` header.
pub struct ApiKeyPrincipal {
    pub source_id: String,
    #[allow(dead_code)]
    pub source_name: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ApiKeyPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let presented = parts.headers.get("x-pik-api-key").and_then(|v| v.to_str().ok());
        let resolved = state.auth.api_keys.authenticate(presented).await?;
        Ok(ApiKeyPrincipal { source_id: resolved.id, source_name: resolved.name })
    }
}

/// The caller's address, preferring proxy headers in the same order
/// [`pik_auth::rate_limit::extract_client_ip`] does.
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = parts.headers.clone();
        let ip = extract_client_ip(move |name| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string), None);
        Ok(ClientIp(ip))
    }
}
