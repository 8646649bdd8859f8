//! Ambient request middleware: rate limiting, timing, and security headers
//! (spec §4.12, §5).

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::Response,
};
use pik_auth::RoutePolicy;

use crate::error::ApiError;
use crate::extractors::ClientIp;
use crate::state::AppState;

/// Which identity a route group's rate-limit bucket is keyed on. Ingest is
/// keyed by source, since one misbehaving upstream source shouldn't be
/// able to exhaust a shared IP's budget and vice versa; everything else
/// keys on client IP (spec §4.12 default).
#[derive(Clone, Copy)]
pub enum KeyBasis {
    Ip,
    ApiKey,
}

#[derive(Clone, Copy)]
pub struct RouteGroup {
    pub name: &'static str,
    pub policy: RoutePolicy,
    pub key_by: KeyBasis,
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    Extension(group): Extension<RouteGroup>,
    ClientIp(ip): ClientIp,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = match group.key_by {
        KeyBasis::Ip => ip,
        KeyBasis::ApiKey => req
            .headers()
            .get("x-pik-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string(),
    };

    let key = format!("{}:{}", group.name, identity);
    state.auth.rate_limiter.check(&key, group.policy).await?;
    Ok(next.run(req).await)
}

/// Logs slow requests at warn, everything else at debug.
pub async fn timing_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;
    let elapsed = start.elapsed();

    if elapsed.as_millis() > 1000 {
        tracing::warn!(method = %method, uri = %uri, elapsed_ms = elapsed.as_millis(), "slow request");
    } else {
        tracing::debug!(
            method = %method,
            uri = %uri,
            elapsed_ms = elapsed.as_millis(),
            status = response.status().as_u16(),
            "request completed"
        );
    }

    response
}

pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    headers.insert("X-XSS-Protection", "1; mode=block".parse().unwrap());
    headers.insert("Referrer-Policy", "strict-origin-when-cross-origin".parse().unwrap());

    response
}
