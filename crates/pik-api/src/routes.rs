//! Route tables, one function per group, each wrapped in its own
//! rate-limit policy (spec §4.12) before being merged into the router.

use std::sync::Arc;

use axum::{
    extract::Extension,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use pik_auth::RoutePolicies;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::middleware::{rate_limit_middleware, security_headers_middleware, timing_middleware, KeyBasis, RouteGroup};
use crate::state::AppState;

fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/enroll", post(handlers::identity::enroll))
        .route("/users", get(handlers::identity::list_users))
        .route("/users/:root_id", get(handlers::identity::get_user))
        .route("/users/:root_id/timeline", get(handlers::identity::get_timeline))
        .route("/users/:root_id/profile", put(handlers::identity::update_profile))
        .route("/users/:root_id/equipped-title", put(handlers::identity::set_equipped_title))
        .route("/users/:root_id/caches/:cache_id/open", post(handlers::identity::open_cache))
        .route("/users/:root_id/links", post(handlers::consent::create_link).get(handlers::consent::list_links))
        .route("/users/:root_id/links/:link_id", delete(handlers::consent::revoke_link))
}

fn ingest_routes() -> Router<Arc<AppState>> {
    Router::new().route("/ingest", post(handlers::ingest::ingest))
}

fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register/options", post(handlers::auth::register_options))
        .route("/auth/register/verify", post(handlers::auth::register_verify))
        .route("/auth/authenticate/options", post(handlers::auth::authenticate_options))
        .route("/auth/authenticate/verify", post(handlers::auth::authenticate_verify))
        .route("/auth/keys", get(handlers::auth::list_keys))
        .route("/auth/keys/rotate", post(handlers::auth::rotate_keys))
        .route("/auth/keys/rotate/verify", post(handlers::auth::rotate_keys_verify))
        .route("/auth/keys/:key_id/revoke", post(handlers::auth::revoke_key))
        .route("/auth/impersonate/:root_id", post(handlers::auth::impersonate))
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/config", get(handlers::config::get_config).post(handlers::config::set_config))
        .route("/sources", get(handlers::source::list_sources).post(handlers::source::create_source))
        .route("/sources/:id", get(handlers::source::get_source))
        .route("/sources/:id/rotate-key", post(handlers::source::rotate_key))
        .route("/sources/:id/status", post(handlers::source::set_status))
}

/// Applies a route group's rate limiter. The `Extension` layer must be the
/// outermost (last `.layer()` call) so it populates request extensions
/// before `rate_limit_middleware` reads them — axum layers wrap in
/// reverse declaration order.
fn with_group(router: Router<Arc<AppState>>, state: Arc<AppState>, group: RouteGroup) -> Router<Arc<AppState>> {
    router
        .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
        .layer(Extension(group))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let parsed = origins.iter().filter_map(|o| o.parse().ok()).collect::<Vec<_>>();
        CorsLayer::new().allow_origin(parsed).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
    }
}

/// Builds the full service: health probes (unrated), the SSE stream
/// (unrated, long-lived), and every route group behind its own limiter.
pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let api = Router::new()
        .merge(with_group(
            user_routes(),
            state.clone(),
            RouteGroup { name: "users", policy: RoutePolicies::DEFAULT, key_by: KeyBasis::Ip },
        ))
        .merge(with_group(
            ingest_routes(),
            state.clone(),
            RouteGroup { name: "ingest", policy: RoutePolicies::INGEST, key_by: KeyBasis::ApiKey },
        ))
        .merge(with_group(
            auth_routes(),
            state.clone(),
            RouteGroup { name: "auth", policy: RoutePolicies::AUTH, key_by: KeyBasis::Ip },
        ))
        .merge(with_group(
            admin_routes(),
            state.clone(),
            RouteGroup { name: "admin", policy: RoutePolicies::DEFAULT, key_by: KeyBasis::Ip },
        ))
        .route("/events/stream", get(handlers::sse::stream));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .nest("/api", api)
        .layer(middleware::from_fn(timing_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}
