//! End-to-end HTTP tests against a real Postgres instance (spec §6, §4.3).
//!
//! Each test gets its own ephemeral database from `sqlx::test`, migrated
//! from `pik-db`'s migration set, so ledger rows and transactional writes
//! are exercised against the real schema rather than a mock.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use pik_api::{create_router, handlers, AppState};
use pik_auth::{AuthSuite, WebAuthnSettings};
use pik_db::Database;
use pik_events::EventBus;
use pik_ingest::{IngestEngine, LootEngine};
use pik_ledger::Ledger;

async fn test_state(pool: PgPool) -> Arc<AppState> {
    let db = Arc::new(Database { pg: pool });

    let webauthn_settings = WebAuthnSettings {
        rp_name: "pik-test".to_string(),
        rp_id: "localhost".to_string(),
        origin: "http://localhost:8080".to_string(),
    };

    let bus = Arc::new(EventBus::new());
    let ledger = Ledger::new(db.event_repo(), bus);
    let auth = Arc::new(AuthSuite::new(&db, webauthn_settings, 3600, ledger.clone()).expect("auth suite wiring"));
    let loot = LootEngine::new(db.loot_repo(), db.identity_repo(), db.gear_repo(), ledger.clone());
    let ingest =
        IngestEngine::new(db.identity_repo(), ledger.clone(), db.config_repo(), auth.consent.clone(), loot.clone());

    Arc::new(AppState::new(db, auth, ledger, ingest, loot))
}

fn json_body(value: Value) -> Body {
    Body::from(serde_json::to_vec(&value).unwrap())
}

async fn post(state: &Arc<AppState>, uri: &str, body: Value) -> (StatusCode, Value) {
    let app = create_router(state.clone(), &[]);
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(json_body(body))
        .unwrap();
    send(app, request).await
}

async fn put_with_auth(state: &Arc<AppState>, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    let app = create_router(state.clone(), &[]);
    let mut builder = Request::builder().method("PUT").uri(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder.body(json_body(body)).unwrap();
    send(app, request).await
}

async fn delete(state: &Arc<AppState>, uri: &str, body: Value) -> (StatusCode, Value) {
    let app = create_router(state.clone(), &[]);
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(json_body(body))
        .unwrap();
    send(app, request).await
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn enroll(state: &Arc<AppState>, hero_name: &str) -> uuid::Uuid {
    let (status, body) = post(
        state,
        "/api/users/enroll",
        json!({
            "hero_name": hero_name,
            "fate_alignment": "lawful",
            "origin": null,
            "enrolled_by": "test-harness",
            "source_id": null,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["root_id"].as_str().unwrap().parse().unwrap()
}

#[sqlx::test(migrations = "../pik-db/migrations")]
async fn enroll_appends_identity_enrolled_ledger_row(pool: PgPool) {
    let state = test_state(pool).await;
    let root_id = enroll(&state, "Aria Stormwind").await;

    let timeline = state.ledger.timeline(root_id).await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].event_type, "identity.enrolled");
    assert_eq!(timeline[0].root_id, root_id);
}

#[sqlx::test(migrations = "../pik-db/migrations")]
async fn consent_create_and_revoke_append_ledger_rows(pool: PgPool) {
    let state = test_state(pool).await;
    let root_id = enroll(&state, "Brann Lightforge").await;
    state.auth.sources.register("quest-log", "Quest Log Service").await.unwrap();

    let (status, body) = post(
        &state,
        &format!("/api/users/{root_id}/links"),
        json!({ "source_id": "quest-log", "granted_by": "test-harness", "scope": "progression.write" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let link_id = body["data"]["link_id"].as_str().unwrap().to_string();

    let (status, _) =
        delete(&state, &format!("/api/users/{root_id}/links/{link_id}"), json!({ "revoked_by": "test-harness" }))
            .await;
    assert_eq!(status, StatusCode::OK);

    let timeline = state.ledger.timeline(root_id).await.unwrap();
    let event_types: Vec<&str> = timeline.iter().map(|e| e.event_type.as_str()).collect();
    assert!(event_types.contains(&"source.link_granted"));
    assert!(event_types.contains(&"source.link_revoked"));
}

#[sqlx::test(migrations = "../pik-db/migrations")]
async fn sse_stream_emits_connected_frame_then_a_published_event(pool: PgPool) {
    let state = test_state(pool).await;

    // Subscribing happens synchronously inside `stream()`, before the first
    // `.await` point yields back to the caller, so the subscription exists
    // before the enroll below publishes.
    let response = handlers::sse::stream(axum::extract::State(state.clone())).await;
    let mut body = response.into_body();

    let connected_frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("timed out waiting for connected frame")
        .unwrap()
        .unwrap();
    let connected_text = String::from_utf8(connected_frame.into_data().unwrap().to_vec()).unwrap();
    assert!(connected_text.starts_with("event: connected\n"));

    enroll(&state, "Cyra Emberfall").await;

    let published_frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("timed out waiting for published event")
        .unwrap()
        .unwrap();
    let published_text = String::from_utf8(published_frame.into_data().unwrap().to_vec()).unwrap();
    assert!(published_text.starts_with("event: identity.enrolled\n"));
}

#[sqlx::test(migrations = "../pik-db/migrations")]
async fn update_profile_rejects_missing_and_mismatched_session(pool: PgPool) {
    let state = test_state(pool).await;
    let owner = enroll(&state, "Dagny Ironveil").await;
    let other = enroll(&state, "Elsandra Voss").await;

    let (status, _) =
        put_with_auth(&state, &format!("/api/users/{owner}/profile"), None, json!({ "hero_name": "New Name" }))
            .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let other_session = state.auth.sessions.issue(&state.db.pg, other).await.unwrap();
    let (status, _) = put_with_auth(
        &state,
        &format!("/api/users/{owner}/profile"),
        Some(&other_session.token),
        json!({ "hero_name": "New Name" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let owner_session = state.auth.sessions.issue(&state.db.pg, owner).await.unwrap();
    let (status, _) = put_with_auth(
        &state,
        &format!("/api/users/{owner}/profile"),
        Some(&owner_session.token),
        json!({ "hero_name": "New Name" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[sqlx::test(migrations = "../pik-db/migrations")]
async fn set_equipped_title_rejects_missing_and_mismatched_session(pool: PgPool) {
    let state = test_state(pool).await;
    let owner = enroll(&state, "Fenric Dawnbreaker").await;
    let other = enroll(&state, "Gilda Thornwood").await;

    let (status, _) =
        put_with_auth(&state, &format!("/api/users/{owner}/equipped-title"), None, json!({ "title_id": null }))
            .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let other_session = state.auth.sessions.issue(&state.db.pg, other).await.unwrap();
    let (status, _) = put_with_auth(
        &state,
        &format!("/api/users/{owner}/equipped-title"),
        Some(&other_session.token),
        json!({ "title_id": null }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
