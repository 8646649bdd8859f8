//! Source registry administration (spec §6 `/api/sources*`, §4.5).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::dto::{CreateSourceRequest, CreateSourceResponse, RotateKeyResponse, SetStatusRequest, SourceView};
use crate::error::{ApiError, Envelope};
use crate::state::AppState;

fn source_view(s: pik_db::DbSource) -> SourceView {
    SourceView { id: s.id, name: s.name, status: s.status, created_at: s.created_at }
}

pub async fn list_sources(State(state): State<Arc<AppState>>) -> Result<Json<Envelope<Vec<SourceView>>>, ApiError> {
    let sources = state.auth.sources.list_all().await.map_err(ApiError::from)?;
    Ok(Envelope::ok(sources.into_iter().map(source_view).collect()))
}

pub async fn create_source(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSourceRequest>,
) -> Result<Json<Envelope<CreateSourceResponse>>, ApiError> {
    let issued = state.auth.sources.register(&req.source_id, &req.source_name).await.map_err(ApiError::from)?;
    Ok(Envelope::ok(CreateSourceResponse { source: source_view(issued.source), api_key: issued.plaintext_key }))
}

pub async fn get_source(
    State(state): State<Arc<AppState>>,
    Path(source_id): Path<String>,
) -> Result<Json<Envelope<SourceView>>, ApiError> {
    let source = state
        .auth
        .sources
        .find(&source_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::new(pik_core::Kind::NotFound, format!("source {source_id} not found")))?;
    Ok(Envelope::ok(source_view(source)))
}

pub async fn rotate_key(
    State(state): State<Arc<AppState>>,
    Path(source_id): Path<String>,
) -> Result<Json<Envelope<RotateKeyResponse>>, ApiError> {
    let issued = state.auth.sources.rotate(&source_id).await.map_err(ApiError::from)?;
    Ok(Envelope::ok(RotateKeyResponse { source_id: issued.source.id, api_key: issued.plaintext_key }))
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(source_id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    if req.status != "active" && req.status != "suspended" {
        return Err(ApiError::new(pik_core::Kind::BadRequest, "status must be 'active' or 'suspended'"));
    }
    state.auth.sources.set_status(&source_id, &req.status).await.map_err(ApiError::from)?;
    Ok(Envelope::ok(serde_json::json!({ "source_id": source_id, "status": req.status })))
}
