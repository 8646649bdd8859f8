//! The single untrusted-source ingress point (spec §6 `POST /api/ingest`).

use std::sync::Arc;

use axum::{extract::State, Json};
use pik_ingest::IngestRequest;

use crate::dto::{IngestRequestDto, IngestResponseDto};
use crate::error::{ApiError, Envelope};
use crate::extractors::ApiKeyPrincipal;
use crate::state::AppState;

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    source: ApiKeyPrincipal,
    Json(req): Json<IngestRequestDto>,
) -> Result<Json<Envelope<IngestResponseDto>>, ApiError> {
    let outcome = state
        .ingest
        .ingest(IngestRequest { root_id: req.root_id, event_type: req.event_type, payload: req.payload }, &source.source_id)
        .await
        .map_err(ApiError::from)?;

    Ok(Envelope::ok(IngestResponseDto {
        event_id: outcome.event_id,
        event_type: outcome.event_type,
        changes_applied: outcome.changes,
    }))
}
