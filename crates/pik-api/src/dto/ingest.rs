//! Ingest request/response shapes (spec §6 `POST /api/ingest`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct IngestRequestDto {
    pub root_id: Uuid,
    pub event_type: String,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct IngestResponseDto {
    pub event_id: Uuid,
    pub event_type: String,
    pub changes_applied: Value,
}
