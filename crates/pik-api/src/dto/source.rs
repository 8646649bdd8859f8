//! Source registry shapes (spec §6 `/api/sources*`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateSourceRequest {
    pub source_id: String,
    pub source_name: String,
}

#[derive(Debug, Serialize)]
pub struct SourceView {
    pub id: String,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CreateSourceResponse {
    pub source: SourceView,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct RotateKeyResponse {
    pub source_id: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}
