//! Consent link shapes (spec §6 `/api/users/:root_id/links*`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub source_id: String,
    pub granted_by: String,
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LinkView {
    pub link_id: Uuid,
    pub root_id: Uuid,
    pub source_id: String,
    pub scope: String,
    pub status: String,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RevokeLinkRequest {
    pub revoked_by: Option<String>,
}
