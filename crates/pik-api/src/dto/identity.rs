//! Identity, persona, progression and timeline shapes (spec §6 `/api/users*`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::EventView;

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub hero_name: String,
    pub fate_alignment: String,
    pub origin: Option<String>,
    pub enrolled_by: String,
    pub source_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub root_id: Uuid,
    pub persona_id: Uuid,
    pub hero_name: String,
    pub fate_alignment: String,
    pub link_id: Option<Uuid>,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub root_id: Uuid,
    pub hero_name: String,
    pub fate_alignment: String,
    pub fate_xp: i64,
    pub fate_level: i32,
    pub active_sources: i64,
}

#[derive(Debug, Serialize)]
pub struct IdentityView {
    pub root_id: Uuid,
    pub hero_name: String,
    pub fate_alignment: String,
    pub origin: Option<String>,
    pub status: String,
    pub enrolled_by: String,
    pub enrolled_at: DateTime<Utc>,
    pub equipped_title_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PersonaView {
    pub persona_id: Uuid,
    pub display_name: String,
    pub is_primary: bool,
}

#[derive(Debug, Serialize)]
pub struct TitleView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FateMarkerView {
    pub id: Uuid,
    pub source_id: Option<String>,
    pub marker: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProgressionView {
    pub fate_xp: i64,
    pub fate_level: i32,
    pub xp_in_current_level: i64,
    pub xp_needed_for_next: i64,
    pub total_sessions: i64,
    pub titles: Vec<String>,
    pub titles_detail: Vec<TitleView>,
    pub fate_markers: Vec<FateMarkerView>,
}

#[derive(Debug, Serialize)]
pub struct SourceLinkView {
    pub link_id: Uuid,
    pub source_id: String,
    pub scope: String,
    pub status: String,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FateCacheView {
    pub cache_id: Uuid,
    pub cache_type: String,
    pub rarity: String,
    pub status: String,
    pub trigger: String,
    pub reward_type: Option<String>,
    pub reward_value: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub identity: IdentityView,
    pub persona: Option<PersonaView>,
    pub progression: ProgressionView,
    pub source_links: Vec<SourceLinkView>,
    pub recent_events: Vec<EventView>,
    pub fate_caches: Vec<FateCacheView>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProfileUpdateRequest {
    pub hero_name: Option<String>,
    pub fate_alignment: Option<String>,
    pub origin: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EquippedTitleRequest {
    pub title_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OpenCacheResponse {
    pub cache_id: Uuid,
    pub reward_type: String,
    pub reward_value: String,
    pub ledger_event_id: Uuid,
}
