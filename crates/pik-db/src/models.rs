//! Database models, mapped from PostgreSQL tables onto spec §3's entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbRootIdentity {
    pub id: Uuid,
    pub hero_name: String,
    pub fate_alignment: String,
    pub origin: Option<String>,
    pub fate_xp: i64,
    pub fate_level: i32,
    pub status: String,
    pub enrolled_by: String,
    pub enrolled_at: DateTime<Utc>,
    pub equipped_title_id: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPersona {
    pub id: Uuid,
    pub root_id: Uuid,
    pub display_name: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// WebAuthn
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAuthKey {
    pub id: Uuid,
    pub root_id: Uuid,
    pub credential_id: String,
    pub public_key: serde_json::Value,
    pub counter: i64,
    pub device_type: Option<String>,
    pub backed_up: bool,
    pub transports: serde_json::Value,
    pub friendly_name: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbWebAuthnChallenge {
    pub id: Uuid,
    pub challenge: String,
    pub challenge_type: String,
    pub root_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbSessionToken {
    pub id: Uuid,
    pub token_hash: String,
    pub root_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Sources & consent
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbSource {
    pub id: String,
    pub name: String,
    pub status: String,
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbSourceLink {
    pub id: Uuid,
    pub root_id: Uuid,
    pub source_id: String,
    pub scope: String,
    pub status: String,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbIdentityEvent {
    pub id: Uuid,
    pub root_id: Uuid,
    pub event_type: String,
    pub source_id: Option<String>,
    pub payload: serde_json::Value,
    pub changes_applied: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Titles & markers
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbTitle {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbUserTitle {
    pub root_id: Uuid,
    pub title_id: String,
    pub granted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbFateMarker {
    pub id: Uuid,
    pub root_id: Uuid,
    pub source_id: Option<String>,
    pub marker: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbConfigEntry {
    pub config_key: String,
    pub config_value: String,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Loot & gear
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbFateCache {
    pub id: Uuid,
    pub root_id: Uuid,
    pub cache_type: String,
    pub rarity: String,
    pub status: String,
    pub trigger: String,
    pub reward_type: Option<String>,
    pub reward_value: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbLootTableEntry {
    pub id: Uuid,
    pub cache_type: String,
    pub reward_type: String,
    pub reward_value: String,
    pub display_name: String,
    pub weight: i32,
    pub rarity: String,
    pub min_level: i32,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbGearItem {
    pub id: Uuid,
    pub name: String,
    pub slot: String,
    pub modifiers: serde_json::Value,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPlayerInventory {
    pub id: Uuid,
    pub root_id: Uuid,
    pub gear_item_id: Uuid,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPlayerEquipment {
    pub root_id: Uuid,
    pub slot: String,
    pub inventory_id: Uuid,
    pub equipped_at: DateTime<Utc>,
}
