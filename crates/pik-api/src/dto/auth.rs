//! WebAuthn ceremony, key management, and session shapes (spec §6 `/api/auth*`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterOptionsRequest {
    pub hero_name: String,
    pub fate_alignment: String,
    pub origin: Option<String>,
    pub enrolled_by: String,
    pub source_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge_id: Uuid,
    pub options: Value,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCredentialRequest {
    pub credential: Value,
}

#[derive(Debug, Serialize)]
pub struct RegisterVerifyResponse {
    pub root_id: Uuid,
    pub key_id: Uuid,
    pub hero_name: String,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub link_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AuthenticateOptionsRequest {
    pub root_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub root_id: Uuid,
    pub key_id: Uuid,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AuthKeyView {
    pub key_id: Uuid,
    pub credential_id: String,
    pub device_type: Option<String>,
    pub friendly_name: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ImpersonateResponse {
    pub root_id: Uuid,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}
