//! WebAuthn ceremonies, passkey management, and the operator impersonation
//! backdoor (spec §6 `/api/auth*`).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::dto::{
    AuthKeyView, AuthenticateOptionsRequest, ChallengeResponse, ImpersonateResponse, RegisterOptionsRequest,
    RegisterVerifyResponse, SessionResponse, VerifyCredentialRequest,
};
use crate::error::{ApiError, Envelope};
use crate::extractors::SessionPrincipal;
use crate::state::AppState;

pub async fn register_options(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterOptionsRequest>,
) -> Result<Json<Envelope<ChallengeResponse>>, ApiError> {
    let challenge = state
        .auth
        .webauthn
        .start_enrollment(&req.hero_name, &req.fate_alignment, req.origin.as_deref(), &req.enrolled_by, req.source_id.as_deref())
        .await
        .map_err(ApiError::from)?;

    Ok(Envelope::ok(ChallengeResponse {
        challenge_id: challenge.challenge_id,
        options: serde_json::to_value(&challenge.options).map_err(|e| pik_core::PikError::internal(e.to_string()))?,
    }))
}

pub async fn register_verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyCredentialRequest>,
) -> Result<Json<Envelope<RegisterVerifyResponse>>, ApiError> {
    let outcome = state.auth.webauthn.finish_registration(req.credential).await.map_err(ApiError::from)?;
    for event in &outcome.events {
        state.ledger.publish_committed(event);
    }

    Ok(Envelope::ok(RegisterVerifyResponse {
        root_id: outcome.root_id,
        key_id: outcome.key_id,
        hero_name: outcome.hero_name,
        session_token: outcome.session.token,
        expires_at: outcome.session.expires_at,
        link_id: outcome.link_id,
    }))
}

pub async fn authenticate_options(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AuthenticateOptionsRequest>,
) -> Result<Json<Envelope<ChallengeResponse>>, ApiError> {
    let challenge = state.auth.webauthn.start_authentication(req.root_id).await.map_err(ApiError::from)?;

    Ok(Envelope::ok(ChallengeResponse {
        challenge_id: challenge.challenge_id,
        options: serde_json::to_value(&challenge.options).map_err(|e| pik_core::PikError::internal(e.to_string()))?,
    }))
}

pub async fn authenticate_verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyCredentialRequest>,
) -> Result<Json<Envelope<SessionResponse>>, ApiError> {
    let outcome = state.auth.webauthn.finish_authentication(req.credential).await.map_err(ApiError::from)?;
    state.ledger.publish_committed(&outcome.event);

    Ok(Envelope::ok(SessionResponse {
        root_id: outcome.root_id,
        key_id: outcome.key_id,
        session_token: outcome.session.token,
        expires_at: outcome.session.expires_at,
    }))
}

pub async fn list_keys(
    State(state): State<Arc<AppState>>,
    session: SessionPrincipal,
) -> Result<Json<Envelope<Vec<AuthKeyView>>>, ApiError> {
    let keys = state.auth.keys.list(session.root_id).await.map_err(ApiError::from)?;
    let views = keys
        .into_iter()
        .map(|k| AuthKeyView {
            key_id: k.id,
            credential_id: k.credential_id,
            device_type: k.device_type,
            friendly_name: k.friendly_name,
            status: k.status,
            created_at: k.created_at,
            last_used_at: k.last_used_at,
        })
        .collect();
    Ok(Envelope::ok(views))
}

pub async fn rotate_keys(
    State(state): State<Arc<AppState>>,
    session: SessionPrincipal,
) -> Result<Json<Envelope<ChallengeResponse>>, ApiError> {
    let challenge = state.auth.keys.rotate(session.root_id).await.map_err(ApiError::from)?;

    Ok(Envelope::ok(ChallengeResponse {
        challenge_id: challenge.challenge_id,
        options: serde_json::to_value(&challenge.options).map_err(|e| pik_core::PikError::internal(e.to_string()))?,
    }))
}

pub async fn rotate_keys_verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyCredentialRequest>,
) -> Result<Json<Envelope<RegisterVerifyResponse>>, ApiError> {
    let outcome = state.auth.webauthn.finish_registration(req.credential).await.map_err(ApiError::from)?;
    for event in &outcome.events {
        state.ledger.publish_committed(event);
    }

    Ok(Envelope::ok(RegisterVerifyResponse {
        root_id: outcome.root_id,
        key_id: outcome.key_id,
        hero_name: outcome.hero_name,
        session_token: outcome.session.token,
        expires_at: outcome.session.expires_at,
        link_id: outcome.link_id,
    }))
}

pub async fn revoke_key(
    State(state): State<Arc<AppState>>,
    session: SessionPrincipal,
    Path(key_id): Path<Uuid>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let event = state.auth.keys.revoke(session.root_id, key_id).await.map_err(ApiError::from)?;
    state.ledger.publish_committed(&event);
    Ok(Envelope::ok(serde_json::json!({ "revoked": true })))
}

/// Mints a session directly with no WebAuthn ceremony. An operator-only
/// backdoor (spec §6) — real deployments gate this route at the reverse
/// proxy, not in this handler.
pub async fn impersonate(
    State(state): State<Arc<AppState>>,
    Path(root_id): Path<Uuid>,
) -> Result<Json<Envelope<ImpersonateResponse>>, ApiError> {
    state.db.identity_repo().require(root_id).await.map_err(ApiError::from)?;
    let session = state.auth.sessions.issue(&state.db.pg, root_id).await.map_err(ApiError::from)?;

    Ok(Envelope::ok(ImpersonateResponse { root_id, session_token: session.token, expires_at: session.expires_at }))
}
