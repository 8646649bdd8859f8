//! Consent link lifecycle (spec §6 `/api/users/:root_id/links*`).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::dto::{CreateLinkRequest, LinkView, RevokeLinkRequest};
use crate::error::{ApiError, Envelope};
use crate::state::AppState;

fn link_view(l: pik_db::DbSourceLink) -> LinkView {
    LinkView {
        link_id: l.id,
        root_id: l.root_id,
        source_id: l.source_id,
        scope: l.scope,
        status: l.status,
        granted_by: l.granted_by,
        granted_at: l.granted_at,
        revoked_at: l.revoked_at,
        revoked_by: l.revoked_by,
    }
}

pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Path(root_id): Path<Uuid>,
    Json(req): Json<CreateLinkRequest>,
) -> Result<Json<Envelope<LinkView>>, ApiError> {
    let scope = match req.scope {
        Some(scope) => scope,
        None => state
            .db
            .config_repo()
            .get("default_consent_scope")
            .await
            .map_err(ApiError::from)?
            .map(|entry| entry.config_value)
            .unwrap_or_else(|| "progression.write".to_string()),
    };

    let mut tx = state.db.pg.begin().await.map_err(pik_db::DbError::from)?;
    let link = state.auth.consent.grant(&mut *tx, root_id, &req.source_id, &req.granted_by, &scope).await.map_err(ApiError::from)?;

    let event = state
        .ledger
        .append(
            &mut *tx,
            root_id,
            "source.link_granted",
            Some(req.source_id.as_str()),
            serde_json::json!({ "scope": scope, "granted_by": req.granted_by }),
            None,
        )
        .await
        .map_err(ApiError::from)?;

    tx.commit().await.map_err(pik_db::DbError::from)?;
    state.ledger.publish_committed(&event);

    Ok(Envelope::ok(link_view(link)))
}

pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Path(root_id): Path<Uuid>,
) -> Result<Json<Envelope<Vec<LinkView>>>, ApiError> {
    let links = state.auth.consent.list_for_root(root_id).await.map_err(ApiError::from)?;
    Ok(Envelope::ok(links.into_iter().map(link_view).collect()))
}

pub async fn revoke_link(
    State(state): State<Arc<AppState>>,
    Path((root_id, link_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<RevokeLinkRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let mut tx = state.db.pg.begin().await.map_err(pik_db::DbError::from)?;
    state.auth.consent.revoke(&mut *tx, root_id, link_id, req.revoked_by.as_deref()).await.map_err(ApiError::from)?;

    let event = state
        .ledger
        .append(
            &mut *tx,
            root_id,
            "source.link_revoked",
            None,
            serde_json::json!({ "link_id": link_id, "revoked_by": req.revoked_by }),
            None,
        )
        .await
        .map_err(ApiError::from)?;

    tx.commit().await.map_err(pik_db::DbError::from)?;
    state.ledger.publish_committed(&event);

    Ok(Envelope::ok(serde_json::json!({ "revoked": true })))
}
