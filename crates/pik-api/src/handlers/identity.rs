//! Identity, progression, and loot-cache handlers (spec §6 `/api/users*`).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use pik_core::Kind;
use pik_ingest::{level_threshold, xp_config::XpConfig};
use uuid::Uuid;

use crate::dto::{
    EnrollRequest, EnrollResponse, EquippedTitleRequest, EventView, FateCacheView, FateMarkerView,
    IdentityView, OpenCacheResponse, PersonaView, ProfileUpdateRequest, ProgressionView, SourceLinkView,
    TitleView, UserDetail, UserSummary,
};
use crate::error::{ApiError, Envelope};
use crate::extractors::SessionPrincipal;
use crate::state::AppState;

fn identity_view(row: &pik_db::DbRootIdentity) -> IdentityView {
    IdentityView {
        root_id: row.id,
        hero_name: row.hero_name.clone(),
        fate_alignment: row.fate_alignment.clone(),
        origin: row.origin.clone(),
        status: row.status.clone(),
        enrolled_by: row.enrolled_by.clone(),
        enrolled_at: row.enrolled_at,
        equipped_title_id: row.equipped_title_id.clone(),
    }
}

async fn build_progression(
    state: &AppState,
    identity: &pik_db::DbRootIdentity,
) -> Result<ProgressionView, ApiError> {
    let xp_config = XpConfig::load(&state.db.config_repo()).await?;
    let base = xp_config.xp_base_threshold();
    let mult = xp_config.xp_level_multiplier();

    let entered_at_current = if identity.fate_level <= 1 { 0 } else { level_threshold(base, mult, identity.fate_level - 1) };
    let needed_for_next = level_threshold(base, mult, identity.fate_level) - identity.fate_xp;

    let total_sessions = state.db.event_repo().count_by_type(identity.id, "progression.session_completed").await.map_err(ApiError::from)?;

    let held = state.db.identity_repo().list_titles_for(identity.id).await.map_err(ApiError::from)?;
    let catalog = state.db.identity_repo().title_catalog().await.map_err(ApiError::from)?;
    let catalog_by_id: HashMap<_, _> = catalog.into_iter().map(|t| (t.id.clone(), t)).collect();

    let titles: Vec<String> = held.iter().map(|t| t.title_id.clone()).collect();
    let titles_detail = held
        .iter()
        .filter_map(|t| catalog_by_id.get(&t.title_id))
        .map(|t| TitleView { id: t.id.clone(), name: t.name.clone(), description: t.description.clone() })
        .collect();

    let markers = state.db.identity_repo().list_markers(identity.id).await.map_err(ApiError::from)?;
    let fate_markers = markers
        .into_iter()
        .map(|m| FateMarkerView { id: m.id, source_id: m.source_id, marker: m.marker, created_at: m.created_at })
        .collect();

    Ok(ProgressionView {
        fate_xp: identity.fate_xp,
        fate_level: identity.fate_level,
        xp_in_current_level: identity.fate_xp - entered_at_current,
        xp_needed_for_next: needed_for_next,
        total_sessions,
        titles,
        titles_detail,
        fate_markers,
    })
}

pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnrollRequest>,
) -> Result<Json<Envelope<EnrollResponse>>, ApiError> {
    let mut tx = state.db.pg.begin().await.map_err(pik_db::DbError::from)?;

    let identity = state
        .db
        .identity_repo()
        .create(&mut *tx, &req.hero_name, &req.fate_alignment, req.origin.as_deref(), &req.enrolled_by)
        .await
        .map_err(ApiError::from)?;
    let persona = state
        .db
        .identity_repo()
        .create_persona(&mut *tx, identity.id, &req.hero_name, true)
        .await
        .map_err(ApiError::from)?;

    let event = state
        .ledger
        .append(
            &mut *tx,
            identity.id,
            "identity.enrolled",
            req.source_id.as_deref(),
            serde_json::json!({ "hero_name": req.hero_name, "fate_alignment": req.fate_alignment }),
            None,
        )
        .await
        .map_err(ApiError::from)?;

    let mut link_id = None;
    if let Some(source_id) = &req.source_id {
        let scope = state
            .db
            .config_repo()
            .get("default_consent_scope")
            .await
            .map_err(ApiError::from)?
            .map(|entry| entry.config_value)
            .unwrap_or_else(|| "progression.write".to_string());
        let link = state
            .auth
            .consent
            .grant(&mut *tx, identity.id, source_id, &req.enrolled_by, &scope)
            .await
            .map_err(ApiError::from)?;
        link_id = Some(link.id);
    }

    tx.commit().await.map_err(pik_db::DbError::from)?;
    state.ledger.publish_committed(&event);

    Ok(Envelope::ok(EnrollResponse {
        root_id: identity.id,
        persona_id: persona.id,
        hero_name: identity.hero_name,
        fate_alignment: identity.fate_alignment,
        link_id,
        enrolled_at: identity.enrolled_at,
    }))
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Envelope<Vec<UserSummary>>>, ApiError> {
    let rows = state.db.identity_repo().list_all().await.map_err(ApiError::from)?;
    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        let active_sources = state
            .db
            .source_repo()
            .list_links_for_root(row.id)
            .await
            .map_err(ApiError::from)?
            .into_iter()
            .filter(|l| l.status == "active")
            .count() as i64;
        summaries.push(UserSummary {
            root_id: row.id,
            hero_name: row.hero_name,
            fate_alignment: row.fate_alignment,
            fate_xp: row.fate_xp,
            fate_level: row.fate_level,
            active_sources,
        });
    }
    Ok(Envelope::ok(summaries))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(root_id): Path<Uuid>,
) -> Result<Json<Envelope<UserDetail>>, ApiError> {
    let identity = state.db.identity_repo().require(root_id).await.map_err(ApiError::from)?;
    let persona = state.db.identity_repo().find_persona_primary(root_id).await.map_err(ApiError::from)?;
    let progression = build_progression(&state, &identity).await?;

    let links = state.db.source_repo().list_links_for_root(root_id).await.map_err(ApiError::from)?;
    let source_links = links
        .into_iter()
        .map(|l| SourceLinkView {
            link_id: l.id,
            source_id: l.source_id,
            scope: l.scope,
            status: l.status,
            granted_by: l.granted_by,
            granted_at: l.granted_at,
            revoked_at: l.revoked_at,
            revoked_by: l.revoked_by,
        })
        .collect();

    let events = state.db.event_repo().timeline_limited(root_id, 20).await.map_err(ApiError::from)?;
    let mut source_names: HashMap<String, String> = HashMap::new();
    let mut recent_events = Vec::with_capacity(events.len());
    for row in events {
        let name = if let Some(source_id) = &row.source_id {
            if let Some(cached) = source_names.get(source_id) {
                Some(cached.clone())
            } else {
                let resolved = state.db.source_repo().find_by_id(source_id).await.map_err(ApiError::from)?.map(|s| s.name);
                if let Some(resolved) = &resolved {
                    source_names.insert(source_id.clone(), resolved.clone());
                }
                resolved
            }
        } else {
            None
        };
        recent_events.push(EventView::from_row(row, name));
    }

    let caches = state.db.loot_repo().list_for_root(root_id).await.map_err(ApiError::from)?;
    let fate_caches = caches
        .into_iter()
        .map(|c| FateCacheView {
            cache_id: c.id,
            cache_type: c.cache_type,
            rarity: c.rarity,
            status: c.status,
            trigger: c.trigger,
            reward_type: c.reward_type,
            reward_value: c.reward_value,
            opened_at: c.opened_at,
            created_at: c.created_at,
        })
        .collect();

    Ok(Envelope::ok(UserDetail {
        identity: identity_view(&identity),
        persona: persona.map(|p| PersonaView { persona_id: p.id, display_name: p.display_name, is_primary: p.is_primary }),
        progression,
        source_links,
        recent_events,
        fate_caches,
    }))
}

pub async fn get_timeline(
    State(state): State<Arc<AppState>>,
    Path(root_id): Path<Uuid>,
) -> Result<Json<Envelope<Vec<EventView>>>, ApiError> {
    state.db.identity_repo().require(root_id).await.map_err(ApiError::from)?;
    let events = state.db.event_repo().timeline(root_id).await.map_err(ApiError::from)?;

    let mut source_names: HashMap<String, String> = HashMap::new();
    let mut views = Vec::with_capacity(events.len());
    for row in events {
        let name = if let Some(source_id) = &row.source_id {
            if let Some(cached) = source_names.get(source_id) {
                Some(cached.clone())
            } else {
                let resolved = state.db.source_repo().find_by_id(source_id).await.map_err(ApiError::from)?.map(|s| s.name);
                if let Some(resolved) = &resolved {
                    source_names.insert(source_id.clone(), resolved.clone());
                }
                resolved
            }
        } else {
            None
        };
        views.push(EventView::from_row(row, name));
    }
    Ok(Envelope::ok(views))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(root_id): Path<Uuid>,
    session: SessionPrincipal,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<Envelope<IdentityView>>, ApiError> {
    if session.root_id != root_id {
        return Err(ApiError::new(Kind::Forbidden, "session does not own this identity"));
    }

    let mut tx = state.db.pg.begin().await.map_err(pik_db::DbError::from)?;
    state
        .db
        .identity_repo()
        .update_profile(&mut *tx, root_id, req.hero_name.as_deref(), req.fate_alignment.as_deref(), req.origin.as_deref())
        .await
        .map_err(ApiError::from)?;
    tx.commit().await.map_err(pik_db::DbError::from)?;

    let identity = state.db.identity_repo().require(root_id).await.map_err(ApiError::from)?;
    Ok(Envelope::ok(identity_view(&identity)))
}

pub async fn set_equipped_title(
    State(state): State<Arc<AppState>>,
    Path(root_id): Path<Uuid>,
    session: SessionPrincipal,
    Json(req): Json<EquippedTitleRequest>,
) -> Result<Json<Envelope<IdentityView>>, ApiError> {
    if session.root_id != root_id {
        return Err(ApiError::new(Kind::Forbidden, "session does not own this identity"));
    }

    if let Some(title_id) = &req.title_id {
        let held = state.db.identity_repo().list_titles_for(root_id).await.map_err(ApiError::from)?;
        if !held.iter().any(|t| &t.title_id == title_id) {
            return Err(ApiError::new(Kind::NotFound, "title not held by this identity"));
        }
    }

    let mut tx = state.db.pg.begin().await.map_err(pik_db::DbError::from)?;
    state.db.identity_repo().set_equipped_title(&mut *tx, root_id, req.title_id.as_deref()).await.map_err(ApiError::from)?;
    tx.commit().await.map_err(pik_db::DbError::from)?;

    let identity = state.db.identity_repo().require(root_id).await.map_err(ApiError::from)?;
    Ok(Envelope::ok(identity_view(&identity)))
}

pub async fn open_cache(
    State(state): State<Arc<AppState>>,
    Path((root_id, cache_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Envelope<OpenCacheResponse>>, ApiError> {
    let outcome = state.loot.open_cache(root_id, cache_id).await.map_err(ApiError::from)?;
    Ok(Envelope::ok(OpenCacheResponse {
        cache_id: outcome.cache.id,
        reward_type: outcome.reward.reward_type,
        reward_value: outcome.reward.reward_value,
        ledger_event_id: outcome.ledger_event_id,
    }))
}
