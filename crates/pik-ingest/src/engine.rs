//! The `POST /api/ingest` dispatch (spec §4.10): load the identity, check
//! consent, apply the event's formula, append the ledger row, and fire off
//! any best-effort side grants (titles, caches).

use pik_auth::Consent;
use pik_db::{ConfigRepo, DbIdentityEvent, DbRootIdentity, IdentityRepo};
use pik_ledger::Ledger;
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{IngestError, IngestResult};
use crate::loot::LootEngine;
use crate::progression::{apply_xp, boss_title_for, CascadeResult};
use crate::xp_config::XpConfig;

pub struct IngestRequest {
    pub root_id: Uuid,
    pub event_type: String,
    pub payload: Value,
}

pub struct IngestOutcome {
    pub event_id: Uuid,
    pub event_type: String,
    pub changes: Value,
}

#[derive(Clone)]
pub struct IngestEngine {
    identities: IdentityRepo,
    ledger: Ledger,
    config: ConfigRepo,
    consent: Consent,
    loot: LootEngine,
    pool: PgPool,
}

#[derive(Deserialize)]
struct SessionCompletedPayload {
    difficulty: String,
    nodes_completed: i64,
    boss_damage_pct: f64,
}

#[derive(Deserialize)]
struct XpGrantedPayload {
    xp: f64,
}

#[derive(Deserialize)]
struct NodeCompletedPayload {
    #[allow(dead_code)]
    node_id: String,
}

#[derive(Deserialize)]
struct TitleGrantedPayload {
    title_id: String,
}

#[derive(Deserialize)]
struct FateMarkerPayload {
    marker: String,
}

impl IngestEngine {
    pub fn new(identities: IdentityRepo, ledger: Ledger, config: ConfigRepo, consent: Consent, loot: LootEngine) -> Self {
        let pool = identities.pool().clone();
        Self { identities, ledger, config, consent, loot, pool }
    }

    pub async fn ingest(&self, req: IngestRequest, source_id: &str) -> IngestResult<IngestOutcome> {
        let identity = self.identities.find_by_id(req.root_id).await?.ok_or(IngestError::UnknownRoot(req.root_id))?;
        self.consent.validate_active_link(self.identities.pool(), req.root_id, source_id).await?;

        match req.event_type.as_str() {
            "progression.session_completed" => self.handle_session_completed(&identity, &req, source_id).await,
            "progression.xp_granted" => self.handle_xp_granted(&identity, &req, source_id).await,
            "progression.node_completed" => self.handle_node_completed(&identity, &req, source_id).await,
            "progression.title_granted" => self.handle_title_granted(&identity, &req, source_id).await,
            "progression.fate_marker" => self.handle_fate_marker(&identity, &req, source_id).await,
            other => Err(IngestError::UnknownEventType(other.to_string())),
        }
    }

    async fn handle_session_completed(
        &self,
        identity: &DbRootIdentity,
        req: &IngestRequest,
        source_id: &str,
    ) -> IngestResult<IngestOutcome> {
        let payload: SessionCompletedPayload =
            serde_json::from_value(req.payload.clone()).map_err(|e| IngestError::InvalidPayload(e.to_string()))?;
        if payload.difficulty != "normal" && payload.difficulty != "hard" {
            return Err(IngestError::InvalidPayload("difficulty must be \"normal\" or \"hard\"".into()));
        }
        if payload.nodes_completed < 0 {
            return Err(IngestError::InvalidPayload("nodes_completed must be >= 0".into()));
        }
        if !(0.0..=100.0).contains(&payload.boss_damage_pct) {
            return Err(IngestError::InvalidPayload("boss_damage_pct must be within [0, 100]".into()));
        }

        let cfg = XpConfig::load(&self.config).await?;
        let session_xp =
            if payload.difficulty == "hard" { cfg.xp_per_session_hard() } else { cfg.xp_per_session_normal() };
        let boss_bonus = ((payload.boss_damage_pct / 100.0) * cfg.xp_boss_tier_pct() * session_xp).floor();
        let node_xp = (payload.nodes_completed as f64 * cfg.xp_node_completion()).floor();
        let total_xp = ((session_xp + boss_bonus + node_xp) * cfg.event_xp_multiplier()).floor() as i64;

        let cascade = apply_xp(identity.fate_xp, identity.fate_level, total_xp, cfg.xp_base_threshold(), cfg.xp_level_multiplier());

        let mut changes = serde_json::json!({
            "session_xp": session_xp as i64,
            "boss_bonus_xp": boss_bonus as i64,
            "node_xp": node_xp as i64,
            "total_xp": total_xp,
        });
        if let Some(obj) = changes.as_object_mut() {
            if cascade.leveled_up() {
                obj.insert(
                    "level_up".into(),
                    serde_json::json!({"from": identity.fate_level, "to": cascade.new_level}),
                );
            }
        }

        let event = self
            .commit_progression(identity.id, "progression.session_completed", source_id, &req.payload, &cascade, changes.clone())
            .await?;

        for title in &cascade.titles_to_grant {
            self.grant_title_best_effort(identity.id, title, source_id).await;
        }
        if let Some(boss_title) = boss_title_for(payload.boss_damage_pct) {
            self.grant_title_best_effort(identity.id, boss_title, source_id).await;
        }
        if cascade.leveled_up() {
            self.grant_cache_best_effort(identity.id, "level_up", "level_up", None, source_id).await;
        }
        if payload.boss_damage_pct >= 50.0 {
            self.grant_cache_best_effort(identity.id, "boss_kill", "boss_kill", Some(payload.boss_damage_pct), source_id).await;
        }

        Ok(IngestOutcome { event_id: event.id, event_type: "progression.session_completed".into(), changes })
    }

    async fn handle_xp_granted(
        &self,
        identity: &DbRootIdentity,
        req: &IngestRequest,
        source_id: &str,
    ) -> IngestResult<IngestOutcome> {
        let payload: XpGrantedPayload =
            serde_json::from_value(req.payload.clone()).map_err(|e| IngestError::InvalidPayload(e.to_string()))?;

        let cfg = XpConfig::load(&self.config).await?;
        let total_xp = (payload.xp * cfg.event_xp_multiplier()).floor() as i64;
        let cascade = apply_xp(identity.fate_xp, identity.fate_level, total_xp, cfg.xp_base_threshold(), cfg.xp_level_multiplier());

        let changes = self.xp_changes(identity, &cascade, total_xp);
        let event = self
            .commit_progression(identity.id, "progression.xp_granted", source_id, &req.payload, &cascade, changes.clone())
            .await?;

        for title in &cascade.titles_to_grant {
            self.grant_title_best_effort(identity.id, title, source_id).await;
        }

        Ok(IngestOutcome { event_id: event.id, event_type: "progression.xp_granted".into(), changes })
    }

    async fn handle_node_completed(
        &self,
        identity: &DbRootIdentity,
        req: &IngestRequest,
        source_id: &str,
    ) -> IngestResult<IngestOutcome> {
        let _payload: NodeCompletedPayload =
            serde_json::from_value(req.payload.clone()).map_err(|e| IngestError::InvalidPayload(e.to_string()))?;

        let cfg = XpConfig::load(&self.config).await?;
        let total_xp = (cfg.xp_node_completion() * cfg.event_xp_multiplier()).floor() as i64;
        let cascade = apply_xp(identity.fate_xp, identity.fate_level, total_xp, cfg.xp_base_threshold(), cfg.xp_level_multiplier());

        let changes = self.xp_changes(identity, &cascade, total_xp);
        let event = self
            .commit_progression(identity.id, "progression.node_completed", source_id, &req.payload, &cascade, changes.clone())
            .await?;

        for title in &cascade.titles_to_grant {
            self.grant_title_best_effort(identity.id, title, source_id).await;
        }

        Ok(IngestOutcome { event_id: event.id, event_type: "progression.node_completed".into(), changes })
    }

    async fn handle_title_granted(
        &self,
        identity: &DbRootIdentity,
        req: &IngestRequest,
        source_id: &str,
    ) -> IngestResult<IngestOutcome> {
        let payload: TitleGrantedPayload =
            serde_json::from_value(req.payload.clone()).map_err(|e| IngestError::InvalidPayload(e.to_string()))?;

        if !self.identities.title_exists(&payload.title_id).await? {
            return Err(IngestError::UnknownTitle(payload.title_id));
        }

        let mut tx = self.pool.begin().await.map_err(pik_db::DbError::from)?;
        let granted = self.identities.try_grant_title(&mut *tx, identity.id, &payload.title_id).await?;
        let changes = serde_json::json!({"title_id": payload.title_id, "already_held": !granted});
        let event = self
            .ledger
            .append(&mut *tx, identity.id, "progression.title_granted", Some(source_id), req.payload.clone(), Some(changes.clone()))
            .await?;
        tx.commit().await.map_err(pik_db::DbError::from)?;
        self.ledger.publish_committed(&event);

        Ok(IngestOutcome { event_id: event.id, event_type: "progression.title_granted".into(), changes })
    }

    async fn handle_fate_marker(
        &self,
        identity: &DbRootIdentity,
        req: &IngestRequest,
        source_id: &str,
    ) -> IngestResult<IngestOutcome> {
        let payload: FateMarkerPayload =
            serde_json::from_value(req.payload.clone()).map_err(|e| IngestError::InvalidPayload(e.to_string()))?;

        let mut tx = self.pool.begin().await.map_err(pik_db::DbError::from)?;
        self.identities.insert_marker(&mut *tx, identity.id, Some(source_id), &payload.marker).await?;
        let changes = serde_json::json!({"marker": payload.marker});
        let event = self
            .ledger
            .append(&mut *tx, identity.id, "progression.fate_marker", Some(source_id), req.payload.clone(), Some(changes.clone()))
            .await?;
        tx.commit().await.map_err(pik_db::DbError::from)?;
        self.ledger.publish_committed(&event);

        Ok(IngestOutcome { event_id: event.id, event_type: "progression.fate_marker".into(), changes })
    }

    fn xp_changes(&self, identity: &DbRootIdentity, cascade: &CascadeResult, total_xp: i64) -> Value {
        let mut changes = serde_json::json!({"total_xp": total_xp});
        if let Some(obj) = changes.as_object_mut() {
            if cascade.leveled_up() {
                obj.insert("level_up".into(), serde_json::json!({"from": identity.fate_level, "to": cascade.new_level}));
            }
        }
        changes
    }

    /// Persists the XP/level mutation and the top-level ledger row in one
    /// transaction (spec §4.10 "within the same transaction that mutates state").
    async fn commit_progression(
        &self,
        root_id: Uuid,
        event_type: &str,
        source_id: &str,
        payload: &Value,
        cascade: &CascadeResult,
        changes: Value,
    ) -> IngestResult<DbIdentityEvent> {
        let mut tx = self.pool.begin().await.map_err(pik_db::DbError::from)?;
        self.identities.update_progression(&mut *tx, root_id, cascade.new_xp, cascade.new_level).await?;
        let event = self
            .ledger
            .append(&mut *tx, root_id, event_type, Some(source_id), payload.clone(), Some(changes))
            .await?;
        tx.commit().await.map_err(pik_db::DbError::from)?;
        self.ledger.publish_committed(&event);
        Ok(event)
    }

    /// Side grants run outside the top-level transaction and are
    /// best-effort: a failure is logged but never rolled back or
    /// propagated to the caller (spec §4.10).
    async fn grant_title_best_effort(&self, root_id: Uuid, title_id: &str, source_id: &str) {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(error = %e, root_id = %root_id, title_id, "failed to open tx for side-grant title");
                return;
            }
        };
        let granted = match self.identities.try_grant_title(&mut *tx, root_id, title_id).await {
            Ok(g) => g,
            Err(e) => {
                tracing::warn!(error = %e, root_id = %root_id, title_id, "failed to grant side-effect title");
                return;
            }
        };
        if !granted {
            return;
        }
        let payload = serde_json::json!({"title_id": title_id});
        let event = match self.ledger.append(&mut *tx, root_id, "title.granted", Some(source_id), payload, None).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, root_id = %root_id, title_id, "failed to append title-grant ledger row");
                return;
            }
        };
        if let Err(e) = tx.commit().await {
            tracing::warn!(error = %e, root_id = %root_id, title_id, "failed to commit side-grant title");
            return;
        }
        self.ledger.publish_committed(&event);
    }

    async fn grant_cache_best_effort(
        &self,
        root_id: Uuid,
        cache_type: &str,
        trigger: &str,
        boss_damage_pct: Option<f64>,
        source_id: &str,
    ) {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(error = %e, root_id = %root_id, cache_type, "failed to open tx for side-grant cache");
                return;
            }
        };
        let cache = match self.loot.grant_cache(&mut *tx, root_id, cache_type, trigger, boss_damage_pct, None).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, root_id = %root_id, cache_type, "failed to grant side-effect cache");
                return;
            }
        };
        let payload = serde_json::json!({"cache_id": cache.id, "cache_type": cache_type, "rarity": cache.rarity});
        let event = match self.ledger.append(&mut *tx, root_id, "loot.cache_granted", Some(source_id), payload, None).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, root_id = %root_id, cache_type, "failed to append cache-grant ledger row");
                return;
            }
        };
        if let Err(e) = tx.commit().await {
            tracing::warn!(error = %e, root_id = %root_id, cache_type, "failed to commit side-grant cache");
            return;
        }
        self.ledger.publish_committed(&event);
    }
}
