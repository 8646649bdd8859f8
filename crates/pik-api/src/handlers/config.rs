//! Runtime tunable config (spec §6 `/api/config`, §4.4).

use std::sync::Arc;

use axum::{extract::State, Json};
use pik_core::{config_keys, Kind};

use crate::dto::{ConfigEntryView, SetConfigRequest};
use crate::error::{ApiError, Envelope};
use crate::state::AppState;

pub async fn get_config(State(state): State<Arc<AppState>>) -> Result<Json<Envelope<Vec<ConfigEntryView>>>, ApiError> {
    let rows = state.db.config_repo().get_all().await.map_err(ApiError::from)?;
    let parsed = config_keys::parse_all(&rows.into_iter().map(|r| (r.config_key, r.config_value)).collect());

    let mut entries: Vec<ConfigEntryView> =
        parsed.into_iter().map(|(config_key, value)| ConfigEntryView { config_key, value: value.to_json() }).collect();
    entries.sort_by(|a, b| a.config_key.cmp(&b.config_key));

    Ok(Envelope::ok(entries))
}

pub async fn set_config(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetConfigRequest>,
) -> Result<Json<Envelope<ConfigEntryView>>, ApiError> {
    if !config_keys::is_known(&req.config_key) {
        return Err(ApiError::new(Kind::BadRequest, format!("unknown config key: {}", req.config_key)));
    }

    let entry = state.db.config_repo().set(&req.config_key, &req.config_value).await.map_err(ApiError::from)?;
    let value = config_keys::ParsedValue::from_stored(&entry.config_value);

    Ok(Envelope::ok(ConfigEntryView { config_key: entry.config_key, value: value.to_json() }))
}
