//! Small response shapes shared by more than one route group.

use chrono::{DateTime, Utc};
use pik_db::DbIdentityEvent;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// One row of a timeline view. The ledger only stores the source id, so the
/// caller resolves `source_name` itself (spec §6 `GET .../timeline`).
#[derive(Debug, Serialize)]
pub struct EventView {
    pub event_id: Uuid,
    pub event_type: String,
    pub source_id: Option<String>,
    pub source_name: Option<String>,
    pub payload: Value,
    pub changes_applied: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl EventView {
    pub fn from_row(row: DbIdentityEvent, source_name: Option<String>) -> Self {
        Self {
            event_id: row.id,
            event_type: row.event_type,
            source_id: row.source_id,
            source_name,
            payload: row.payload,
            changes_applied: row.changes_applied,
            created_at: row.created_at,
        }
    }
}
