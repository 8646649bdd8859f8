//! The Ledger component (spec §4.3): appends identity events inside the
//! caller's transaction, then — once that transaction has committed —
//! publishes a projection to the [`pik_events::EventBus`].
//!
//! The two steps are intentionally not combined into one call: `append`
//! takes a transaction executor so it can share atomicity with whatever
//! domain write triggered it, while `publish_committed` is invoked by the
//! caller only after `tx.commit()` returns, matching the "EventBus
//! delivery happens after commit" ordering guarantee in spec §5(d).

use pik_db::{DbIdentityEvent, DbResult, EventRepo};
use pik_events::{EventBus, LedgerProjection};
use sqlx::PgExecutor;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct Ledger {
    events: EventRepo,
    bus: Arc<EventBus>,
}

impl Ledger {
    pub fn new(events: EventRepo, bus: Arc<EventBus>) -> Self {
        Self { events, bus }
    }

    /// Appends one row within the caller's transaction. Does not publish —
    /// call [`Ledger::publish_committed`] with the result after the outer
    /// transaction commits.
    pub async fn append<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        event_type: &str,
        source_id: Option<&str>,
        payload: serde_json::Value,
        changes: Option<serde_json::Value>,
    ) -> DbResult<DbIdentityEvent>
    where
        E: PgExecutor<'c>,
    {
        self.events
            .append(exec, root_id, event_type, source_id, payload, changes)
            .await
    }

    /// Publishes the post-commit projection for a row already appended by
    /// [`Ledger::append`]. Safe to call even with zero subscribers.
    pub fn publish_committed(&self, event: &DbIdentityEvent) {
        self.bus.publish(LedgerProjection {
            event_id: event.id,
            root_id: event.root_id,
            event_type: event.event_type.clone(),
            source_id: event.source_id.clone(),
            payload: event.payload.clone(),
            changes: event.changes_applied.clone(),
            created_at: event.created_at,
        });
    }

    pub async fn timeline(&self, root_id: Uuid) -> DbResult<Vec<DbIdentityEvent>> {
        self.events.timeline(root_id).await
    }

    pub async fn timeline_limited(&self, root_id: Uuid, limit: i64) -> DbResult<Vec<DbIdentityEvent>> {
        self.events.timeline_limited(root_id, limit).await
    }

    pub async fn count_by_type(&self, root_id: Uuid, event_type: &str) -> DbResult<i64> {
        self.events.count_by_type(root_id, event_type).await
    }

    pub async fn total_count(&self) -> DbResult<i64> {
        self.events.total_count().await
    }

    pub async fn counts_by_type(&self) -> DbResult<Vec<(String, i64)>> {
        self.events.counts_by_type().await
    }

    pub fn subscribe(&self) -> pik_events::Subscription {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }
}
