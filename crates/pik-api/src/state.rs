//! Shared application state threaded through every handler via axum's
//! `State` extractor: one connection pool, the full auth-layer bundle,
//! and the progression engines built on top of it.

use std::sync::Arc;

use pik_auth::AuthSuite;
use pik_db::Database;
use pik_ingest::{IngestEngine, LootEngine};
use pik_ledger::Ledger;

pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<AuthSuite>,
    pub ledger: Ledger,
    pub ingest: IngestEngine,
    pub loot: LootEngine,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        auth: Arc<AuthSuite>,
        ledger: Ledger,
        ingest: IngestEngine,
        loot: LootEngine,
    ) -> Self {
        Self { db, auth, ledger, ingest, loot }
    }
}
