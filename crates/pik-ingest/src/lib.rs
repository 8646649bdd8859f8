//! Progression ingest: the `POST /api/ingest` dispatch, the XP/level
//! cascade, and the loot engine that sealed caches draw their rewards
//! from (spec §4.10-§4.11).

pub mod engine;
pub mod error;
pub mod loot;
pub mod progression;
pub mod rarity;
pub mod xp_config;

pub use engine::{IngestEngine, IngestOutcome, IngestRequest};
pub use error::{IngestError, IngestResult};
pub use loot::{LootEngine, OpenCacheOutcome, OpenedReward};
pub use progression::{apply_xp, boss_title_for, level_threshold, level_titles, CascadeResult};
