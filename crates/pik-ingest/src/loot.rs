//! Cache grants and the opening ceremony (spec §4.11).

use pik_db::{DbFateCache, GearRepo, IdentityRepo, LootRepo};
use pik_ledger::Ledger;
use rand::Rng;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::{IngestError, IngestResult};
use crate::rarity::{pick_rarity, weighted_pick};

#[derive(Clone)]
pub struct LootEngine {
    loot: LootRepo,
    identities: IdentityRepo,
    gear: GearRepo,
    ledger: Ledger,
    pool: PgPool,
}

/// What actually got applied when a cache was opened, recorded verbatim
/// onto the cache row and into the `loot.cache_opened` ledger entry.
pub struct OpenedReward {
    pub reward_type: String,
    pub reward_value: String,
}

pub struct OpenCacheOutcome {
    pub cache: DbFateCache,
    pub reward: OpenedReward,
    pub ledger_event_id: Uuid,
}

impl LootEngine {
    pub fn new(loot: LootRepo, identities: IdentityRepo, gear: GearRepo, ledger: Ledger) -> Self {
        let pool = loot.pool().clone();
        Self { loot, identities, gear, ledger, pool }
    }

    /// Creates a sealed cache, rolling its rarity against the player's
    /// current level and the triggering event (spec §4.11 "Rarity pick").
    /// `forced_rarity` lets operators override the roll for demo/manual
    /// grants.
    pub async fn grant_cache<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        cache_type: &str,
        trigger: &str,
        boss_damage_pct: Option<f64>,
        forced_rarity: Option<&str>,
    ) -> IngestResult<DbFateCache>
    where
        E: PgExecutor<'c>,
    {
        let identity = self.identities.require(root_id).await?;
        let rarity = match forced_rarity {
            Some(r) => r.to_string(),
            None => {
                let roll = rand::thread_rng().gen_range(0.0..100.0);
                pick_rarity(identity.fate_level, trigger, boss_damage_pct, roll).to_string()
            }
        };
        Ok(self.loot.create_cache(exec, root_id, cache_type, &rarity, trigger).await?)
    }

    /// Opens a sealed cache end to end: ownership/status checks, the
    /// weighted draw over the matching loot table, reward application,
    /// and the `loot.cache_opened` ledger append — all in one transaction.
    pub async fn open_cache(&self, root_id: Uuid, cache_id: Uuid) -> IngestResult<OpenCacheOutcome> {
        let cache = self.loot.find_by_id(cache_id).await?.ok_or(IngestError::CacheNotFound(cache_id))?;
        if cache.root_id != root_id {
            return Err(IngestError::CacheNotOwned(cache_id, root_id));
        }
        if cache.status != "sealed" {
            return Err(IngestError::CacheAlreadyOpened);
        }

        let identity = self.identities.require(root_id).await?;
        let entries = self.loot.loot_table_for(&cache.cache_type, identity.fate_level).await?;
        if entries.is_empty() {
            return Err(IngestError::EmptyLootTable);
        }

        let total_weight: i32 = entries.iter().map(|e| e.weight).sum();
        let roll = rand::thread_rng().gen_range(0.0..total_weight as f64);
        let weights: Vec<i32> = entries.iter().map(|e| e.weight).collect();
        let chosen = &entries[weighted_pick(&weights, roll)];

        let mut tx = self.pool.begin().await.map_err(pik_db::DbError::from)?;

        let reward = match chosen.reward_type.as_str() {
            "xp_boost" => {
                let delta: i64 = chosen
                    .reward_value
                    .parse()
                    .map_err(|_| IngestError::InvalidPayload(format!("non-numeric xp_boost reward_value: {}", chosen.reward_value)))?;
                self.identities
                    .update_progression(&mut *tx, root_id, identity.fate_xp + delta, identity.fate_level)
                    .await?;
                OpenedReward { reward_type: "xp_boost".into(), reward_value: delta.to_string() }
            }
            "title" => {
                let granted = self.identities.try_grant_title(&mut *tx, root_id, &chosen.reward_value).await?;
                if granted {
                    OpenedReward { reward_type: "title".into(), reward_value: chosen.reward_value.clone() }
                } else {
                    // Collision fallback per spec §4.11.
                    self.identities
                        .update_progression(&mut *tx, root_id, identity.fate_xp + 100, identity.fate_level)
                        .await?;
                    OpenedReward { reward_type: "xp_boost".into(), reward_value: "100".into() }
                }
            }
            "marker" => {
                self.identities.insert_marker(&mut *tx, root_id, None, &chosen.reward_value).await?;
                OpenedReward { reward_type: "marker".into(), reward_value: chosen.reward_value.clone() }
            }
            "gear" => {
                let item = self
                    .gear
                    .find_item_by_name(&chosen.reward_value)
                    .await?
                    .ok_or_else(|| IngestError::UnknownGearItem(chosen.reward_value.clone()))?;
                self.gear.add_to_inventory(&mut *tx, root_id, item.id).await?;
                OpenedReward { reward_type: "gear".into(), reward_value: chosen.reward_value.clone() }
            }
            other => return Err(IngestError::InvalidPayload(format!("unknown loot table reward_type: {other}"))),
        };

        let opened_cache = self.loot.open_cache(&mut *tx, cache_id, &reward.reward_type, &reward.reward_value).await?;

        let payload = serde_json::json!({
            "cache_id": cache_id,
            "cache_type": opened_cache.cache_type,
            "reward_type": reward.reward_type,
            "reward_value": reward.reward_value,
        });
        let event = self.ledger.append(&mut *tx, root_id, "loot.cache_opened", None, payload, None).await?;

        tx.commit().await.map_err(pik_db::DbError::from)?;
        self.ledger.publish_committed(&event);

        Ok(OpenCacheOutcome { cache: opened_cache, reward, ledger_event_id: event.id })
    }
}
