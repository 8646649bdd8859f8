//! Gear catalog, soulbound inventory, and the one-per-slot equipment join
//! (spec §3 GearItem/PlayerInventory/PlayerEquipment).

use chrono::Utc;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{DbGearItem, DbPlayerEquipment, DbPlayerInventory, DbResult};

#[derive(Clone)]
pub struct GearRepo {
    pool: PgPool,
}

impl GearRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_item_by_id(&self, gear_item_id: Uuid) -> DbResult<Option<DbGearItem>> {
        let row = sqlx::query_as::<_, DbGearItem>(
            "SELECT id, name, slot, modifiers FROM gear_items WHERE id = $1",
        )
        .bind(gear_item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_item_by_name(&self, name: &str) -> DbResult<Option<DbGearItem>> {
        let row = sqlx::query_as::<_, DbGearItem>(
            "SELECT id, name, slot, modifiers FROM gear_items WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn add_to_inventory<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        gear_item_id: Uuid,
    ) -> DbResult<DbPlayerInventory>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbPlayerInventory>(
            r#"
            INSERT INTO player_inventory (id, root_id, gear_item_id, acquired_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, root_id, gear_item_id, acquired_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(root_id)
        .bind(gear_item_id)
        .bind(Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    pub async fn list_inventory(&self, root_id: Uuid) -> DbResult<Vec<DbPlayerInventory>> {
        let rows = sqlx::query_as::<_, DbPlayerInventory>(
            "SELECT id, root_id, gear_item_id, acquired_at FROM player_inventory WHERE root_id = $1 ORDER BY acquired_at DESC",
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Equips an inventory row into its slot, replacing whatever held that
    /// slot before — at most one equipped row per (root, slot) (spec §3).
    pub async fn equip<'c, E>(
        &self,
        exec: E,
        root_id: Uuid,
        slot: &str,
        inventory_id: Uuid,
    ) -> DbResult<DbPlayerEquipment>
    where
        E: PgExecutor<'c>,
    {
        let row = sqlx::query_as::<_, DbPlayerEquipment>(
            r#"
            INSERT INTO player_equipment (root_id, slot, inventory_id, equipped_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (root_id, slot) DO UPDATE SET inventory_id = EXCLUDED.inventory_id, equipped_at = EXCLUDED.equipped_at
            RETURNING root_id, slot, inventory_id, equipped_at
            "#,
        )
        .bind(root_id)
        .bind(slot)
        .bind(inventory_id)
        .bind(Utc::now())
        .fetch_one(exec)
        .await?;
        Ok(row)
    }

    pub async fn list_equipped(&self, root_id: Uuid) -> DbResult<Vec<DbPlayerEquipment>> {
        let rows = sqlx::query_as::<_, DbPlayerEquipment>(
            "SELECT root_id, slot, inventory_id, equipped_at FROM player_equipment WHERE root_id = $1",
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
