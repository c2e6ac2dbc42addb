use crate::{
    db::models::{SlotId, SlotRow, SlotStatus},
    error::Error,
};
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

/// Slots repository for the `parking_slots` table
#[derive(Clone)]
pub struct SlotsRepository {
    pool: Arc<PgPool>,
}

impl SlotsRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get all slots ordered by slot number
    pub async fn get_all(&self) -> Result<Vec<SlotRow>> {
        let result = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT id, slot_number, location, status, zone
            FROM parking_slots
            ORDER BY slot_number
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get parking slots: {}", e)))?;

        Ok(result)
    }

    /// Insert a slot (seed data)
    pub async fn create(&self, slot: &SlotRow) -> Result<SlotRow> {
        let result = sqlx::query_as::<_, SlotRow>(
            r#"
            INSERT INTO parking_slots (slot_number, location, status, zone)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slot_number) DO UPDATE SET location = EXCLUDED.location
            RETURNING id, slot_number, location, status, zone
            "#,
        )
        .bind(&slot.slot_number)
        .bind(&slot.location)
        .bind(&slot.status)
        .bind(&slot.zone)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create parking slot: {}", e)))?;

        Ok(result)
    }

    /// Update slot status
    pub async fn update_status(&self, id: SlotId, status: SlotStatus) -> Result<()> {
        info!("Setting slot {} to {}", id, status);

        let result = sqlx::query(
            r#"
            UPDATE parking_slots
            SET status = $1, updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to update slot status: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Slot {} not found", id)).into());
        }

        Ok(())
    }
}
