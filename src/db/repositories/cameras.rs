use crate::{
    db::models::{CameraId, CameraRow, CameraUpdate, NewCameraRow},
    error::Error,
};
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

/// Cameras repository for the `camera_feeds` table
#[derive(Clone)]
pub struct CamerasRepository {
    pool: Arc<PgPool>,
}

impl CamerasRepository {
    /// Create a new cameras repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Insert a camera and return the stored row
    pub async fn create(&self, camera: &NewCameraRow) -> Result<CameraRow> {
        info!("Creating new camera: {}", camera.name);

        let result = sqlx::query_as::<_, CameraRow>(
            r#"
            INSERT INTO camera_feeds (name, url, lot_zone, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, url, lot_zone, is_active, created_at
            "#,
        )
        .bind(&camera.name)
        .bind(&camera.url)
        .bind(&camera.lot_zone)
        .bind(camera.is_active)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create camera: {}", e)))?;

        Ok(result)
    }

    /// Get camera by ID
    pub async fn get_by_id(&self, id: CameraId) -> Result<Option<CameraRow>> {
        let result = sqlx::query_as::<_, CameraRow>(
            r#"
            SELECT id, name, url, lot_zone, is_active, created_at
            FROM camera_feeds
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get camera by ID: {}", e)))?;

        Ok(result)
    }

    /// Get all cameras, newest first
    pub async fn get_all(&self) -> Result<Vec<CameraRow>> {
        let result = sqlx::query_as::<_, CameraRow>(
            r#"
            SELECT id, name, url, lot_zone, is_active, created_at
            FROM camera_feeds
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get all cameras: {}", e)))?;

        Ok(result)
    }

    /// Get cameras whose url is in the given set
    pub async fn get_by_urls(&self, urls: &[String]) -> Result<Vec<CameraRow>> {
        let result = sqlx::query_as::<_, CameraRow>(
            r#"
            SELECT id, name, url, lot_zone, is_active, created_at
            FROM camera_feeds
            WHERE url = ANY($1)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(urls)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get cameras by url: {}", e)))?;

        Ok(result)
    }

    /// Apply a partial update; absent fields keep their stored value
    pub async fn update(&self, id: CameraId, update: &CameraUpdate) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE camera_feeds
            SET name = COALESCE($1, name),
                url = COALESCE($2, url),
                lot_zone = COALESCE($3, lot_zone),
                is_active = COALESCE($4, is_active)
            WHERE id = $5
            "#,
        )
        .bind(&update.name)
        .bind(&update.url)
        .bind(&update.lot_zone)
        .bind(update.is_active)
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to update camera: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Camera {} not found", id)).into());
        }

        Ok(())
    }

    /// Delete camera
    pub async fn delete(&self, id: CameraId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM camera_feeds
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to delete camera: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
