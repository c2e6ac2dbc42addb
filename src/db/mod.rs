use crate::config::DatabaseConfig;
use crate::db::models::{ParkingSlot, SlotRow};
use crate::db::repositories::SlotsRepository;
use crate::error::Error;
use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod migrations;
pub mod models;
pub mod repositories;

/// Postgres pool shared by the repositories
pub struct DatabaseService {
    pub pool: Arc<PgPool>,
}

impl DatabaseService {
    /// Connect and, when `auto_migrate` is set, bring the schema up to date
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let service = Self::connect(config).await?;
        if config.auto_migrate {
            service.run_migrations().await?;
        }
        Ok(service)
    }

    /// Connect without touching the schema
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;
        info!("Connected to parking database");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to run migrations: {}", e)))?;
        info!("Parking schema is up to date");
        Ok(())
    }

    /// Upsert slot rows by slot number; existing statuses are kept
    pub async fn seed_slots(&self, slots: &[ParkingSlot]) -> Result<usize> {
        let repository = SlotsRepository::new(self.pool.clone());
        for slot in slots {
            repository.create(&SlotRow::from(slot)).await?;
        }
        info!("Seeded {} parking slots", slots.len());
        Ok(slots.len())
    }
}
