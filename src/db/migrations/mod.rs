use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

/// Migrations in application order
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_auth.sql", include_str!("sql/001_auth.sql")),
    ("002_camera_feeds.sql", include_str!("sql/002_camera_feeds.sql")),
    ("003_parking_slots.sql", include_str!("sql/003_parking_slots.sql")),
    (
        "004_change_notifications.sql",
        include_str!("sql/004_change_notifications.sql"),
    ),
];

/// Apply every migration; each script is idempotent
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        execute_migration(pool, name, sql).await?;
    }

    Ok(())
}

async fn execute_migration(pool: &PgPool, name: &str, sql: &str) -> Result<()> {
    // Scripts hold several statements, so use the simple query protocol
    sqlx::raw_sql(sql).execute(pool).await?;
    info!("Applied migration: {}", name);

    Ok(())
}
