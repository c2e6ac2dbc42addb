use crate::{
    db::models::{AuthUserRow, Profile},
    error::Error,
};
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Users repository for `auth_users` and `profiles`
#[derive(Clone)]
pub struct UsersRepository {
    pool: Arc<PgPool>,
}

impl UsersRepository {
    /// Create a new users repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a login and its profile in one transaction
    pub async fn create(&self, user: &AuthUserRow, profile: &Profile) -> Result<()> {
        info!("Creating new user: {}", user.email);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO auth_users (id, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create user: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO profiles (id, role, full_name)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(profile.id)
        .bind(&profile.role)
        .bind(&profile.full_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create profile: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit user: {}", e)))?;

        Ok(())
    }

    /// Get login by email
    pub async fn get_by_email(&self, email: &str) -> Result<Option<AuthUserRow>> {
        let result = sqlx::query_as::<_, AuthUserRow>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM auth_users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get user by email: {}", e)))?;

        Ok(result)
    }

    /// Get profile by user ID
    pub async fn get_profile(&self, id: &Uuid) -> Result<Option<Profile>> {
        let result = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, role, full_name
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get profile: {}", e)))?;

        Ok(result)
    }
}
