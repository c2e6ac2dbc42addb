use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// User role enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Driver,
    Admin,
    /// Any role string the profile table holds that this app does not know
    #[serde(other)]
    Unknown,
}

impl UserRole {
    /// Decode the raw `profiles.role` column
    pub fn from_profile(role: &str) -> Self {
        match role.trim() {
            "driver" => UserRole::Driver,
            "admin" => UserRole::Admin,
            _ => UserRole::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Driver => "driver",
            UserRole::Admin => "admin",
            UserRole::Unknown => "unknown",
        }
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row shape of the `profiles` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub role: String,
    pub full_name: Option<String>,
}

/// Row shape of the `auth_users` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthUserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The identity carried by a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// A fully resolved user: session identity plus profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub full_name: String,
}

impl AuthUser {
    pub fn from_parts(session: &Session, profile: &Profile) -> Self {
        Self {
            id: session.user.id,
            email: session.user.email.clone(),
            role: UserRole::from_profile(&profile.role),
            full_name: profile.full_name.clone().unwrap_or_default(),
        }
    }
}

/// Session change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Sign-up payload; the role is fixed at sign-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: UserRole,
}
