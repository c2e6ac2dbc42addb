use crate::config::SecurityConfig;
use crate::db::models::{Session, SessionUser};
use crate::error::Error;
use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod password;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

impl Claims {
    /// Get the user ID from the claims
    pub fn user_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.sub)
    }
}

/// Issues and checks session tokens
pub struct SecurityService {
    config: SecurityConfig,
}

impl SecurityService {
    /// Create a new security service
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Issue a fresh session for a user
    pub fn issue_session(&self, user: &SessionUser) -> Result<Session> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.config.jwt_expiration_minutes as i64);

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| Error::Authentication(format!("Failed to generate JWT token: {}", e)))?;

        Ok(Session {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_at: expiration,
            user: user.clone(),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| Error::Authentication(format!("Invalid token: {}", e)))?;

        Ok(token_data)
    }

    /// Rebuild the session a token stands for
    pub fn session_from_token(&self, token: &str) -> Result<Session> {
        let data = self.validate_token(token)?;
        let id = data
            .claims
            .user_id()
            .map_err(|e| Error::Authentication(format!("Invalid user ID in token: {}", e)))?;
        let expires_at = Utc
            .timestamp_opt(data.claims.exp as i64, 0)
            .single()
            .ok_or_else(|| Error::Authentication("Invalid token expiry".to_string()))?;

        Ok(Session {
            access_token: token.to_string(),
            token_type: "Bearer".to_string(),
            expires_at,
            user: SessionUser {
                id,
                email: data.claims.email,
            },
        })
    }
}
