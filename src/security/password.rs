use crate::config::SecurityConfig;
use crate::error::Error;
use anyhow::Result;
use bcrypt::{hash, verify};

/// Hash a password with bcrypt
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let hashed = hash(password, config.password_hash_cost)
        .map_err(|e| Error::Authentication(format!("Failed to hash password: {}", e)))?;

    Ok(hashed)
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let result = verify(password, hash)
        .map_err(|e| Error::Authentication(format!("Failed to verify password: {}", e)))?;

    Ok(result)
}
