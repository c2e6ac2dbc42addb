use crate::error::Error;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CameraId = i64;

/// Row shape of the `camera_feeds` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CameraRow {
    pub id: CameraId,
    pub name: String,
    pub url: String,
    pub lot_zone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Camera status as shown to admins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    Active,
    Inactive,
    /// Only ever set by local/demo logic, never derived from a row
    Error,
}

impl CameraStatus {
    /// Map the stored `is_active` flag to a status
    pub fn from_active(is_active: bool) -> Self {
        if is_active {
            CameraStatus::Active
        } else {
            CameraStatus::Inactive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Active => "active",
            CameraStatus::Inactive => "inactive",
            CameraStatus::Error => "error",
        }
    }
}

/// Camera model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: CameraId,
    pub name: String,
    pub url: String,
    pub lot_zone: Option<String>,
    pub status: CameraStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CameraRow> for Camera {
    fn from(row: CameraRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            url: row.url,
            lot_zone: row.lot_zone.filter(|zone| !zone.is_empty()),
            status: CameraStatus::from_active(row.is_active),
            created_at: row.created_at,
            // camera_feeds carries no update timestamp
            updated_at: row.created_at,
        }
    }
}

/// Fields an admin fills in when adding a camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraFormData {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub lot_zone: Option<String>,
}

impl CameraFormData {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            lot_zone: None,
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.lot_zone = Some(zone.into());
        self
    }

    /// Reject forms with a blank name or url
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("Camera name is required".to_string()).into());
        }
        if self.url.trim().is_empty() {
            return Err(Error::Validation("Camera URL is required".to_string()).into());
        }
        Ok(())
    }
}

/// Insert payload for `camera_feeds`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCameraRow {
    pub name: String,
    pub url: String,
    pub lot_zone: Option<String>,
    pub is_active: bool,
}

impl From<&CameraFormData> for NewCameraRow {
    fn from(form: &CameraFormData) -> Self {
        Self {
            name: form.name.trim().to_string(),
            url: form.url.trim().to_string(),
            lot_zone: form.lot_zone.clone().filter(|zone| !zone.trim().is_empty()),
            is_active: true,
        }
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub lot_zone: Option<String>,
    pub is_active: Option<bool>,
}

impl CameraUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none() && self.lot_zone.is_none() && self.is_active.is_none()
    }

    /// Apply the present fields to a row
    pub fn apply_to(&self, row: &mut CameraRow) {
        if let Some(name) = &self.name {
            row.name = name.clone();
        }
        if let Some(url) = &self.url {
            row.url = url.clone();
        }
        if let Some(zone) = &self.lot_zone {
            row.lot_zone = Some(zone.clone());
        }
        if let Some(active) = self.is_active {
            row.is_active = active;
        }
    }
}
