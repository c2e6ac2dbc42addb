//! Boundary to the remote data service: authentication, the three tables the
//! app reads and writes, and per-table change notifications.
//!
//! The app never depends on change payloads. A [`ChangeEvent`] only says
//! "something in this table changed"; consumers refetch.

use crate::db::models::{
    AuthEvent, CameraId, CameraRow, CameraUpdate, NewCameraRow, Profile, Session, SignUpRequest,
    SlotId, SlotRow, SlotStatus,
};
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryDataService, RemoteOp};
pub use postgres::PgDataService;

/// Tables that publish change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Cameras,
    Slots,
    Profiles,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Cameras => "camera_feeds",
            Table::Slots => "parking_slots",
            Table::Profiles => "profiles",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "camera_feeds" => Some(Table::Cameras),
            "parking_slots" => Some(Table::Slots),
            "profiles" => Some(Table::Profiles),
            _ => None,
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Events were dropped; something changed
    Unknown,
}

impl ChangeKind {
    /// Parse a trigger operation name (`INSERT`, `UPDATE`, `DELETE`)
    pub fn from_operation(op: &str) -> Self {
        match op.to_ascii_uppercase().as_str() {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => ChangeKind::Unknown,
        }
    }
}

/// Payload-free change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

/// Stream of change notifications for one table
pub struct ChangeFeed {
    table: Table,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(table: Table, receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { table, receiver }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// Next change for this table; `None` once the source is gone
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.table == self.table => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Change feed for {} lagged by {} events", self.table, skipped);
                    return Some(ChangeEvent {
                        table: self.table,
                        kind: ChangeKind::Unknown,
                    });
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Operations the app consumes from the remote data service
#[async_trait]
pub trait DataService: Send + Sync {
    /// Current session, if one is active and unexpired
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Create an account and sign it in
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    /// Reissue the current session's token
    async fn refresh_session(&self) -> Result<Session>;

    /// Session change notifications
    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;

    /// Profile row for a user; `Error::NotFound` when absent
    async fn get_profile(&self, user_id: &Uuid) -> Result<Profile>;

    /// All cameras, newest first
    async fn list_cameras(&self) -> Result<Vec<CameraRow>>;

    /// One camera; `Error::NotFound` when absent
    async fn get_camera(&self, id: CameraId) -> Result<CameraRow>;

    async fn insert_camera(&self, camera: &NewCameraRow) -> Result<CameraRow>;

    async fn update_camera(&self, id: CameraId, update: &CameraUpdate) -> Result<()>;

    async fn delete_camera(&self, id: CameraId) -> Result<()>;

    /// Cameras whose url is one of `urls`
    async fn cameras_by_url(&self, urls: &[String]) -> Result<Vec<CameraRow>>;

    /// All slots ordered by slot number
    async fn list_slots(&self) -> Result<Vec<SlotRow>>;

    async fn update_slot_status(&self, id: SlotId, status: SlotStatus) -> Result<()>;

    /// Subscribe to insert/update/delete notifications for a table
    fn subscribe(&self, table: Table) -> ChangeFeed;
}
