use crate::config::SecurityConfig;
use crate::db::models::{
    AuthEvent, AuthUserRow, CameraId, CameraRow, CameraUpdate, NewCameraRow, Profile, Session,
    SessionUser, SignUpRequest, SlotId, SlotRow, SlotStatus,
};
use crate::db::repositories::{CamerasRepository, SlotsRepository, UsersRepository};
use crate::db::DatabaseService;
use crate::error::Error;
use crate::remote::{ChangeEvent, ChangeFeed, ChangeKind, DataService, Table};
use crate::security::password::{hash_password, verify_password};
use crate::security::SecurityService;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Channel the change triggers notify on
pub const CHANGE_CHANNEL: &str = "table_changes";

#[derive(Debug, Deserialize)]
struct ChangePayload {
    table: String,
    event: String,
}

/// Decode a trigger payload; unknown tables yield `None`
fn parse_change(payload: &str) -> Option<ChangeEvent> {
    let change: ChangePayload = match serde_json::from_str(payload) {
        Ok(change) => change,
        Err(e) => {
            warn!("Ignoring malformed change payload {:?}: {}", payload, e);
            return None;
        }
    };
    Some(ChangeEvent {
        table: Table::from_name(&change.table)?,
        kind: ChangeKind::from_operation(&change.event),
    })
}

/// [`DataService`] backed by PostgreSQL.
///
/// Sessions are JWTs issued by [`SecurityService`]; change notifications
/// come from `LISTEN table_changes`.
pub struct PgDataService {
    cameras: CamerasRepository,
    slots: SlotsRepository,
    users: UsersRepository,
    security: SecurityService,
    security_config: SecurityConfig,
    session: Mutex<Option<Session>>,
    changes: broadcast::Sender<ChangeEvent>,
    auth: broadcast::Sender<AuthEvent>,
    cancel: CancellationToken,
}

impl PgDataService {
    /// Create a new service and start listening for table changes
    pub async fn connect(db: &DatabaseService, security: &SecurityConfig) -> Result<Arc<Self>> {
        let (changes, _) = broadcast::channel(128);
        let (auth, _) = broadcast::channel(16);
        let service = Arc::new(Self {
            cameras: CamerasRepository::new(db.pool.clone()),
            slots: SlotsRepository::new(db.pool.clone()),
            users: UsersRepository::new(db.pool.clone()),
            security: SecurityService::new(security.clone()),
            security_config: security.clone(),
            session: Mutex::new(None),
            changes,
            auth,
            cancel: CancellationToken::new(),
        });

        let mut listener = PgListener::connect_with(&db.pool)
            .await
            .map_err(|e| Error::Connection(format!("Failed to open change listener: {}", e)))?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .map_err(|e| Error::Connection(format!("Failed to LISTEN {}: {}", CHANGE_CHANNEL, e)))?;

        Self::spawn_listener(listener, service.changes.clone(), service.cancel.clone());
        info!("Listening for table changes on {}", CHANGE_CHANNEL);

        Ok(service)
    }

    fn spawn_listener(
        mut listener: PgListener,
        changes: broadcast::Sender<ChangeEvent>,
        cancel: CancellationToken,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Change listener stopped");
                        break;
                    }
                    notification = listener.recv() => match notification {
                        Ok(notification) => {
                            if let Some(event) = parse_change(notification.payload()) {
                                let _ = changes.send(event);
                            }
                        }
                        Err(e) => {
                            // PgListener reconnects on the next recv; consumers refetch
                            error!("Change listener error: {}", e);
                            for table in [Table::Cameras, Table::Slots, Table::Profiles] {
                                let _ = changes.send(ChangeEvent { table, kind: ChangeKind::Unknown });
                            }
                        }
                    }
                }
            }
        });
    }

    fn store_session(&self, session: Option<Session>) {
        *self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = session;
    }

    fn current_session(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Drop for PgDataService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl DataService for PgDataService {
    async fn get_session(&self) -> Result<Option<Session>> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };
        match self.security.session_from_token(&session.access_token) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                debug!("Dropping stored session: {}", e);
                self.store_session(None);
                Ok(None)
            }
        }
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Session> {
        if self.users.get_by_email(&request.email).await?.is_some() {
            return Err(Error::Validation(format!("{} is already registered", request.email)).into());
        }

        let id = Uuid::new_v4();
        let user = AuthUserRow {
            id,
            email: request.email.clone(),
            password_hash: hash_password(&request.password, &self.security_config)?,
            created_at: Utc::now(),
        };
        let profile = Profile {
            id,
            role: request.role.as_str().to_string(),
            full_name: Some(request.full_name.clone()),
        };
        self.users.create(&user, &profile).await?;

        let session = self.security.issue_session(&SessionUser {
            id,
            email: user.email,
        })?;
        self.store_session(Some(session.clone()));
        let _ = self.auth.send(AuthEvent::SignedIn);
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| Error::Authentication("Invalid login credentials".to_string()))?;
        if !verify_password(password, &user.password_hash)? {
            return Err(Error::Authentication("Invalid login credentials".to_string()).into());
        }

        let session = self.security.issue_session(&SessionUser {
            id: user.id,
            email: user.email,
        })?;
        self.store_session(Some(session.clone()));
        let _ = self.auth.send(AuthEvent::SignedIn);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.store_session(None);
        let _ = self.auth.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session> {
        let current = self
            .get_session()
            .await?
            .ok_or_else(|| Error::Authentication("No active session".to_string()))?;
        let session = self.security.issue_session(&current.user)?;
        self.store_session(Some(session.clone()));
        let _ = self.auth.send(AuthEvent::TokenRefreshed);
        Ok(session)
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth.subscribe()
    }

    async fn get_profile(&self, user_id: &Uuid) -> Result<Profile> {
        self.users
            .get_profile(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Profile {} not found", user_id)).into())
    }

    async fn list_cameras(&self) -> Result<Vec<CameraRow>> {
        self.cameras.get_all().await
    }

    async fn get_camera(&self, id: CameraId) -> Result<CameraRow> {
        self.cameras
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Camera {} not found", id)).into())
    }

    async fn insert_camera(&self, camera: &NewCameraRow) -> Result<CameraRow> {
        self.cameras.create(camera).await
    }

    async fn update_camera(&self, id: CameraId, update: &CameraUpdate) -> Result<()> {
        self.cameras.update(id, update).await
    }

    async fn delete_camera(&self, id: CameraId) -> Result<()> {
        self.cameras.delete(id).await?;
        Ok(())
    }

    async fn cameras_by_url(&self, urls: &[String]) -> Result<Vec<CameraRow>> {
        self.cameras.get_by_urls(urls).await
    }

    async fn list_slots(&self) -> Result<Vec<SlotRow>> {
        self.slots.get_all().await
    }

    async fn update_slot_status(&self, id: SlotId, status: SlotStatus) -> Result<()> {
        self.slots.update_status(id, status).await
    }

    fn subscribe(&self, table: Table) -> ChangeFeed {
        ChangeFeed::new(table, self.changes.subscribe())
    }
}
