use crate::db::models::{
    AuthEvent, CameraId, CameraRow, CameraUpdate, NewCameraRow, ParkingSlot, Profile, Session,
    SessionUser, SignUpRequest, SlotId, SlotRow, SlotStatus, UserRole,
};
use crate::error::Error;
use crate::remote::{ChangeEvent, ChangeFeed, ChangeKind, DataService, Table};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANGE_CAPACITY: usize = 128;

/// Operations of [`DataService`], used for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    GetSession,
    SignUp,
    SignIn,
    SignOut,
    RefreshSession,
    GetProfile,
    ListCameras,
    GetCamera,
    InsertCamera,
    UpdateCamera,
    DeleteCamera,
    CamerasByUrl,
    ListSlots,
    UpdateSlotStatus,
}

struct Account {
    user: SessionUser,
    password: String,
}

#[derive(Default)]
struct Tables {
    cameras: Vec<CameraRow>,
    next_camera_id: CameraId,
    slots: Vec<SlotRow>,
    next_slot_id: SlotId,
    profiles: HashMap<Uuid, Profile>,
    accounts: HashMap<String, Account>,
}

/// In-process stand-in for the remote data service.
///
/// Used by the demo command and by tests. Every mutation emits a change
/// event, exactly like the Postgres triggers do. Passwords are compared as
/// given; this adapter never leaves the process.
pub struct InMemoryDataService {
    tables: Mutex<Tables>,
    session: Mutex<Option<Session>>,
    session_ttl: Duration,
    failures: Mutex<HashSet<RemoteOp>>,
    calls: Mutex<HashMap<RemoteOp, usize>>,
    changes: broadcast::Sender<ChangeEvent>,
    auth: broadcast::Sender<AuthEvent>,
}

impl Default for InMemoryDataService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDataService {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let (auth, _) = broadcast::channel(16);
        Self {
            tables: Mutex::new(Tables {
                next_camera_id: 1,
                next_slot_id: 1,
                ..Tables::default()
            }),
            session: Mutex::new(None),
            session_ttl: Duration::minutes(60),
            failures: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            changes,
            auth,
        }
    }

    /// Make the next call of `op` fail with a database error
    pub fn fail_next(&self, op: RemoteOp) {
        lock(&self.failures).insert(op);
    }

    /// How many times `op` has been called
    pub fn call_count(&self, op: RemoteOp) -> usize {
        lock(&self.calls).get(&op).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Register an account without signing it in
    pub fn add_account(&self, email: &str, password: &str, full_name: &str, role: UserRole) -> Uuid {
        self.add_account_with_role(email, password, full_name, role.as_str())
    }

    /// Register an account with a raw profile role string
    pub fn add_account_with_role(&self, email: &str, password: &str, full_name: &str, role: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut tables = lock(&self.tables);
        tables.accounts.insert(
            email.to_string(),
            Account {
                user: SessionUser {
                    id,
                    email: email.to_string(),
                },
                password: password.to_string(),
            },
        );
        tables.profiles.insert(
            id,
            Profile {
                id,
                role: role.to_string(),
                full_name: Some(full_name.to_string()),
            },
        );
        id
    }

    /// Force the current session past its expiry
    pub fn expire_session(&self) {
        if let Some(session) = lock(&self.session).as_mut() {
            session.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    /// Insert seed slots without emitting change events
    pub fn seed_slots(&self, slots: &[ParkingSlot]) {
        let mut tables = lock(&self.tables);
        for slot in slots {
            let mut row = SlotRow::from(slot);
            if row.id <= 0 {
                row.id = tables.next_slot_id;
            }
            tables.next_slot_id = tables.next_slot_id.max(row.id + 1);
            tables.slots.push(row);
        }
    }

    /// Insert a raw slot row, bypassing validation
    pub fn seed_slot_row(&self, row: SlotRow) {
        let mut tables = lock(&self.tables);
        tables.next_slot_id = tables.next_slot_id.max(row.id + 1);
        tables.slots.push(row);
    }

    /// Current status of a slot, read straight from the table
    pub fn slot_status(&self, id: SlotId) -> Option<String> {
        lock(&self.tables)
            .slots
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.status.clone())
    }

    /// Publish a change as if another client had written to `table`
    pub fn emit_change(&self, table: Table, kind: ChangeKind) {
        let _ = self.changes.send(ChangeEvent { table, kind });
    }

    fn enter(&self, op: RemoteOp) -> Result<()> {
        *lock(&self.calls).entry(op).or_insert(0) += 1;
        if lock(&self.failures).remove(&op) {
            debug!("Injected failure for {:?}", op);
            return Err(Error::Database(format!("Injected failure for {:?}", op)).into());
        }
        Ok(())
    }

    fn open_session(&self, user: SessionUser) -> Session {
        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            token_type: "Bearer".to_string(),
            expires_at: Utc::now() + self.session_ttl,
            user,
        };
        *lock(&self.session) = Some(session.clone());
        session
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn sort_cameras(cameras: &mut [CameraRow]) {
    cameras.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl DataService for InMemoryDataService {
    async fn get_session(&self) -> Result<Option<Session>> {
        self.enter(RemoteOp::GetSession)?;
        let mut session = lock(&self.session);
        if session.as_ref().map_or(false, |s| s.is_expired()) {
            *session = None;
        }
        Ok(session.clone())
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Session> {
        self.enter(RemoteOp::SignUp)?;
        if lock(&self.tables).accounts.contains_key(&request.email) {
            return Err(Error::Validation(format!("{} is already registered", request.email)).into());
        }
        let id = self.add_account(&request.email, &request.password, &request.full_name, request.role);
        let session = self.open_session(SessionUser {
            id,
            email: request.email.clone(),
        });
        let _ = self.auth.send(AuthEvent::SignedIn);
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.enter(RemoteOp::SignIn)?;
        let user = {
            let tables = lock(&self.tables);
            match tables.accounts.get(email) {
                Some(account) if account.password == password => account.user.clone(),
                _ => return Err(Error::Authentication("Invalid login credentials".to_string()).into()),
            }
        };
        let session = self.open_session(user);
        let _ = self.auth.send(AuthEvent::SignedIn);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.enter(RemoteOp::SignOut)?;
        *lock(&self.session) = None;
        let _ = self.auth.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session> {
        self.enter(RemoteOp::RefreshSession)?;
        let user = lock(&self.session)
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or_else(|| Error::Authentication("No active session".to_string()))?;
        let session = self.open_session(user);
        let _ = self.auth.send(AuthEvent::TokenRefreshed);
        Ok(session)
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth.subscribe()
    }

    async fn get_profile(&self, user_id: &Uuid) -> Result<Profile> {
        self.enter(RemoteOp::GetProfile)?;
        lock(&self.tables)
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Profile {} not found", user_id)).into())
    }

    async fn list_cameras(&self) -> Result<Vec<CameraRow>> {
        self.enter(RemoteOp::ListCameras)?;
        let mut cameras = lock(&self.tables).cameras.clone();
        sort_cameras(&mut cameras);
        Ok(cameras)
    }

    async fn get_camera(&self, id: CameraId) -> Result<CameraRow> {
        self.enter(RemoteOp::GetCamera)?;
        lock(&self.tables)
            .cameras
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Camera {} not found", id)).into())
    }

    async fn insert_camera(&self, camera: &NewCameraRow) -> Result<CameraRow> {
        self.enter(RemoteOp::InsertCamera)?;
        let row = {
            let mut tables = lock(&self.tables);
            let row = CameraRow {
                id: tables.next_camera_id,
                name: camera.name.clone(),
                url: camera.url.clone(),
                lot_zone: camera.lot_zone.clone(),
                is_active: camera.is_active,
                created_at: Utc::now(),
            };
            tables.next_camera_id += 1;
            tables.cameras.push(row.clone());
            row
        };
        self.emit_change(Table::Cameras, ChangeKind::Insert);
        Ok(row)
    }

    async fn update_camera(&self, id: CameraId, update: &CameraUpdate) -> Result<()> {
        self.enter(RemoteOp::UpdateCamera)?;
        {
            let mut tables = lock(&self.tables);
            let row = tables
                .cameras
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| Error::NotFound(format!("Camera {} not found", id)))?;
            update.apply_to(row);
        }
        self.emit_change(Table::Cameras, ChangeKind::Update);
        Ok(())
    }

    async fn delete_camera(&self, id: CameraId) -> Result<()> {
        self.enter(RemoteOp::DeleteCamera)?;
        let removed = {
            let mut tables = lock(&self.tables);
            let before = tables.cameras.len();
            tables.cameras.retain(|c| c.id != id);
            before != tables.cameras.len()
        };
        if removed {
            self.emit_change(Table::Cameras, ChangeKind::Delete);
        }
        Ok(())
    }

    async fn cameras_by_url(&self, urls: &[String]) -> Result<Vec<CameraRow>> {
        self.enter(RemoteOp::CamerasByUrl)?;
        let mut cameras: Vec<CameraRow> = lock(&self.tables)
            .cameras
            .iter()
            .filter(|c| urls.contains(&c.url))
            .cloned()
            .collect();
        sort_cameras(&mut cameras);
        Ok(cameras)
    }

    async fn list_slots(&self) -> Result<Vec<SlotRow>> {
        self.enter(RemoteOp::ListSlots)?;
        let mut slots = lock(&self.tables).slots.clone();
        slots.sort_by(|a, b| a.slot_number.cmp(&b.slot_number));
        Ok(slots)
    }

    async fn update_slot_status(&self, id: SlotId, status: SlotStatus) -> Result<()> {
        self.enter(RemoteOp::UpdateSlotStatus)?;
        {
            let mut tables = lock(&self.tables);
            let row = tables
                .slots
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| Error::NotFound(format!("Slot {} not found", id)))?;
            row.status = status.as_str().to_string();
        }
        self.emit_change(Table::Slots, ChangeKind::Update);
        Ok(())
    }

    fn subscribe(&self, table: Table) -> ChangeFeed {
        ChangeFeed::new(table, self.changes.subscribe())
    }
}
