use crate::config::RegistryConfig;
use crate::db::models::{Camera, CameraFormData, CameraId, CameraUpdate, NewCameraRow};
use crate::messaging::Notifier;
use crate::registry::SyncHandle;
use crate::remote::{DataService, Table};
use anyhow::Result;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Snapshot published to camera list subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraListState {
    /// Newest first
    pub cameras: Vec<Camera>,
    pub loading: bool,
}

impl Default for CameraListState {
    fn default() -> Self {
        Self {
            cameras: Vec::new(),
            loading: true,
        }
    }
}

/// Local mirror of the `camera_feeds` table
pub struct CameraRegistry {
    remote: Arc<dyn DataService>,
    notifier: Notifier,
    debounce: Duration,
    state: watch::Sender<CameraListState>,
    sync: Mutex<Option<SyncHandle>>,
}

impl CameraRegistry {
    /// Create a new camera registry
    pub fn new(remote: Arc<dyn DataService>, notifier: Notifier, config: &RegistryConfig) -> Arc<Self> {
        let (state, _) = watch::channel(CameraListState::default());
        Arc::new(Self {
            remote,
            notifier,
            debounce: Duration::from_millis(config.camera_debounce_ms),
            state,
            sync: Mutex::new(None),
        })
    }

    pub fn cameras(&self) -> Vec<Camera> {
        self.state.borrow().cameras.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn subscribe(&self) -> watch::Receiver<CameraListState> {
        self.state.subscribe()
    }

    /// Replace the local list with the remote one. On failure the list is kept.
    pub async fn fetch(&self) {
        match self.remote.list_cameras().await {
            Ok(rows) => {
                let cameras: Vec<Camera> = rows.into_iter().map(Camera::from).collect();
                debug!("Fetched {} cameras", cameras.len());
                self.state.send_modify(|state| {
                    state.cameras = cameras;
                    state.loading = false;
                });
            }
            Err(e) => {
                error!("Error fetching cameras: {}", e);
                self.notifier.error("Failed to load cameras");
                self.state.send_modify(|state| state.loading = false);
            }
        }
    }

    /// Insert a camera and prepend it locally. A failed insert resyncs the list.
    pub async fn add(&self, form: &CameraFormData) -> Result<Camera> {
        if let Err(e) = form.validate() {
            self.notifier.error("Please fill in all required fields");
            return Err(e);
        }

        match self.remote.insert_camera(&NewCameraRow::from(form)).await {
            Ok(row) => {
                let camera = Camera::from(row);
                info!("Added camera {} ({})", camera.name, camera.id);
                self.state
                    .send_modify(|state| state.cameras.insert(0, camera.clone()));
                self.notifier
                    .success(format!("Camera \"{}\" added successfully", form.name));
                Ok(camera)
            }
            Err(e) => {
                error!("Error adding camera: {}", e);
                self.notifier.error("Failed to add camera");
                self.fetch().await;
                Err(e)
            }
        }
    }

    /// Apply a partial update, then refetch
    pub async fn update(&self, id: CameraId, update: &CameraUpdate) -> Result<()> {
        match self.remote.update_camera(id, update).await {
            Ok(()) => {
                self.notifier.success("Camera updated successfully");
                self.fetch().await;
                Ok(())
            }
            Err(e) => {
                error!("Error updating camera {}: {}", id, e);
                self.notifier.error("Failed to update camera");
                Err(e)
            }
        }
    }

    /// Hard delete, then refetch
    pub async fn delete(&self, id: CameraId) -> Result<()> {
        match self.remote.delete_camera(id).await {
            Ok(()) => {
                self.notifier.success("Camera deleted successfully");
                self.fetch().await;
                Ok(())
            }
            Err(e) => {
                error!("Error deleting camera {}: {}", id, e);
                self.notifier.error("Failed to delete camera");
                Err(e)
            }
        }
    }

    /// Single camera straight from the remote; any error reads as absent
    pub async fn get_by_id(&self, id: CameraId) -> Option<Camera> {
        match self.remote.get_camera(id).await {
            Ok(row) => Some(Camera::from(row)),
            Err(e) => {
                debug!("Camera {} unavailable: {}", id, e);
                None
            }
        }
    }

    /// Camera for a preview or detection view; absence is notified
    pub async fn open(&self, id: CameraId) -> Result<Camera> {
        match self.get_by_id(id).await {
            Some(camera) => Ok(camera),
            None => {
                self.notifier.error("Camera not found");
                Err(crate::Error::NotFound(format!("Camera {}", id)).into())
            }
        }
    }

    /// Refetch on camera table changes, collapsing bursts into one refetch
    pub fn start_sync(self: &Arc<Self>) {
        let mut feed = self.remote.subscribe(Table::Cameras);
        let handle = SyncHandle::new();
        let token = handle.token();
        let registry = Arc::downgrade(self);
        let debounce = self.debounce;

        tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;
            loop {
                let pending = deadline;
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = feed.recv() => match event {
                        Some(event) => {
                            debug!("Camera change {:?}, refetch in {:?}", event.kind, debounce);
                            deadline = Some(Instant::now() + debounce);
                        }
                        None => break,
                    },
                    _ = async {
                        match pending {
                            Some(at) => sleep_until(at).await,
                            None => std::future::pending::<()>().await,
                        }
                    } => {
                        deadline = None;
                        match registry.upgrade() {
                            Some(registry) => registry.fetch().await,
                            None => break,
                        }
                    }
                }
            }
            debug!("Camera sync stopped");
        });

        self.replace_sync(Some(handle));
    }

    pub fn stop_sync(&self) {
        self.replace_sync(None);
    }

    pub fn is_syncing(&self) -> bool {
        self.sync
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    fn replace_sync(&self, handle: Option<SyncHandle>) {
        // Dropping the old handle cancels its task
        let _previous = std::mem::replace(
            &mut *self
                .sync
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
            handle,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::CameraStatus;
    use crate::remote::{InMemoryDataService, RemoteOp};

    fn registry(remote: &Arc<InMemoryDataService>) -> (Arc<CameraRegistry>, Notifier) {
        let notifier = Notifier::new();
        let registry = CameraRegistry::new(remote.clone(), notifier.clone(), &RegistryConfig::default());
        (registry, notifier)
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_list() {
        let remote = Arc::new(InMemoryDataService::new());
        let (registry, notifier) = registry(&remote);
        registry.add(&CameraFormData::new("Gate", "rtsp://gate")).await.unwrap();

        remote.fail_next(RemoteOp::ListCameras);
        registry.fetch().await;

        assert_eq!(registry.cameras().len(), 1);
        assert!(!registry.is_loading());
        assert_eq!(notifier.messages().last().map(String::as_str), Some("Failed to load cameras"));
    }

    #[tokio::test]
    async fn opening_missing_camera_notifies() {
        let remote = Arc::new(InMemoryDataService::new());
        let (registry, notifier) = registry(&remote);

        let err = registry.open(404).await.unwrap_err();
        assert!(crate::Error::is_not_found(&err));
        assert_eq!(notifier.messages(), vec!["Camera not found".to_string()]);
    }

    #[tokio::test]
    async fn update_refetches_and_reflects_status() {
        let remote = Arc::new(InMemoryDataService::new());
        let (registry, _) = registry(&remote);
        let camera = registry.add(&CameraFormData::new("Gate", "rtsp://gate")).await.unwrap();

        let update = CameraUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        registry.update(camera.id, &update).await.unwrap();

        assert_eq!(registry.cameras()[0].status, CameraStatus::Inactive);
        assert_eq!(remote.call_count(RemoteOp::ListCameras), 1);
    }

    #[tokio::test]
    async fn failed_update_only_notifies() {
        let remote = Arc::new(InMemoryDataService::new());
        let (registry, notifier) = registry(&remote);

        assert!(registry.update(99, &CameraUpdate::default()).await.is_err());
        assert_eq!(remote.call_count(RemoteOp::ListCameras), 0);
        assert_eq!(notifier.messages(), vec!["Failed to update camera"]);
    }

    #[tokio::test]
    async fn delete_refetches() {
        let remote = Arc::new(InMemoryDataService::new());
        let (registry, notifier) = registry(&remote);
        let camera = registry.add(&CameraFormData::new("Gate", "rtsp://gate")).await.unwrap();

        registry.delete(camera.id).await.unwrap();
        assert!(registry.cameras().is_empty());
        assert_eq!(notifier.messages().last().map(String::as_str), Some("Camera deleted successfully"));
    }

    #[tokio::test]
    async fn get_by_id_swallows_errors() {
        let remote = Arc::new(InMemoryDataService::new());
        let (registry, _) = registry(&remote);
        assert!(registry.get_by_id(5).await.is_none());

        let camera = registry.add(&CameraFormData::new("Gate", "rtsp://gate")).await.unwrap();
        remote.fail_next(RemoteOp::GetCamera);
        assert!(registry.get_by_id(camera.id).await.is_none());
        assert_eq!(registry.get_by_id(camera.id).await, Some(camera));
    }

    #[tokio::test]
    async fn stop_sync_releases_subscription() {
        let remote = Arc::new(InMemoryDataService::new());
        let (registry, _) = registry(&remote);

        registry.start_sync();
        assert!(registry.is_syncing());
        registry.stop_sync();
        assert!(!registry.is_syncing());
    }
}
