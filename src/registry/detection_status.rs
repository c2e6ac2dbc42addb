use crate::db::models::{CameraId, DetectionStatus, OccupancyStats};
use crate::messaging::Notifier;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

/// Per-view detection state, one entry per camera. Held in memory only.
pub struct DetectionStatusBook {
    notifier: Notifier,
    fps: u32,
    statuses: Mutex<HashMap<CameraId, DetectionStatus>>,
}

impl DetectionStatusBook {
    pub fn new(notifier: Notifier, fps: u32) -> Self {
        Self {
            notifier,
            fps,
            statuses: Mutex::new(HashMap::new()),
        }
    }

    /// Mark a camera as detecting, with slot counts from `occupancy`
    pub fn start(&self, camera_id: CameraId, occupancy: OccupancyStats) -> DetectionStatus {
        let status = DetectionStatus {
            camera_id,
            is_detecting: true,
            last_detection: Some(Utc::now()),
            total_slots: occupancy.total,
            occupied_slots: occupancy.occupied,
            vacant_slots: occupancy.vacant,
            fps: self.fps,
        };
        self.lock().insert(camera_id, status.clone());
        self.notifier.success("Detection started successfully");
        status
    }

    /// Clear the detecting flag; counts are kept
    pub fn stop(&self, camera_id: CameraId) -> Option<DetectionStatus> {
        let stopped = self.lock().get_mut(&camera_id).map(|status| {
            status.is_detecting = false;
            status.clone()
        });
        self.notifier.success("Detection stopped");
        stopped
    }

    pub fn get(&self, camera_id: CameraId) -> Option<DetectionStatus> {
        self.lock().get(&camera_id).cloned()
    }

    pub fn all(&self) -> HashMap<CameraId, DetectionStatus> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CameraId, DetectionStatus>> {
        self.statuses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
