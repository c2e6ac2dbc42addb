use crate::db::models::{CameraRow, NewCameraRow, ParkingSlot, SlotLocation, SlotStatus};
use crate::messaging::Notifier;
use crate::remote::DataService;
use anyhow::Result;
use log::{error, info};
use std::sync::Arc;

/// A demo camera backed by a bundled video file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCamera {
    pub name: &'static str,
    pub url: &'static str,
    pub lot_zone: &'static str,
}

pub const VIDEO_CAMERAS: [VideoCamera; 3] = [
    VideoCamera {
        name: "Parking Zone A Camera",
        url: "/videos/camera1.mp4",
        lot_zone: "Zone A",
    },
    VideoCamera {
        name: "Parking Zone B Camera",
        url: "/videos/camera2.mp4",
        lot_zone: "Zone B",
    },
    VideoCamera {
        name: "Parking Zone C Camera",
        url: "/videos/camera3.mp4",
        lot_zone: "Zone C",
    },
];

pub fn video_camera_by_url(url: &str) -> Option<&'static VideoCamera> {
    VIDEO_CAMERAS.iter().find(|camera| camera.url == url)
}

fn video_urls() -> Vec<String> {
    VIDEO_CAMERAS.iter().map(|camera| camera.url.to_string()).collect()
}

/// Four bays per zone A to C; even-numbered bays start occupied
pub fn demo_slots() -> Vec<ParkingSlot> {
    let mut slots = Vec::new();
    for (row, zone) in ["A", "B", "C"].iter().enumerate() {
        for n in 1..=4 {
            slots.push(ParkingSlot {
                id: 0,
                slot_number: format!("{}-{:02}", zone, n),
                location: SlotLocation {
                    x: 60.0 * n as f64,
                    y: 120.0 * row as f64,
                    width: 50.0,
                    height: 100.0,
                },
                status: if n % 2 == 0 {
                    SlotStatus::Occupied
                } else {
                    SlotStatus::Vacant
                },
                zone: zone.to_string(),
            });
        }
    }
    slots
}

/// Seeds and removes the demo video cameras
pub struct VideoCameraSeeder {
    remote: Arc<dyn DataService>,
    notifier: Notifier,
}

impl VideoCameraSeeder {
    pub fn new(remote: Arc<dyn DataService>, notifier: Notifier) -> Self {
        Self { remote, notifier }
    }

    async fn existing(&self) -> Result<Vec<CameraRow>> {
        self.remote.cameras_by_url(&video_urls()).await
    }

    /// True when every demo video URL is already registered. Lookup errors read as false.
    pub async fn videos_exist(&self) -> bool {
        match self.existing().await {
            Ok(rows) => VIDEO_CAMERAS
                .iter()
                .all(|video| rows.iter().any(|row| row.url == video.url)),
            Err(e) => {
                error!("Error checking video cameras: {}", e);
                false
            }
        }
    }

    /// Insert the demo cameras that are not registered yet, returning how many were added
    pub async fn setup_video_cameras(&self) -> Result<usize> {
        match self.insert_missing().await {
            Ok(0) => {
                info!("Video cameras already configured");
                Ok(0)
            }
            Ok(added) => {
                self.notifier.success("Video cameras configured successfully");
                Ok(added)
            }
            Err(e) => {
                self.notifier
                    .error(format!("Failed to set up video cameras: {}", e));
                Err(e)
            }
        }
    }

    async fn insert_missing(&self) -> Result<usize> {
        let existing = self.existing().await?;
        let mut added = 0;
        for camera in VIDEO_CAMERAS
            .iter()
            .filter(|camera| !existing.iter().any(|row| row.url == camera.url))
        {
            let row = NewCameraRow {
                name: camera.name.to_string(),
                url: camera.url.to_string(),
                lot_zone: Some(camera.lot_zone.to_string()),
                is_active: true,
            };
            self.remote.insert_camera(&row).await?;
            info!("Added camera: {}", camera.name);
            added += 1;
        }
        Ok(added)
    }

    /// Delete every registered demo camera, returning how many were removed
    pub async fn remove_video_cameras(&self) -> Result<usize> {
        let result = async {
            let rows = self.existing().await?;
            for row in &rows {
                self.remote.delete_camera(row.id).await?;
            }
            Ok::<usize, anyhow::Error>(rows.len())
        }
        .await;

        match result {
            Ok(removed) => {
                self.notifier.success("Video cameras removed successfully");
                Ok(removed)
            }
            Err(e) => {
                self.notifier
                    .error(format!("Failed to remove video cameras: {}", e));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{InMemoryDataService, RemoteOp};

    fn seeder() -> (Arc<InMemoryDataService>, Notifier, VideoCameraSeeder) {
        let remote = Arc::new(InMemoryDataService::new());
        let notifier = Notifier::new();
        let seeder = VideoCameraSeeder::new(remote.clone(), notifier.clone());
        (remote, notifier, seeder)
    }

    #[tokio::test]
    async fn setup_inserts_only_missing_cameras() {
        let (remote, notifier, seeder) = seeder();
        remote
            .insert_camera(&NewCameraRow {
                name: "Existing".to_string(),
                url: "/videos/camera2.mp4".to_string(),
                lot_zone: None,
                is_active: true,
            })
            .await
            .unwrap();
        assert!(!seeder.videos_exist().await);

        assert_eq!(seeder.setup_video_cameras().await.unwrap(), 2);
        assert!(seeder.videos_exist().await);
        assert_eq!(remote.list_cameras().await.unwrap().len(), 3);
        assert!(notifier
            .messages()
            .contains(&"Video cameras configured successfully".to_string()));

        assert_eq!(seeder.setup_video_cameras().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_deletes_demo_cameras() {
        let (remote, notifier, seeder) = seeder();
        seeder.setup_video_cameras().await.unwrap();

        assert_eq!(seeder.remove_video_cameras().await.unwrap(), 3);
        assert!(remote.list_cameras().await.unwrap().is_empty());
        assert_eq!(
            notifier.messages().last().map(String::as_str),
            Some("Video cameras removed successfully")
        );
    }

    #[tokio::test]
    async fn lookup_failure_reads_as_missing() {
        let (remote, _, seeder) = seeder();
        remote.fail_next(RemoteOp::CamerasByUrl);
        assert!(!seeder.videos_exist().await);
    }

    #[test]
    fn finds_demo_camera_by_url() {
        assert_eq!(
            video_camera_by_url("/videos/camera3.mp4").map(|c| c.lot_zone),
            Some("Zone C")
        );
        assert!(video_camera_by_url("rtsp://elsewhere").is_none());
    }
}
