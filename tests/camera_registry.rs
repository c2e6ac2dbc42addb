use spotwise::config::RegistryConfig;
use spotwise::db::models::{CameraFormData, CameraStatus, NewCameraRow};
use spotwise::messaging::Notifier;
use spotwise::registry::CameraRegistry;
use spotwise::remote::{DataService, InMemoryDataService, RemoteOp};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<InMemoryDataService>, Arc<CameraRegistry>, Notifier) {
    let remote = Arc::new(InMemoryDataService::new());
    let notifier = Notifier::new();
    let registry = CameraRegistry::new(remote.clone(), notifier.clone(), &RegistryConfig::default());
    (remote, registry, notifier)
}

fn row(name: &str, is_active: bool) -> NewCameraRow {
    NewCameraRow {
        name: name.to_string(),
        url: format!("rtsp://lot/{}", name),
        lot_zone: None,
        is_active,
    }
}

#[tokio::test]
async fn statuses_follow_active_flag() {
    let (remote, registry, _) = setup();
    for (name, active) in [("north", true), ("east", false), ("south", true)] {
        remote.insert_camera(&row(name, active)).await.unwrap();
    }

    registry.fetch().await;
    let statuses: Vec<CameraStatus> = registry.cameras().iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![CameraStatus::Active, CameraStatus::Inactive, CameraStatus::Active]
    );
    assert!(!registry.is_loading());
}

#[tokio::test]
async fn blank_form_never_reaches_remote() {
    let (remote, registry, notifier) = setup();

    let result = registry.add(&CameraFormData::new("", "rtsp://lot/gate")).await;
    assert!(result.is_err());
    assert_eq!(remote.call_count(RemoteOp::InsertCamera), 0);
    assert_eq!(notifier.messages(), vec!["Please fill in all required fields"]);
}

#[tokio::test]
async fn add_prepends_without_refetch() {
    let (remote, registry, notifier) = setup();
    remote.insert_camera(&row("north", true)).await.unwrap();
    registry.fetch().await;
    remote.reset_calls();

    let camera = registry
        .add(&CameraFormData::new("Gate", "rtsp://lot/gate").with_zone("Zone A"))
        .await
        .unwrap();

    let cameras = registry.cameras();
    assert_eq!(cameras.len(), 2);
    assert_eq!(cameras[0].id, camera.id);
    assert_eq!(cameras[0].lot_zone.as_deref(), Some("Zone A"));
    assert_eq!(remote.call_count(RemoteOp::ListCameras), 0);
    assert_eq!(notifier.messages(), vec!["Camera \"Gate\" added successfully"]);
}

#[tokio::test]
async fn failed_add_refetches_exactly_once() {
    let (remote, registry, notifier) = setup();
    remote.fail_next(RemoteOp::InsertCamera);
    remote.reset_calls();

    let result = registry.add(&CameraFormData::new("Gate", "rtsp://lot/gate")).await;
    assert!(result.is_err());
    assert_eq!(remote.call_count(RemoteOp::ListCameras), 1);
    assert_eq!(notifier.messages(), vec!["Failed to add camera"]);
    assert!(registry.cameras().is_empty());
}

#[tokio::test(start_paused = true)]
async fn change_bursts_collapse_into_one_refetch() {
    let (remote, registry, _) = setup();
    registry.start_sync();
    assert!(registry.is_syncing());

    for name in ["a", "b", "c"] {
        remote.insert_camera(&row(name, true)).await.unwrap();
    }
    remote.reset_calls();

    tokio::time::sleep(Duration::from_millis(100)).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(remote.call_count(RemoteOp::ListCameras), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(remote.call_count(RemoteOp::ListCameras), 1);
    assert_eq!(registry.cameras().len(), 3);

    registry.stop_sync();
    assert!(!registry.is_syncing());
    remote.insert_camera(&row("d", true)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(remote.call_count(RemoteOp::ListCameras), 1);
}
