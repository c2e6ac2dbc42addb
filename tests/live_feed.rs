use spotwise::api::{FeedServer, FeedServerHandle};
use spotwise::config::{FeedServerConfig, LiveFeedConfig};
use spotwise::db::models::{DetectionBatch, Resolution};
use spotwise::detection::{
    batch_channel, check_server, DetectionSource, FeedSource, LiveFeedClient, LiveFeedSource, LiveFeedState,
    ServerStatus,
};
use spotwise::messaging::Notifier;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn feed_server() -> FeedServerHandle {
    let config = FeedServerConfig {
        port: 0,
        frame_rate: 30,
        width: 96,
        height: 72,
        ..FeedServerConfig::default()
    };
    FeedServer::new(&config).spawn().await.unwrap()
}

fn client(handle: &FeedServerHandle, notifier: Notifier) -> LiveFeedClient {
    let config = LiveFeedConfig {
        server_url: handle.url(),
        ..LiveFeedConfig::default()
    };
    LiveFeedClient::new(&config, notifier)
}

async fn next_batch(rx: &mut mpsc::Receiver<DetectionBatch>) -> DetectionBatch {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no batch within 5s")
        .expect("batch channel closed")
}

#[tokio::test]
async fn probe_sees_running_server() {
    let server = feed_server().await;
    assert_eq!(
        check_server(&server.url(), Duration::from_secs(3)).await,
        ServerStatus::Running
    );
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn live_source_streams_numbered_vehicle_batches() {
    let server = feed_server().await;
    let notifier = Notifier::new();
    let source = LiveFeedSource::new(client(&server, notifier.clone()));
    let (callback, mut rx) = batch_channel(64);

    source
        .start(FeedSource::new(96, 72).with_video("/videos/camera1.mp4"), callback)
        .await
        .unwrap();
    assert!(source.is_active());

    let mut last = 0;
    for _ in 0..3 {
        let batch = next_batch(&mut rx).await;
        assert!(batch.frame_number > last);
        last = batch.frame_number;
        assert_eq!(batch.count, batch.detections.len());
        for detection in &batch.detections {
            assert!(["car", "motorcycle", "bus", "truck"].contains(&detection.class_name.as_str()));
            assert!(detection.confidence > 0.5);
        }
    }

    let state = source.client().state();
    assert!(state.connected);
    assert_eq!(state.fps, 30.0);
    assert_eq!(state.resolution, Some(Resolution { width: 96, height: 72 }));
    assert!(state.frame.is_some());

    source.stop().await;
    assert!(!source.is_active());
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());

    assert!(notifier
        .messages()
        .contains(&"Connected to AI detection server".to_string()));
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn stop_command_resets_frame_numbers() {
    let server = feed_server().await;
    let client = client(&server, Notifier::new());
    let (callback, mut rx) = batch_channel(256);
    client.on_batch(Some(callback));
    client.connect().await.unwrap();

    client.start_feed(None).await.unwrap();
    next_batch(&mut rx).await;
    next_batch(&mut rx).await;

    client.stop_feed().await.unwrap();
    client.start_feed(None).await.unwrap();

    // Frames already in flight before the stop still carry the old numbers
    let restarted = timeout(Duration::from_secs(5), async {
        while let Some(batch) = rx.recv().await {
            if batch.frame_number == 1 {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(restarted, Ok(true));

    client.disconnect().await;
    assert_eq!(client.state(), LiveFeedState::default());
    server.shutdown().await.unwrap();
}
