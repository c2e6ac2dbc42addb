use crate::config::DetectionConfig;
use crate::db::models::{BoundingBox, Detection, DetectionBatch};
use crate::detection::{BatchCallback, DetectionSource, FeedSource};
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Classes the mock generator draws from
pub const MOCK_CLASSES: [&str; 5] = ["car", "truck", "bus", "motorcycle", "person"];

pub const MIN_DETECTIONS: usize = 1;
pub const MAX_DETECTIONS: usize = 4;
pub const MIN_CONFIDENCE: f32 = 0.6;
pub const MIN_BOX_SIDE: f32 = 50.0;
pub const MAX_BOX_SIDE: f32 = 150.0;

/// Share of the canvas a box origin may fall in
const PLACEMENT_SPAN: f32 = 0.7;

/// Synthesize one frame's worth of random detections
pub fn generate_detections<R: Rng + ?Sized>(rng: &mut R, width: u32, height: u32) -> Vec<Detection> {
    let count = rng.gen_range(MIN_DETECTIONS..=MAX_DETECTIONS);
    (0..count)
        .map(|_| {
            let class_name = MOCK_CLASSES[rng.gen_range(0..MOCK_CLASSES.len())];
            Detection {
                class_name: class_name.to_string(),
                confidence: rng.gen_range(MIN_CONFIDENCE..=1.0),
                bbox: BoundingBox {
                    x: rng.gen_range(0.0..=width as f32 * PLACEMENT_SPAN),
                    y: rng.gen_range(0.0..=height as f32 * PLACEMENT_SPAN),
                    width: rng.gen_range(MIN_BOX_SIDE..=MAX_BOX_SIDE),
                    height: rng.gen_range(MIN_BOX_SIDE..=MAX_BOX_SIDE),
                },
                class_id: None,
            }
        })
        .collect()
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Clears the active flag when the generator task ends, panics included
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Random-box generator ticking at a fixed cadence
pub struct MockDetector {
    tick: Duration,
    active: Arc<AtomicBool>,
    running: Mutex<Option<Running>>,
}

impl MockDetector {
    /// Create a new mock detector
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            tick: Duration::from_millis(config.tick_interval_ms.max(1)),
            active: Arc::new(AtomicBool::new(false)),
            running: Mutex::new(None),
        }
    }

    async fn halt(&self, running: &mut Option<Running>) {
        if let Some(Running { token, handle }) = running.take() {
            token.cancel();
            // The task may be mid-callback; wait it out
            if let Err(e) = handle.await {
                error!("Mock detection task failed: {}", e);
            }
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl DetectionSource for MockDetector {
    async fn start(&self, source: FeedSource, on_batch: BatchCallback) -> Result<()> {
        let mut running = self.running.lock().await;
        self.halt(&mut running).await;

        let token = CancellationToken::new();
        let task_token = token.clone();
        let tick = self.tick;
        self.active.store(true, Ordering::SeqCst);
        let guard = ActiveGuard(self.active.clone());
        info!(
            "Starting mock detection on a {}x{} canvas every {:?}",
            source.width, source.height, tick
        );

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let mut rng = StdRng::from_entropy();
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut frame_number = 0u64;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if task_token.is_cancelled() {
                            break;
                        }
                        frame_number += 1;
                        let detections = generate_detections(&mut rng, source.width, source.height);
                        on_batch(DetectionBatch::new(detections, frame_number));
                    }
                }
            }
            debug!("Mock detection stopped after {} frames", frame_number);
        });

        *running = Some(Running { token, handle });
        Ok(())
    }

    async fn stop(&self) {
        let mut running = self.running.lock().await;
        self.halt(&mut running).await;
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
