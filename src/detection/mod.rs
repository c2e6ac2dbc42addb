//! Detection sources and what views do with their output.
//!
//! Two interchangeable backends sit behind [`DetectionSource`]: a mock
//! generator producing random boxes, and a client for an external analytics
//! socket. Neither runs a model.

use crate::config::{Config, DetectionBackend};
use crate::db::models::DetectionBatch;
use crate::messaging::Notifier;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use tokio::sync::mpsc;

pub mod live;
pub mod mock;
pub mod overlay;
pub mod probe;
pub mod stats;

pub use live::{LiveFeedClient, LiveFeedSource, LiveFeedState};
pub use mock::MockDetector;
pub use overlay::{DrawOp, OverlayStyle};
pub use probe::{check_server, ServerStatus};
pub use stats::DetectionStats;

/// Receives every batch a source produces
pub type BatchCallback = Arc<dyn Fn(DetectionBatch) + Send + Sync>;

/// What a source should analyse
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSource {
    /// Video the analytics server should play
    pub video_path: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl FeedSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            video_path: None,
            width,
            height,
        }
    }

    pub fn with_video(mut self, path: impl Into<String>) -> Self {
        self.video_path = Some(path.into());
        self
    }
}

/// A pluggable producer of detection batches
#[async_trait]
pub trait DetectionSource: Send + Sync {
    /// Begin producing batches into `on_batch`; restarts if already active
    async fn start(&self, source: FeedSource, on_batch: BatchCallback) -> Result<()>;

    /// Stop producing. No batch reaches the callback once this returns.
    async fn stop(&self);

    fn is_active(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Adapt a callback into a channel for stream consumers.
///
/// Batches are dropped while the channel is full.
pub fn batch_channel(capacity: usize) -> (BatchCallback, mpsc::Receiver<DetectionBatch>) {
    let (tx, rx) = mpsc::channel(capacity);
    let callback: BatchCallback = Arc::new(move |batch: DetectionBatch| {
        if let Err(e) = tx.try_send(batch) {
            debug!("Dropping detection batch: {}", e);
        }
    });
    (callback, rx)
}

/// Pick the configured detection backend
pub fn source_from_config(config: &Config, notifier: Notifier) -> Arc<dyn DetectionSource> {
    match config.detection.backend {
        DetectionBackend::Mock => Arc::new(MockDetector::new(&config.detection)),
        DetectionBackend::Live => Arc::new(LiveFeedSource::new(LiveFeedClient::new(
            &config.live_feed,
            notifier,
        ))),
    }
}
