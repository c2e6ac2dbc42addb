//! Registries: owned local mirrors of remote tables.
//!
//! Each registry publishes its state on a `watch` channel and keeps it in
//! step with the remote through a sync task driven by change notifications.

use tokio_util::sync::CancellationToken;

pub mod camera;
pub mod detection_status;
pub mod slot;

pub use camera::{CameraListState, CameraRegistry};
pub use detection_status::DetectionStatusBook;
pub use slot::{SlotListState, SlotRegistry};

/// Owns a sync task; dropping it stops the task
pub(crate) struct SyncHandle {
    token: CancellationToken,
}

impl SyncHandle {
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
