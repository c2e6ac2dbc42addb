use crate::messaging::notification::{Notification, NotificationLevel};
use log::{info, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Fan-out channel for user notifications.
///
/// Cloning is cheap; every clone publishes into the same channel. A bounded
/// history of recent notifications is kept for consumers that attach late.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
    history: Arc<Mutex<Vec<Notification>>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Receive every notification published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(Notification::new(NotificationLevel::Success, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(Notification::new(NotificationLevel::Info, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(Notification::new(NotificationLevel::Error, message));
    }

    fn publish(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => warn!("Notify: {}", notification.message),
            _ => info!("Notify: {}", notification.message),
        }

        {
            let mut history = self
                .history
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if history.len() == CHANNEL_CAPACITY {
                history.remove(0);
            }
            history.push(notification.clone());
        }

        // No subscribers is fine
        let _ = self.sender.send(notification);
    }

    /// Snapshot of recent notifications, oldest first
    pub fn history(&self) -> Vec<Notification> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages of recent notifications, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.history().into_iter().map(|n| n.message).collect()
    }
}
