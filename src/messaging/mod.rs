pub mod notification;
pub mod notifier;

pub use notification::{Notification, NotificationLevel};
pub use notifier::Notifier;
