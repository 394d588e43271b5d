//! Notification hand-off to the delivery layer.

use tokio::sync::broadcast;
use tracing::debug;
use tycoon_core::{Notification, UserId};

/// Sink for plain-text notifications.
///
/// Delivery is fire-and-forget: `notify` never blocks and never fails the
/// operation that produced the notification.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    fn notify_user(&self, user_id: UserId, text: String) {
        self.notify(Notification::to_user(user_id, text));
    }

    fn announce(&self, text: String) {
        self.notify(Notification::to_channel(text));
    }
}

/// Configuration for [`BroadcastNotifier`].
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Notifications buffered per subscriber before the slowest one lags.
    pub buffer: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self { buffer: 1024 }
    }
}

/// Fans notifications out to every subscriber over a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(config: NotifierConfig) -> Self {
        let (tx, _) = broadcast::channel(config.buffer.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(NotifierConfig::default())
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("Notification dropped, no subscribers");
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}
