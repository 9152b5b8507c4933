//! Fan-out of reminder notifications to subscribed adapter connections.

use crate::protocol::Mention;
use tokio::sync::broadcast;

/// Reminder produced by a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub chat_id: i64,
    pub members: Vec<Mention>,
}

/// Broadcasts notifications to every subscriber.
pub struct NotificationBroadcaster {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBroadcaster {
    /// Creates a broadcaster with the specified channel capacity.
    pub fn new(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publishes a notification. Returns how many subscribers received it.
    ///
    /// A notification published with no subscriber is dropped.
    pub fn publish(&self, notification: Notification) -> usize {
        let members = notification.members.len();
        match self.sender.send(notification) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::warn!(
                    "No adapter subscribed, dropped reminder for {} member(s)",
                    members
                );
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
