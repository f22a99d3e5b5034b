use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::channels::errors::ChannelError;
use crate::domain::notification::Notification;
use crate::usecase::contracts::ChannelSender;

const SUBSCRIBER_BUFFER: usize = 64;

/// Live fan-out of in-app notifications to each user's open websockets.
#[derive(Clone, Default)]
pub struct InAppHub {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<String>>>>,
}

impl InAppHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<String> {
        let mut channels = self.channels.write().await;
        channels
            .entry(user_id)
            .or_insert_with(|| {
                tracing::debug!(user_id = %user_id, "creating new broadcast channel");
                broadcast::channel(SUBSCRIBER_BUFFER).0
            })
            .subscribe()
    }

    /// Returns how many live subscribers received the payload.
    pub async fn publish(&self, user_id: Uuid, payload: String) -> usize {
        let channels = self.channels.read().await;
        match channels.get(&user_id) {
            Some(tx) => tx.send(payload).unwrap_or(0),
            None => 0,
        }
    }

    /// Drops the user's channel once the last subscriber is gone.
    pub async fn release(&self, user_id: Uuid) {
        let mut channels = self.channels.write().await;
        if let Some(tx) = channels.get(&user_id) {
            if tx.receiver_count() == 0 {
                channels.remove(&user_id);
                tracing::debug!(user_id = %user_id, "removed empty broadcast channel");
            }
        }
    }

    pub async fn subscriber_count(&self, user_id: Uuid) -> usize {
        let channels = self.channels.read().await;
        channels.get(&user_id).map_or(0, |tx| tx.receiver_count())
    }
}

/// The stored record is the inbox entry, so in-app delivery succeeds once the
/// payload is built; pushing it to open sockets is best effort.
pub struct InAppChannelSender {
    hub: InAppHub,
}

impl InAppChannelSender {
    pub fn new(hub: InAppHub) -> Self {
        Self { hub }
    }
}

impl ChannelSender for InAppChannelSender {
    #[tracing::instrument(skip(self, notification), fields(notification_id = %notification.id, user_id = %notification.user_id))]
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        let payload = serde_json::to_string(notification)?;
        let receivers = self.hub.publish(notification.user_id, payload).await;

        tracing::debug!(receivers, "in-app notification delivered");
        Ok(())
    }
}
