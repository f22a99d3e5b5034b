use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channels::errors::ChannelError;
use crate::domain::notification::{Channel, Notification, NotificationType, Priority};
use crate::usecase::contracts::ChannelSender;

pub const STREAM_NAME: &str = "NOTIFICATIONS";
pub const EMAIL_SUBJECT: &str = "notifications.email";
pub const PUSH_SUBJECT: &str = "notifications.push";

/// Payload consumed by the mail and push gateways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub channel: Channel,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl ChannelMessage {
    pub fn new(channel: Channel, notification: &Notification) -> Self {
        Self {
            notification_id: notification.id,
            user_id: notification.user_id,
            channel,
            title: notification.title.clone(),
            message: notification.message.clone(),
            notification_type: notification.notification_type,
            priority: notification.priority,
            created_at: notification.created_at,
        }
    }
}

pub async fn ensure_stream(client: &async_nats::Client) -> Result<(), ChannelError> {
    let jetstream = async_nats::jetstream::new(client.clone());
    jetstream
        .get_or_create_stream(async_nats::jetstream::stream::Config {
            name: STREAM_NAME.to_string(),
            subjects: vec![EMAIL_SUBJECT.to_string(), PUSH_SUBJECT.to_string()],
            retention: async_nats::jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        })
        .await
        .map_err(|e| ChannelError::Unavailable(e.to_string()))?;

    tracing::info!(stream = STREAM_NAME, "NATS JetStream stream ready");
    Ok(())
}

/// Hands a notification to an external gateway through a JetStream subject.
/// Delivery counts as sent once the stream acknowledges the message.
pub struct NatsChannelSender {
    jetstream: Option<async_nats::jetstream::Context>,
    channel: Channel,
    subject: &'static str,
}

impl NatsChannelSender {
    pub fn new(client: Option<async_nats::Client>, channel: Channel, subject: &'static str) -> Self {
        Self {
            jetstream: client.map(async_nats::jetstream::new),
            channel,
            subject,
        }
    }

    pub fn email(client: Option<async_nats::Client>) -> Self {
        Self::new(client, Channel::Email, EMAIL_SUBJECT)
    }

    pub fn push(client: Option<async_nats::Client>) -> Self {
        Self::new(client, Channel::Push, PUSH_SUBJECT)
    }
}

impl ChannelSender for NatsChannelSender {
    #[tracing::instrument(skip(self, notification), fields(channel = %self.channel, notification_id = %notification.id))]
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        let Some(jetstream) = &self.jetstream else {
            tracing::warn!("NATS is not connected, cannot deliver");
            return Err(ChannelError::Unavailable("NATS is not connected".to_string()));
        };

        let payload = serde_json::to_vec(&ChannelMessage::new(self.channel, notification))?;

        let ack_future = jetstream
            .publish(self.subject, payload.into())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, subject = self.subject, "failed to publish notification to NATS");
                ChannelError::Publish(e.to_string())
            })?;

        ack_future.await.map_err(|e| {
            tracing::error!(error = %e, subject = self.subject, "failed to get NATS publish ack");
            ChannelError::Publish(e.to_string())
        })?;

        tracing::info!(subject = self.subject, "published notification to NATS");
        Ok(())
    }
}
