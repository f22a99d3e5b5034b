use chrono::Utc;

use crate::domain::notification::{Channel, ChannelDelivery, Notification};
use crate::repository::errors::RepositoryError;
use crate::usecase::contracts::{ChannelSender, NotificationRepository};

/// Fans a notification out to its enabled channels and records the outcome of each.
/// Channels succeed or fail independently; nothing is retried or rolled back here.
pub struct DeliveryDispatcher<E, P, I>
where
    E: ChannelSender,
    P: ChannelSender,
    I: ChannelSender,
{
    email: E,
    push: P,
    in_app: I,
}

impl<E, P, I> DeliveryDispatcher<E, P, I>
where
    E: ChannelSender,
    P: ChannelSender,
    I: ChannelSender,
{
    pub fn new(email: E, push: P, in_app: I) -> Self {
        Self { email, push, in_app }
    }

    #[tracing::instrument(skip(self, repository, notification), fields(notification_id = %notification.id, user_id = %notification.user_id))]
    pub async fn dispatch<N>(
        &self,
        repository: &N,
        mut notification: Notification,
    ) -> Result<Notification, RepositoryError>
    where
        N: NotificationRepository,
    {
        tracing::debug!("dispatching notification");

        let (email, push, in_app) = tokio::join!(
            attempt(&self.email, Channel::Email, &notification),
            attempt(&self.push, Channel::Push, &notification),
            attempt(&self.in_app, Channel::InApp, &notification),
        );

        for (channel, outcome) in [
            (Channel::Email, email),
            (Channel::Push, push),
            (Channel::InApp, in_app),
        ] {
            if let Some(delivery) = outcome {
                notification.channels.set(channel, delivery);
            }
        }

        // Outcomes and aggregate are written together.
        let status = notification.channels.aggregate_status();
        if let Err(e) = repository
            .record_delivery(notification.id, &notification.channels, status)
            .await
        {
            tracing::error!(error = %e, status = status.as_str(), "failed to record delivery outcome");
            return Err(e);
        }
        notification.status = status;

        tracing::info!(status = status.as_str(), "notification dispatched");
        Ok(notification)
    }
}

async fn attempt<S>(
    sender: &S,
    channel: Channel,
    notification: &Notification,
) -> Option<ChannelDelivery>
where
    S: ChannelSender,
{
    if !notification.channels.get(channel).enabled {
        return None;
    }

    let delivery = match sender.send(notification).await {
        Ok(()) => {
            metrics::counter!("notification_channel_deliveries_total", "channel" => channel.key(), "outcome" => "sent").increment(1);
            ChannelDelivery::sent(Utc::now())
        }
        Err(e) => {
            tracing::warn!(%channel, error = %e, "channel delivery failed");
            metrics::counter!("notification_channel_deliveries_total", "channel" => channel.key(), "outcome" => "failed").increment(1);
            ChannelDelivery::failed(Utc::now(), e.to_string())
        }
    };

    Some(delivery)
}
