use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::notification::{NewNotification, Notification};
use crate::usecase::contracts::{ChannelSender, NotificationRepository};
use crate::usecase::dispatcher::DeliveryDispatcher;
use crate::usecase::error::UsecaseError;

pub const MAX_BULK_IDS: usize = 500;

pub struct NotificationsUseCase<N, E, P, I>
where
    N: NotificationRepository,
    E: ChannelSender,
    P: ChannelSender,
    I: ChannelSender,
{
    notification_repository: N,
    dispatcher: DeliveryDispatcher<E, P, I>,
}

impl<N, E, P, I> NotificationsUseCase<N, E, P, I>
where
    N: NotificationRepository,
    E: ChannelSender,
    P: ChannelSender,
    I: ChannelSender,
{
    pub fn new(notification_repository: N, dispatcher: DeliveryDispatcher<E, P, I>) -> Self {
        Self {
            notification_repository,
            dispatcher,
        }
    }

    /// Persists the notification and, unless it is due later, dispatches it before returning.
    #[tracing::instrument(skip(self, draft), fields(user_id = %recipient_id, notification_type = draft.notification_type.as_str()))]
    pub async fn notify(
        &self,
        recipient_id: Uuid,
        draft: NewNotification,
    ) -> Result<Notification, UsecaseError> {
        tracing::debug!("creating notification");

        validate_draft(recipient_id, &draft)?;

        let notification = Notification::new(recipient_id, draft, Utc::now());
        self.notification_repository.create(&notification).await?;
        metrics::counter!("notifications_created_total", "type" => notification.notification_type.as_str()).increment(1);

        if notification.is_scheduled() {
            tracing::info!(
                notification_id = %notification.id,
                deliver_at = ?notification.deliver_at,
                "notification scheduled"
            );
            return Ok(notification);
        }

        let notification = self
            .dispatcher
            .dispatch(&self.notification_repository, notification)
            .await?;

        tracing::info!(
            notification_id = %notification.id,
            status = notification.status.as_str(),
            "notification created"
        );
        Ok(notification)
    }

    #[tracing::instrument(skip(self, draft), fields(user_id = %recipient_id))]
    pub async fn schedule(
        &self,
        recipient_id: Uuid,
        draft: NewNotification,
    ) -> Result<Notification, UsecaseError> {
        match draft.deliver_at {
            Some(at) if at > Utc::now() => self.notify(recipient_id, draft).await,
            Some(_) => Err(UsecaseError::Validation(
                "deliverAt must be in the future".to_string(),
            )),
            None => Err(UsecaseError::Validation("deliverAt is required".to_string())),
        }
    }

    /// Absent and foreign notifications both surface as not found.
    #[tracing::instrument(skip(self), fields(notification_id = %id, user_id = %user_id))]
    pub async fn delivery_status(&self, id: Uuid, user_id: Uuid) -> Result<Notification, UsecaseError> {
        tracing::debug!("getting delivery status");

        self.notification_repository
            .find_by_id(id)
            .await?
            .filter(|notification| notification.user_id == user_id)
            .ok_or_else(|| UsecaseError::NotFound("Notification".to_string()))
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id, %limit, %offset))]
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, UsecaseError> {
        tracing::debug!("listing notifications");

        let notifications = self
            .notification_repository
            .find_by_user_id(user_id, limit, offset)
            .await?;

        tracing::debug!(user_id = %user_id, count = notifications.len(), "retrieved notifications");
        Ok(notifications)
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn count_unread(&self, user_id: Uuid) -> Result<i64, UsecaseError> {
        tracing::debug!("counting unread notifications");

        let count = self.notification_repository.count_unread(user_id).await?;

        tracing::debug!(user_id = %user_id, count, "unread count retrieved");
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id, user_id = %user_id))]
    pub async fn mark_as_read(&self, id: Uuid, user_id: Uuid) -> Result<(), UsecaseError> {
        tracing::debug!("marking notification as read");

        if self.notification_repository.mark_as_read(id, user_id).await? {
            metrics::counter!("notifications_marked_read_total").increment(1);
            tracing::debug!(notification_id = %id, "notification marked as read");
            return Ok(());
        }

        // The update matched nothing; tell absence apart from foreign ownership.
        match self.notification_repository.find_by_id(id).await? {
            Some(notification) if notification.user_id != user_id => Err(UsecaseError::Forbidden(
                "Notification belongs to another user".to_string(),
            )),
            _ => Err(UsecaseError::NotFound("Notification".to_string())),
        }
    }

    /// Unknown and foreign ids are skipped; returns how many owned notifications matched.
    #[tracing::instrument(skip(self, ids), fields(user_id = %user_id, id_count = ids.len()))]
    pub async fn bulk_mark_as_read(&self, mut ids: Vec<Uuid>, user_id: Uuid) -> Result<u64, UsecaseError> {
        tracing::debug!("bulk marking notifications as read");

        ids.sort_unstable();
        ids.dedup();

        if ids.is_empty() {
            return Ok(0);
        }
        if ids.len() > MAX_BULK_IDS {
            return Err(UsecaseError::Validation(format!(
                "at most {MAX_BULK_IDS} ids per request"
            )));
        }

        let updated = self
            .notification_repository
            .bulk_mark_as_read(&ids, user_id)
            .await?;
        metrics::counter!("notifications_marked_read_total").increment(updated);

        tracing::debug!(user_id = %user_id, updated, "notifications marked as read");
        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn mark_all_as_read(&self, user_id: Uuid) -> Result<u64, UsecaseError> {
        tracing::debug!("marking all notifications as read");

        let updated = self.notification_repository.mark_all_as_read(user_id).await?;
        metrics::counter!("notifications_marked_read_total").increment(updated);

        tracing::debug!(user_id = %user_id, updated, "all notifications marked as read");
        Ok(updated)
    }

    /// Claims scheduled notifications that are due and dispatches them.
    /// A failure on one notification is logged and does not stop the batch.
    #[tracing::instrument(skip(self), fields(%now, %limit))]
    pub async fn dispatch_due(&self, now: DateTime<Utc>, limit: i64) -> Result<usize, UsecaseError> {
        if limit <= 0 {
            return Err(UsecaseError::Validation("limit must be positive".to_string()));
        }

        let claimed = self.notification_repository.claim_due(now, limit).await?;
        tracing::debug!(count = claimed.len(), "claimed due notifications");

        let mut dispatched = 0;
        for notification in claimed {
            let id = notification.id;
            match self
                .dispatcher
                .dispatch(&self.notification_repository, notification)
                .await
            {
                Ok(_) => dispatched += 1,
                Err(e) => {
                    tracing::error!(notification_id = %id, error = %e, "failed to dispatch due notification");
                }
            }
        }

        tracing::info!(dispatched, "due notifications dispatched");
        Ok(dispatched)
    }
}

fn validate_draft(recipient_id: Uuid, draft: &NewNotification) -> Result<(), UsecaseError> {
    if recipient_id.is_nil() {
        return Err(UsecaseError::Validation("recipientId is required".to_string()));
    }
    if draft.title.trim().is_empty() {
        return Err(UsecaseError::Validation("title is required".to_string()));
    }
    if draft.message.trim().is_empty() {
        return Err(UsecaseError::Validation("message is required".to_string()));
    }
    if !draft.channels.any() {
        return Err(UsecaseError::Validation(
            "at least one channel must be enabled".to_string(),
        ));
    }
    Ok(())
}
