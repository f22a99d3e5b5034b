use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    channels::errors::ChannelError,
    domain::notification::{ChannelDeliveries, DeliveryStatus, Notification},
    repository::errors::RepositoryError,
};

#[cfg_attr(test, mockall::automock)]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, RepositoryError>;
    async fn find_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, RepositoryError>;
    async fn count_unread(&self, user_id: Uuid) -> Result<i64, RepositoryError>;
    /// True when the row exists and belongs to `user_id`; `read_at` keeps its first value.
    async fn mark_as_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError>;
    async fn bulk_mark_as_read(&self, ids: &[Uuid], user_id: Uuid) -> Result<u64, RepositoryError>;
    async fn mark_all_as_read(&self, user_id: Uuid) -> Result<u64, RepositoryError>;
    /// Writes every channel outcome and the aggregate status in one statement.
    async fn record_delivery(
        &self,
        id: Uuid,
        channels: &ChannelDeliveries,
        status: DeliveryStatus,
    ) -> Result<(), RepositoryError>;
    /// Moves due scheduled rows to `dispatching` and returns them.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError>;
}
