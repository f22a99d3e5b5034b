use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use crate::{
    domain::notification::{ChannelDeliveries, DeliveryStatus, Notification},
    repository::errors::RepositoryError,
    usecase::contracts::NotificationRepository,
};

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    tracing::info!(max_connections, "connecting to database");

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl NotificationRepository for PostgresNotificationRepository {
    #[tracing::instrument(skip(self, notification), fields(notification_id = %notification.id, user_id = %notification.user_id))]
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError> {
        tracing::debug!("creating notification");

        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, user_id, title, message, notification_type, priority, channels, status, deliver_at, read_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.notification_type.as_str())
        .bind(notification.priority.as_str())
        .bind(Json(&notification.channels))
        .bind(notification.status.as_str())
        .bind(notification.deliver_at)
        .bind(notification.read_at)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(notification_id = %notification.id, "notification created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, RepositoryError> {
        tracing::debug!("finding notification by id");

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, title, message, notification_type, priority, channels, status, deliver_at, read_at, created_at
            FROM notifications
            WHERE id = $1
            "#
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id, %limit, %offset))]
    async fn find_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        tracing::debug!("finding notifications by user_id");

        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, title, message, notification_type, priority, channels, status, deliver_at, read_at, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = notifications.len(), "notifications found");
        Ok(notifications)
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn count_unread(&self, user_id: Uuid) -> Result<i64, RepositoryError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL"
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id, user_id = %user_id))]
    async fn mark_as_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        tracing::debug!("marking notification as read");

        // Owner check and first-read timestamp in one statement.
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, $3)
            WHERE id = $1 AND user_id = $2
            "#
        )
        .bind(id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self, ids), fields(user_id = %user_id, id_count = ids.len()))]
    async fn bulk_mark_as_read(&self, ids: &[Uuid], user_id: Uuid) -> Result<u64, RepositoryError> {
        tracing::debug!("bulk marking notifications as read");

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, $3)
            WHERE id = ANY($1) AND user_id = $2
            "#
        )
        .bind(ids)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        tracing::debug!(updated = result.rows_affected(), "bulk mark as read finished");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn mark_all_as_read(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = $2 WHERE user_id = $1 AND read_at IS NULL"
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, channels), fields(notification_id = %id, status = status.as_str()))]
    async fn record_delivery(
        &self,
        id: Uuid,
        channels: &ChannelDeliveries,
        status: DeliveryStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE notifications SET channels = $2, status = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(channels))
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(%now, %limit))]
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        tracing::debug!("claiming due notifications");

        // SKIP LOCKED keeps concurrent triggers from claiming the same rows.
        let claimed = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET status = 'dispatching'
            WHERE id IN (
                SELECT id FROM notifications
                WHERE status = 'scheduled' AND deliver_at <= $1
                ORDER BY deliver_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, user_id, title, message, notification_type, priority, channels, status, deliver_at, read_at, created_at
            "#
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = claimed.len(), "due notifications claimed");
        Ok(claimed)
    }
}

// Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::notification::{
        Channel, ChannelDelivery, ChannelFlags, ChannelStatus, NewNotification, NotificationType,
        Priority,
    };

    fn notification(user_id: Uuid, deliver_at: Option<DateTime<Utc>>) -> Notification {
        Notification::new(
            user_id,
            NewNotification {
                title: "Hi".to_string(),
                message: "Test".to_string(),
                notification_type: NotificationType::Warning,
                priority: Priority::High,
                channels: ChannelFlags {
                    email: true,
                    push: false,
                    in_app: true,
                },
                deliver_at,
            },
            Utc::now(),
        )
    }

    async fn seeded(pool: PgPool, user_id: Uuid) -> (PostgresNotificationRepository, Notification) {
        let repo = PostgresNotificationRepository::new(pool);
        let n = notification(user_id, None);
        repo.create(&n).await.unwrap();
        (repo, n)
    }

    #[sqlx::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_create_and_find_round_trip(pool: PgPool) {
        let (repo, n) = seeded(pool, Uuid::new_v4()).await;

        let found = repo.find_by_id(n.id).await.unwrap().unwrap();
        assert_eq!(found.user_id, n.user_id);
        assert_eq!(found.notification_type, NotificationType::Warning);
        assert_eq!(found.priority, Priority::High);
        assert_eq!(found.channels.push.status, ChannelStatus::NotApplicable);
        assert_eq!(found.status, n.status);
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_mark_as_read_is_owner_scoped_and_monotonic(pool: PgPool) {
        let owner = Uuid::new_v4();
        let (repo, n) = seeded(pool, owner).await;

        assert!(!repo.mark_as_read(n.id, Uuid::new_v4()).await.unwrap());
        assert!(repo.find_by_id(n.id).await.unwrap().unwrap().read_at.is_none());

        assert!(repo.mark_as_read(n.id, owner).await.unwrap());
        let first = repo.find_by_id(n.id).await.unwrap().unwrap().read_at;
        assert!(first.is_some());

        assert!(repo.mark_as_read(n.id, owner).await.unwrap());
        let second = repo.find_by_id(n.id).await.unwrap().unwrap().read_at;
        assert_eq!(first, second);
    }

    #[sqlx::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_bulk_mark_as_read_counts_owned_only(pool: PgPool) {
        let owner = Uuid::new_v4();
        let repo = PostgresNotificationRepository::new(pool);
        let mine = [notification(owner, None), notification(owner, None)];
        let theirs = notification(Uuid::new_v4(), None);
        for n in mine.iter().chain(std::iter::once(&theirs)) {
            repo.create(n).await.unwrap();
        }

        let ids = [mine[0].id, mine[1].id, theirs.id, Uuid::new_v4()];
        assert_eq!(repo.bulk_mark_as_read(&ids, owner).await.unwrap(), 2);
        assert!(repo.find_by_id(theirs.id).await.unwrap().unwrap().read_at.is_none());
        assert_eq!(repo.count_unread(owner).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_record_delivery_writes_channels_and_status(pool: PgPool) {
        let (repo, n) = seeded(pool, Uuid::new_v4()).await;
        let at = Utc::now();

        let mut channels = n.channels.clone();
        channels.set(Channel::InApp, ChannelDelivery::sent(at));
        channels.set(Channel::Email, ChannelDelivery::failed(at, "smtp down".to_string()));
        repo.record_delivery(n.id, &channels, DeliveryStatus::Partial)
            .await
            .unwrap();

        let found = repo.find_by_id(n.id).await.unwrap().unwrap();
        assert_eq!(found.channels.in_app.status, ChannelStatus::Sent);
        assert_eq!(found.channels.email.error.as_deref(), Some("smtp down"));
        assert_eq!(found.channels.push.status, ChannelStatus::NotApplicable);
        assert_eq!(found.status, DeliveryStatus::Partial);

        assert!(matches!(
            repo.record_delivery(Uuid::new_v4(), &channels, DeliveryStatus::Failed).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[sqlx::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_claim_due_takes_only_due_rows_once(pool: PgPool) {
        let repo = PostgresNotificationRepository::new(pool);
        let now = Utc::now();
        let due = notification(Uuid::new_v4(), Some(now + Duration::seconds(30)));
        let later = notification(Uuid::new_v4(), Some(now + Duration::hours(3)));
        repo.create(&due).await.unwrap();
        repo.create(&later).await.unwrap();

        let claimed = repo.claim_due(now + Duration::minutes(1), 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, due.id);
        assert_eq!(claimed[0].status, DeliveryStatus::Dispatching);

        assert!(repo.claim_due(now + Duration::minutes(1), 10).await.unwrap().is_empty());
    }
}
