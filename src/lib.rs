pub mod channels;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod repository;
pub mod telemetry;
pub mod usecase;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::channels::in_app::{InAppChannelSender, InAppHub};
use crate::channels::nats::NatsChannelSender;
use crate::usecase::jwt::JwtService;
use crate::usecase::notifications::NotificationsUseCase;

#[cfg(not(test))]
pub type NotificationStore = crate::repository::postgres::PostgresNotificationRepository;
#[cfg(test)]
pub type NotificationStore = crate::usecase::contracts::MockNotificationRepository;

pub type AppNotificationsUseCase =
    NotificationsUseCase<NotificationStore, NatsChannelSender, NatsChannelSender, InAppChannelSender>;

pub struct AppState {
    pub notifications_usecase: AppNotificationsUseCase,
    pub jwt_service: JwtService,
    pub in_app_hub: InAppHub,
    pub metrics_handle: PrometheusHandle,
    pub dispatch_batch_limit: i64,
}
