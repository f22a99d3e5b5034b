use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::delivery::http::v1::middleware::{AuthenticatedUser, Envelope, RequestId};
use crate::domain::notification::{
    ChannelDeliveries, ChannelDelivery, ChannelFlags, DeliveryStatus, NewNotification,
    Notification, NotificationType, Priority,
};
use crate::usecase::error::UsecaseError;
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_DISPATCH_BATCH: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct NotificationListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DispatchDueRequest {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub recipient_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[serde(rename = "type", default)]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub channels: ChannelFlags,
    pub deliver_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct BulkReadRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub channels: ChannelDeliveries,
    pub status: DeliveryStatus,
    pub deliver_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            user_id: n.user_id,
            title: n.title,
            message: n.message,
            notification_type: n.notification_type,
            priority: n.priority,
            channels: n.channels,
            status: n.status,
            deliver_at: n.deliver_at,
            read_at: n.read_at,
            created_at: n.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub unread_count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Serialize)]
pub struct NotifyResponse {
    pub notification: NotificationResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub id: Uuid,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: DeliveryStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatusBody {
    pub email: ChannelDelivery,
    pub push: ChannelDelivery,
    pub in_app: ChannelDelivery,
    pub overall: DeliveryStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatusResponse {
    pub notification_id: Uuid,
    pub delivery_status: DeliveryStatusBody,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub notification_id: Uuid,
    pub read: bool,
}

#[derive(Serialize)]
pub struct UpdatedCountResponse {
    pub updated: u64,
}

#[derive(Serialize)]
pub struct DispatchDueResponse {
    pub dispatched: usize,
}

fn parse_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, UsecaseError> {
    path.map(|Path(id)| id).map_err(|e| {
        tracing::debug!(error = %e, "invalid notification id");
        UsecaseError::Validation("Invalid or missing notification id".to_string())
    })
}

pub(crate) fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, UsecaseError> {
    query
        .map(|Query(params)| params)
        .map_err(|e| UsecaseError::Validation(format!("Invalid query string: {}", e.body_text())))
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, UsecaseError> {
    body.map(|Json(payload)| payload)
        .map_err(|e| UsecaseError::Validation(format!("Invalid request body: {}", e.body_text())))
}

/// Validates the body and resolves who the notification is for.
fn into_draft(
    user: &AuthenticatedUser,
    payload: NotifyRequest,
) -> Result<(Uuid, NewNotification), UsecaseError> {
    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(user_id = %user.user_id, ?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(validation_errors.to_string()));
    }

    let recipient_id = payload.recipient_id.unwrap_or(user.user_id);
    if recipient_id != user.user_id && !user.is_privileged() {
        tracing::warn!(user_id = %user.user_id, %recipient_id, "non-privileged notify for another user");
        return Err(UsecaseError::Forbidden(
            "Only admins and services can notify other users".to_string(),
        ));
    }

    let draft = NewNotification {
        title: payload.title,
        message: payload.message,
        notification_type: payload.notification_type,
        priority: payload.priority,
        channels: payload.channels,
        deliver_at: payload.deliver_at,
    };
    Ok((recipient_id, draft))
}

#[tracing::instrument(skip(state, request_id), fields(user_id = %user.user_id))]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(request_id): Extension<RequestId>,
    params: Result<Query<NotificationListParams>, QueryRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    let params = parse_query(params)?;
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0).max(0);
    tracing::debug!(limit, offset, "listing notifications");

    let notifications = state
        .notifications_usecase
        .list_notifications(user.user_id, limit, offset)
        .await?;
    let unread_count = state.notifications_usecase.count_unread(user.user_id).await?;

    let notifications: Vec<NotificationResponse> =
        notifications.into_iter().map(NotificationResponse::from).collect();

    tracing::debug!(count = notifications.len(), unread_count, "notifications listed");
    Ok((
        StatusCode::OK,
        Json(Envelope::new(
            request_id,
            NotificationsListResponse {
                notifications,
                unread_count,
            },
        )),
    ))
}

#[tracing::instrument(skip(state, request_id), fields(user_id = %user.user_id))]
pub async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(request_id): Extension<RequestId>,
) -> Result<impl IntoResponse, UsecaseError> {
    let unread_count = state.notifications_usecase.count_unread(user.user_id).await?;

    tracing::debug!(unread_count, "unread count retrieved");
    Ok((
        StatusCode::OK,
        Json(Envelope::new(request_id, UnreadCountResponse { unread_count })),
    ))
}

#[tracing::instrument(skip(state, request_id, body), fields(user_id = %user.user_id))]
pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<NotifyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling notify request");

    let (recipient_id, draft) = into_draft(&user, parse_body(body)?)?;
    let notification = state.notifications_usecase.notify(recipient_id, draft).await?;

    tracing::debug!(notification_id = %notification.id, "notification created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new(
            request_id,
            NotifyResponse {
                notification: notification.into(),
            },
        )),
    ))
}

#[tracing::instrument(skip(state, request_id, body), fields(user_id = %user.user_id))]
pub async fn schedule_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<NotifyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling schedule request");

    let (recipient_id, draft) = into_draft(&user, parse_body(body)?)?;
    let notification = state
        .notifications_usecase
        .schedule(recipient_id, draft)
        .await?;

    tracing::debug!(notification_id = %notification.id, "notification scheduled");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new(
            request_id,
            ScheduleResponse {
                id: notification.id,
                scheduled_for: notification.deliver_at,
                status: notification.status,
            },
        )),
    ))
}

#[tracing::instrument(skip(state, request_id, path), fields(user_id = %user.user_id))]
pub async fn get_delivery_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(request_id): Extension<RequestId>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    let id = parse_id(path)?;
    tracing::debug!(notification_id = %id, "getting delivery status");

    let notification = state
        .notifications_usecase
        .delivery_status(id, user.user_id)
        .await?;

    let ChannelDeliveries { email, push, in_app } = notification.channels;
    Ok((
        StatusCode::OK,
        Json(Envelope::new(
            request_id,
            DeliveryStatusResponse {
                notification_id: notification.id,
                delivery_status: DeliveryStatusBody {
                    email,
                    push,
                    in_app,
                    overall: notification.status,
                },
            },
        )),
    ))
}

#[tracing::instrument(skip(state, request_id, path), fields(user_id = %user.user_id))]
pub async fn mark_as_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(request_id): Extension<RequestId>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    let id = parse_id(path)?;
    tracing::debug!(notification_id = %id, "marking notification as read");

    state.notifications_usecase.mark_as_read(id, user.user_id).await?;

    tracing::debug!(notification_id = %id, "notification marked as read");
    Ok((
        StatusCode::OK,
        Json(Envelope::new(
            request_id,
            MarkReadResponse {
                notification_id: id,
                read: true,
            },
        )),
    ))
}

#[tracing::instrument(skip(state, request_id, body), fields(user_id = %user.user_id))]
pub async fn bulk_mark_as_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<BulkReadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    let payload = parse_body(body)?;
    tracing::debug!(id_count = payload.ids.len(), "bulk marking notifications as read");

    let updated = state
        .notifications_usecase
        .bulk_mark_as_read(payload.ids, user.user_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(Envelope::new(request_id, UpdatedCountResponse { updated })),
    ))
}

#[tracing::instrument(skip(state, request_id), fields(user_id = %user.user_id))]
pub async fn mark_all_as_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(request_id): Extension<RequestId>,
) -> Result<impl IntoResponse, UsecaseError> {
    let updated = state.notifications_usecase.mark_all_as_read(user.user_id).await?;

    tracing::debug!(updated, "all notifications marked as read");
    Ok((
        StatusCode::OK,
        Json(Envelope::new(request_id, UpdatedCountResponse { updated })),
    ))
}

/// Trigger for the external scheduler.
#[tracing::instrument(skip(state, request_id, body), fields(user_id = %user.user_id))]
pub async fn dispatch_due(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Option<Json<DispatchDueRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    if !user.is_privileged() {
        tracing::warn!(user_id = %user.user_id, role = %user.role, "non-privileged dispatch attempt");
        return Err(UsecaseError::Forbidden(
            "Only admins and services can trigger dispatch".to_string(),
        ));
    }

    // Without a JSON body the configured batch size applies.
    let payload = parse_body(body.map(|json| json.unwrap_or_default()))?;
    let limit = payload
        .limit
        .unwrap_or(state.dispatch_batch_limit)
        .min(MAX_DISPATCH_BATCH);
    let dispatched = state
        .notifications_usecase
        .dispatch_due(Utc::now(), limit)
        .await?;

    Ok((
        StatusCode::OK,
        Json(Envelope::new(request_id, DispatchDueResponse { dispatched })),
    ))
}
