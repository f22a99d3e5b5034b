pub mod v1;

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::delivery::http::v1::middleware::{auth_middleware, request_id_middleware};
use crate::delivery::http::v1::notifications::{
    bulk_mark_as_read, create_notification, dispatch_due, get_delivery_status, get_unread_count,
    list_notifications, mark_all_as_read, mark_as_read, schedule_notification,
};
use crate::delivery::http::v1::ws::notifications_stream;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    // Everything except the websocket (token in query) requires a bearer token
    let notifications_api = Router::new()
        .route(
            "/api/v1/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/api/v1/notifications/unread-count", get(get_unread_count))
        .route("/api/v1/notifications/schedule", post(schedule_notification))
        .route("/api/v1/notifications/read-all", put(mark_all_as_read))
        .route("/api/v1/notifications/bulk/read", put(bulk_mark_as_read))
        .route("/api/v1/notifications/dispatch-due", post(dispatch_due))
        .route(
            "/api/v1/notifications/{id}/delivery-status",
            get(get_delivery_status),
        )
        .route("/api/v1/notifications/{id}/read", put(mark_as_read))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/v1/notifications/stream", get(notifications_stream))
        .merge(notifications_api)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    metrics_process::Collector::default().collect();
    state.metrics_handle.render()
}

#[tracing::instrument]
async fn healthz() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::channels::in_app::InAppHub;
    use crate::test_support::test_state;
    use crate::usecase::contracts::MockNotificationRepository;

    #[tokio::test]
    async fn test_healthz_is_public() {
        let app = router(test_state(MockNotificationRepository::new(), InAppHub::new()));

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_metrics_is_public() {
        let app = router(test_state(MockNotificationRepository::new(), InAppHub::new()));

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
