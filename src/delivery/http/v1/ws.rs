use std::sync::Arc;

use axum::extract::ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket};
use axum::{
    extract::{rejection::QueryRejection, Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::delivery::http::v1::notifications::parse_query;
use crate::usecase::error::UsecaseError;
use crate::usecase::jwt::TokenType;
use crate::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    token: String,
}

/// Live in-app feed. Browsers cannot set headers on websocket upgrades, so the
/// access token travels in the query string.
pub async fn notifications_stream(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    query: Result<Query<WsQuery>, QueryRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let query = match parse_query(query) {
        Ok(query) => query,
        Err(e) => return e.into_response(),
    };

    let claims = match state.jwt_service.validate_token(&query.token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "WS connection rejected: invalid token");
            return UsecaseError::Unauthorized("Invalid token".to_string()).into_response();
        }
    };

    if claims.token_type != TokenType::Access {
        tracing::warn!("WS connection rejected: not an access token");
        return UsecaseError::Unauthorized("Invalid token type".to_string()).into_response();
    }

    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        tracing::warn!("WS connection rejected: invalid user id in token");
        return UsecaseError::Unauthorized("Invalid user ID in token".to_string()).into_response();
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(user_id = %user_id, error = %rejection, "WS upgrade rejected");
            return rejection.into_response();
        }
    };

    tracing::info!(user_id = %user_id, "WS connection accepted, upgrading");
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: Uuid, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut rx = state.in_app_hub.subscribe(user_id).await;

    tracing::info!(user_id = %user_id, "WS client connected");

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(payload) => {
                        tracing::debug!(user_id = %user_id, "sending notification to WS client");
                        if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                            tracing::info!(user_id = %user_id, "WS send failed, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Skipped notifications remain in the inbox listing.
                        tracing::warn!(user_id = %user_id, lagged = n, "WS client lagged, some notifications were skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!(user_id = %user_id, "broadcast channel closed");
                        break;
                    }
                }
            }
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(user_id = %user_id, "WS client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(user_id = %user_id, error = %e, "WS receive error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(rx);
    state.in_app_hub.release(user_id).await;
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::channels::in_app::InAppHub;
    use crate::delivery::http::router;
    use crate::test_support::{bearer, test_state};
    use crate::usecase::contracts::MockNotificationRepository;

    #[tokio::test]
    async fn test_stream_rejects_invalid_token() {
        let app = router(test_state(MockNotificationRepository::new(), InAppHub::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/notifications/stream?token=bogus")
                    .header("connection", "upgrade")
                    .header("upgrade", "websocket")
                    .header("sec-websocket-version", "13")
                    .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stream_requires_upgrade_after_auth() {
        let app = router(test_state(MockNotificationRepository::new(), InAppHub::new()));
        let uri = format!(
            "/api/v1/notifications/stream?token={}",
            bearer(uuid::Uuid::new_v4(), "user")
        );

        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_stream_without_token_is_json_bad_request() {
        let app = router(test_state(MockNotificationRepository::new(), InAppHub::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/notifications/stream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
    }
}
