use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::typed_header::{TypedHeader, TypedHeaderRejection};
use serde::Serialize;
use uuid::Uuid;

use crate::usecase::error::UsecaseError;
use crate::usecase::jwt::TokenType;
use crate::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: String,
}

impl AuthenticatedUser {
    /// Admins and internal services may act on other users' notifications.
    pub fn is_privileged(&self) -> bool {
        self.role == "admin" || self.role == "service"
    }
}

/// Per-call tracing id; echoed in the success body and the `x-request-id` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

/// Success body: the payload's fields plus `requestId`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T: Serialize> {
    #[serde(flatten)]
    pub payload: T,
    pub request_id: Uuid,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(request_id: RequestId, payload: T) -> Self {
        Self {
            payload,
            request_id: request_id.0,
        }
    }
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.0.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, UsecaseError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|e| {
        tracing::warn!(error = %e, "missing or invalid authorization header");
        UsecaseError::Unauthorized("Missing or invalid Authorization header".to_string())
    })?;

    let claims = state.jwt_service.validate_token(bearer.token()).map_err(|e| {
        tracing::warn!(?e, "invalid token");
        UsecaseError::Unauthorized(format!("Invalid token: {}", e))
    })?;

    // Ensure it's an access token, not a refresh token
    if claims.token_type != TokenType::Access {
        tracing::warn!("attempted to use non-access token for authentication");
        return Err(UsecaseError::Unauthorized("Invalid token type".to_string()));
    }

    let user_id = Uuid::parse_str(&claims.sub).map_err(|e| {
        tracing::warn!(?e, "failed to parse user_id from token");
        UsecaseError::Unauthorized("Invalid user ID in token".to_string())
    })?;

    let authenticated_user = AuthenticatedUser {
        user_id,
        role: claims.role,
    };

    tracing::debug!(?authenticated_user, "user authenticated successfully");
    request.extensions_mut().insert(authenticated_user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_flattens_payload() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload {
            unread_count: i64,
        }

        let request_id = RequestId(Uuid::new_v4());
        let value = serde_json::to_value(Envelope::new(request_id, Payload { unread_count: 4 })).unwrap();

        assert_eq!(
            value,
            serde_json::json!({ "unreadCount": 4, "requestId": request_id.0.to_string() })
        );
    }

    #[test]
    fn test_privileged_roles() {
        let user = |role: &str| AuthenticatedUser {
            user_id: Uuid::new_v4(),
            role: role.to_string(),
        };

        assert!(user("admin").is_privileged());
        assert!(user("service").is_privileged());
        assert!(!user("user").is_privileged());
        assert!(!user("moderator").is_privileged());
    }
}
