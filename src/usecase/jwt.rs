use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to validate token: {0}")]
    TokenValidationError(String),
    #[error("Token expired")]
    TokenExpired,
}

fn default_role() -> String {
    "user".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,      // Subject (user id)
    #[serde(default = "default_role")]
    pub role: String,
    pub exp: i64,         // Expiration time
    pub iat: i64,         // Issued at
    pub token_type: TokenType,
}

/// The auth service issues both kinds with the same secret; only access tokens authenticate here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Clone)]
pub struct JwtService {
    secret: String,
}

impl JwtService {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = jsonwebtoken::Validation::default();
        validation.validate_exp = true;

        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::TokenValidationError(e.to_string()),
        })?;

        Ok(token_data.claims)
    }

    /// Tokens are minted by the auth service; this exists for exercising the middleware.
    #[cfg(test)]
    pub fn issue(&self, claims: &Claims) -> String {
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            claims,
            &jsonwebtoken::EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .unwrap()
    }
}

#[cfg(test)]
pub fn test_claims(user_id: uuid::Uuid, role: &str, token_type: TokenType) -> Claims {
    let now = chrono::Utc::now().timestamp();
    Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: now + 3600,
        iat: now,
        token_type,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_jwt_service_creation() {
        let service = JwtService::new("secret".to_string());
        assert_eq!(service.secret, "secret");
    }

    #[test]
    fn test_validate_invalid_token() {
        let service = JwtService::new("secret".to_string());
        let result = service.validate_token("invalid.token.here");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_round_trip() {
        let service = JwtService::new("secret".to_string());
        let claims = test_claims(Uuid::new_v4(), "admin", TokenType::Access);
        let token = service.issue(&claims);

        assert_eq!(service.validate_token(&token).unwrap(), claims);
    }

    #[test]
    fn test_validate_wrong_secret() {
        let issuer = JwtService::new("secret".to_string());
        let token = issuer.issue(&test_claims(Uuid::new_v4(), "user", TokenType::Access));

        let verifier = JwtService::new("other".to_string());
        assert!(matches!(
            verifier.validate_token(&token),
            Err(JwtError::TokenValidationError(_))
        ));
    }

    #[test]
    fn test_validate_expired_token() {
        let service = JwtService::new("secret".to_string());
        let mut claims = test_claims(Uuid::new_v4(), "user", TokenType::Access);
        claims.exp = chrono::Utc::now().timestamp() - 3600;
        let token = service.issue(&claims);

        assert!(matches!(service.validate_token(&token), Err(JwtError::TokenExpired)));
    }

    #[test]
    fn test_role_defaults_to_user() {
        let json = r#"{"sub":"x","email":"e","exp":1,"iat":1,"token_type":"Access"}"#;
        let claims: Claims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.role, "user");
    }

    #[test]
    fn test_refresh_token_is_decoded_as_refresh() {
        let service = JwtService::new("secret".to_string());
        let token = service.issue(&test_claims(Uuid::new_v4(), "user", TokenType::Refresh));

        assert_eq!(service.validate_token(&token).unwrap().token_type, TokenType::Refresh);
    }
}
