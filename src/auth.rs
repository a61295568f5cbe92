// Bearer-token verification for requests forwarded by the ordering platform
//
// Registration, login and session management live in the platform's hosted
// auth service; this module only resolves the caller's identity from the
// signed token it presents. Reward processing must never run against an
// anonymous or placeholder identity, so extraction fails closed.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

/// Role claimed by the token; admin is required for rule catalog writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// Claims carried by platform-issued access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the platform user id
    pub sub: Uuid,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    /// Expiry as a unix timestamp
    pub exp: i64,
}

/// Error types for token verification
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization token")]
    MissingToken,

    #[error("Invalid authorization token")]
    InvalidToken,

    #[error("Authorization token has expired")]
    TokenExpired,

    #[error("Auth configuration error: {0}")]
    ConfigurationError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::ConfigurationError(ref msg) => {
                tracing::error!("Auth configuration error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Verify a bearer token against the shared signing secret
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

/// Authenticated user extractor for protected routes
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Extract Authorization header
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        // Verify Bearer token format
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)?;

        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| {
            AuthError::ConfigurationError("JWT_SECRET not configured".to_string())
        })?;

        let claims = verify_token(token, &jwt_secret).map_err(|err| {
            warn!("Rejected bearer token for {}: {}", parts.uri.path(), err);
            err
        })?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn make_token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_token_round_trip() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            role: Role::Admin,
            exp: Utc::now().timestamp() + 3600,
        };

        let token = make_token(&claims, SECRET);
        let verified = verify_token(&token, SECRET).unwrap();

        assert_eq!(verified.sub, claims.sub);
        assert_eq!(verified.email, claims.email);
        assert_eq!(verified.role, Role::Admin);
    }

    #[test]
    fn test_verify_token_rejects_expired() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            role: Role::User,
            exp: Utc::now().timestamp() - 3600,
        };

        let token = make_token(&claims, SECRET);
        assert!(matches!(
            verify_token(&token, SECRET),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_verify_token_rejects_wrong_secret() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            role: Role::User,
            exp: Utc::now().timestamp() + 3600,
        };

        let token = make_token(&claims, "other-secret");
        assert!(matches!(
            verify_token(&token, SECRET),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_role_defaults_to_user() {
        let json = format!(
            r#"{{"sub":"{}","email":"user@example.com","exp":0}}"#,
            Uuid::new_v4()
        );
        let claims: Claims = serde_json::from_str(&json).unwrap();
        assert_eq!(claims.role, Role::User);
    }
}
