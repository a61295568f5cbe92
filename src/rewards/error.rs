use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error types for reward engine and coupon redemption operations
#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Missing user identity")]
    MissingUser,

    #[error("Coupon not found")]
    CouponNotFound,

    #[error("Coupon not eligible: {0}")]
    NotEligible(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Line item has no usable slug or name")]
    UnresolvableItem,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for RewardError {
    fn from(err: sqlx::Error) -> Self {
        RewardError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for RewardError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            RewardError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                // Generic message to the client; details stay in the logs.
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            RewardError::MissingUser => (
                StatusCode::UNAUTHORIZED,
                "Missing user identity".to_string(),
            ),
            RewardError::CouponNotFound => {
                (StatusCode::NOT_FOUND, "Coupon not found".to_string())
            }
            RewardError::NotEligible(msg) => {
                (StatusCode::CONFLICT, format!("Coupon not eligible: {}", msg))
            }
            RewardError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            RewardError::InvalidQuantity(msg) => (StatusCode::BAD_REQUEST, msg),
            RewardError::UnresolvableItem => (
                StatusCode::BAD_REQUEST,
                "Line item has no usable slug or name".to_string(),
            ),
            RewardError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RewardError::NotEligible("coupon has expired".to_string());
        assert_eq!(error.to_string(), "Coupon not eligible: coupon has expired");

        let error = RewardError::MissingUser;
        assert_eq!(error.to_string(), "Missing user identity");
    }

    #[test]
    fn test_error_from_sqlx() {
        let sqlx_error = sqlx::Error::RowNotFound;
        let reward_error: RewardError = sqlx_error.into();
        assert!(matches!(reward_error, RewardError::DatabaseError(_)));
    }
}
