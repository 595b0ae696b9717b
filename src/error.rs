use axum::Json;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::database::StoreError;
use crate::gateway::GatewayError;
use crate::utils::error_codes;

/// Machine-readable tag sent with 503 so clients can tell an outage from a bad request.
pub const DB_UNAVAILABLE: &str = "db_unavailable";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Request body is too large")]
    PayloadTooLarge,
    #[error("Username already exists")]
    DuplicateUser,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Invalid or expired token")]
    Forbidden,
    #[error("Too many requests, retry in {0} seconds")]
    RateLimited(u64),
    #[error("Database unavailable")]
    Unavailable,
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::DuplicateUser => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> i32 {
        match self {
            AppError::InvalidInput(_) => error_codes::VALIDATION_ERROR,
            AppError::DuplicateUser => error_codes::USER_EXISTS,
            AppError::PayloadTooLarge => error_codes::PAYLOAD_TOO_LARGE,
            AppError::InvalidCredentials | AppError::Unauthenticated => error_codes::AUTH_FAILED,
            AppError::Forbidden => error_codes::PERMISSION_DENIED,
            AppError::RateLimited(_) => error_codes::RATE_LIMIT,
            AppError::Unavailable => error_codes::UNAVAILABLE,
            AppError::Upstream(_) => error_codes::UPSTREAM_ERROR,
            AppError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }
}

/// Cause of an error response, carried in its extensions for request logging.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: i32,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let context = ErrorContext {
            code: self.code(),
            message: self.to_string(),
        };
        let body = Json(ErrorResponse {
            code: context.code,
            message: context.message.clone(),
            status: matches!(self, AppError::Unavailable).then_some(DB_UNAVAILABLE),
        });

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(context);
        response
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => AppError::Unavailable,
            StoreError::Duplicate => AppError::DuplicateUser,
            StoreError::Backend(msg) => AppError::Internal(msg),
        }
    }
}

/// Bodies that are not JSON, or that miss or mistype a field, are bad input.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidRequest(msg) => AppError::InvalidInput(msg),
            GatewayError::Upstream(msg) => AppError::Upstream(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn unavailable_carries_machine_readable_status() {
        let response = AppError::Unavailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], DB_UNAVAILABLE);
        assert_eq!(body["code"], error_codes::UNAVAILABLE);
    }

    #[tokio::test]
    async fn upstream_message_is_passed_through() {
        let response = AppError::Upstream("quota exceeded".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "quota exceeded");
        assert!(body.get("status").is_none());
    }

    #[test]
    fn response_carries_its_cause() {
        let response = AppError::Internal("pool exhausted".into()).into_response();
        let context = response.extensions().get::<ErrorContext>().unwrap();
        assert_eq!(context.code, error_codes::INTERNAL_ERROR);
        assert_eq!(context.message, "pool exhausted");
    }

    #[test]
    fn store_errors_map_onto_the_taxonomy() {
        assert!(matches!(
            AppError::from(StoreError::Unavailable("pool timed out".into())),
            AppError::Unavailable
        ));
        assert!(matches!(AppError::from(StoreError::Duplicate), AppError::DuplicateUser));
        assert_eq!(
            AppError::from(StoreError::Backend("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
