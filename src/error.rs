// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::attendance::ScanRejection;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 500, raised only while loading configuration
    Config(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (authenticated, wrong role or not the owner)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate email)
    Conflict(String),

    // Attendance scan failures, each with its own code
    Attendance(ScanRejection),

    // 409, second submission of the same test
    AlreadySubmitted,

    // 503 Payment gateway unreachable or not configured
    Upstream(String),
}

impl AppError {
    /// Machine-readable code included in the response body, when there is one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AppError::Attendance(rejection) => Some(rejection.code()),
            AppError::AlreadySubmitted => Some("ALREADY_SUBMITTED"),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Attendance(rejection) => write!(f, "{}", rejection.message()),
            AppError::AlreadySubmitted => write!(f, "Test already submitted"),
            other => write!(f, "{:?}", other),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts the error into the uniform `{success: false, message}` body.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match self {
            AppError::InternalServerError(msg) | AppError::Config(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Attendance(rejection) => {
                (rejection.status(), rejection.message().to_string())
            }
            AppError::AlreadySubmitted => (
                StatusCode::CONFLICT,
                "You have already submitted this test".to_string(),
            ),
            AppError::Upstream(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
        };

        let body = match code {
            Some(code) => json!({ "success": false, "message": message, "code": code }),
            None => json!({ "success": false, "message": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// True when the database rejected a write because of a unique index.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) =
            body_json(AppError::InternalServerError("db exploded".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal Server Error");
        assert!(body.get("code").is_none());
    }

    #[tokio::test]
    async fn scan_rejections_carry_code() {
        let (status, body) = body_json(AppError::Attendance(ScanRejection::AlreadyUsed)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_USED");
    }

    #[tokio::test]
    async fn already_submitted_is_conflict() {
        let (status, body) = body_json(AppError::AlreadySubmitted).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_SUBMITTED");
        assert_eq!(body["success"], false);
    }
}
