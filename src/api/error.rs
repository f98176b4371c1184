//! Structured API error responses with stable error codes.
//!
//! Machine-readable codes plus human-readable messages, mapped from
//! [`EngineError`] so handlers stay thin.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::infra::EngineError;

// ============================================================================
// Error Codes
// ============================================================================

/// Stable error codes for programmatic handling by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Rate limiting (2xxx)
    RateLimitExceeded,

    // Validation (3xxx)
    InvalidRequestBody,
    InvalidFieldValue,
    ValidationFailed,

    // Resource (4xxx)
    ConfigNotFound,
    ChannelNotFound,
    RuleNotFound,

    // Conflict (5xxx)
    VersionConflict,
    AlreadyExists,

    // Inventory state (7xxx)
    InsufficientInventory,
    SalesClosed,
    InvariantViolation,

    // Infrastructure (8xxx)
    DatabaseError,
    ServiceUnavailable,
    SyncFailed,
    Timeout,
    InternalError,
}

impl ErrorCode {
    pub fn numeric_code(&self) -> u32 {
        match self {
            ErrorCode::RateLimitExceeded => 2001,

            ErrorCode::InvalidRequestBody => 3001,
            ErrorCode::InvalidFieldValue => 3002,
            ErrorCode::ValidationFailed => 3003,

            ErrorCode::ConfigNotFound => 4001,
            ErrorCode::ChannelNotFound => 4002,
            ErrorCode::RuleNotFound => 4003,

            ErrorCode::VersionConflict => 5001,
            ErrorCode::AlreadyExists => 5002,

            ErrorCode::InsufficientInventory => 7001,
            ErrorCode::SalesClosed => 7002,
            ErrorCode::InvariantViolation => 7003,

            ErrorCode::DatabaseError => 8001,
            ErrorCode::ServiceUnavailable => 8002,
            ErrorCode::SyncFailed => 8003,
            ErrorCode::Timeout => 8004,
            ErrorCode::InternalError => 8999,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::InvalidRequestBody => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,
            ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,

            ErrorCode::ConfigNotFound => StatusCode::NOT_FOUND,
            ErrorCode::ChannelNotFound => StatusCode::NOT_FOUND,
            ErrorCode::RuleNotFound => StatusCode::NOT_FOUND,

            ErrorCode::VersionConflict => StatusCode::CONFLICT,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,

            // Caller-fixable inventory conditions.
            ErrorCode::InsufficientInventory => StatusCode::CONFLICT,
            ErrorCode::SalesClosed => StatusCode::UNPROCESSABLE_ENTITY,
            // Indicates a caller bug or a race the version check should
            // have caught.
            ErrorCode::InvariantViolation => StatusCode::INTERNAL_SERVER_ERROR,

            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::SyncFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// API Error
// ============================================================================

/// Error payload returned by every handler.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub error_code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            error_code: code.numeric_code(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.http_status();
        (status, Json(serde_json::json!({ "error": self }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::Validation { field, message } => {
                ApiError::new(ErrorCode::ValidationFailed, message)
                    .with_details(serde_json::json!({ "field": field }))
            }
            EngineError::ConfigNotFound(_) | EngineError::ConfigNotFoundForRoomType { .. } => {
                ApiError::new(ErrorCode::ConfigNotFound, message)
            }
            EngineError::ChannelNotFound(_) => ApiError::new(ErrorCode::ChannelNotFound, message),
            EngineError::RuleNotFound(_) => ApiError::new(ErrorCode::RuleNotFound, message),
            EngineError::AlreadyActive { .. } => ApiError::new(ErrorCode::AlreadyExists, message),
            EngineError::VersionConflict { .. } => {
                ApiError::new(ErrorCode::VersionConflict, message)
            }
            EngineError::InsufficientInventory {
                date,
                requested,
                available,
            } => ApiError::new(ErrorCode::InsufficientInventory, message).with_details(
                serde_json::json!({
                    "date": date,
                    "requested": requested,
                    "available": available,
                }),
            ),
            EngineError::Closed { date, rule } => ApiError::new(ErrorCode::SalesClosed, message)
                .with_details(serde_json::json!({ "date": date, "rule": rule })),
            EngineError::InvariantViolation { invariant, .. } => {
                ApiError::new(ErrorCode::InvariantViolation, message)
                    .with_details(serde_json::json!({ "invariant": invariant }))
            }
            EngineError::Timeout => ApiError::new(ErrorCode::Timeout, message),
            EngineError::RateLimited => ApiError::new(ErrorCode::RateLimitExceeded, message),
            EngineError::SyncFailed(_) => ApiError::new(ErrorCode::SyncFailed, message),
            EngineError::StorageUnavailable(_) => {
                ApiError::new(ErrorCode::ServiceUnavailable, message)
            }
            EngineError::Database(_) => ApiError::new(ErrorCode::DatabaseError, message),
            EngineError::Internal(_) => ApiError::new(ErrorCode::InternalError, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_expected_statuses() {
        assert_eq!(
            ErrorCode::ConfigNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::VersionConflict.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::RateLimitExceeded.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::InvariantViolation.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn engine_errors_carry_diagnostics() {
        let err = EngineError::InsufficientInventory {
            date: "2023-06-01".parse().unwrap(),
            requested: 5,
            available: 2,
        };
        let api: ApiError = err.into();
        assert_eq!(api.code, ErrorCode::InsufficientInventory);
        let details = api.details.unwrap();
        assert_eq!(details["date"], "2023-06-01");
        assert_eq!(details["requested"], 5);
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::InsufficientInventory).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_INVENTORY\"");
    }
}
