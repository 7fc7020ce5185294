use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use listing_trust_core::error::{self, ApiError, ConfigViolation, TrustError};

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Unknown business, configuration row or other resource (404)
    NotFound { resource: String },
    /// Proposed configuration breaks an invariant (422)
    ConfigurationInvalid { violations: Vec<ConfigViolation> },
    /// An analyzer produced an unusable result (500)
    Computation { stage: String, message: String },
    /// Configuration version raced another writer (409)
    Conflict { expected: String, actual: String },
    /// Threshold-change budget exhausted (429)
    RateLimited { retry_after_secs: u64 },
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();
        let retry_after = match &self {
            AppError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::ConfigurationInvalid { violations } => {
                let message = violations
                    .iter()
                    .map(|v| format!("{}: {}", v.field, v.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ApiError {
                        error: error::codes::CONFIGURATION_INVALID.to_string(),
                        message: format!("Configuration rejected: {message}"),
                        field: violations.first().map(|v| v.field.clone()),
                        received: serde_json::to_value(&violations).ok(),
                        request_id,
                        docs_hint: Some(
                            "Thresholds must satisfy auto_approve > manual_review > auto_reject \
                             and each weight group must sum to 100. \
                             Submit with test_mode=true to preview a change."
                                .to_string(),
                        ),
                    },
                )
            }
            AppError::Computation { stage, message } => {
                tracing::error!(%stage, %message, "verification computation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::COMPUTATION_FAILED.to_string(),
                        message: format!("{stage} failed: {message}"),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Conflict { expected, actual } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::CONFLICT.to_string(),
                    message: format!(
                        "Configuration version {expected} is stale; the current version is {actual}"
                    ),
                    field: Some("expected_version".to_string()),
                    received: Some(serde_json::Value::String(expected)),
                    request_id,
                    docs_hint: Some(
                        "Reload the configuration with GET /v1/config and retry against its version."
                            .to_string(),
                    ),
                },
            ),
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiError {
                    error: error::codes::RATE_LIMITED.to_string(),
                    message: format!(
                        "Too many threshold changes. Retry after {retry_after_secs} seconds."
                    ),
                    field: Some("threshold_adjustment".to_string()),
                    received: None,
                    request_id,
                    docs_hint: Some(
                        "Threshold changes share the rate_limits.config_updates_per_hour budget."
                            .to_string(),
                    ),
                },
            ),
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        let mut response = (status, Json(api_error)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<TrustError> for AppError {
    fn from(err: TrustError) -> Self {
        match err {
            TrustError::Validation {
                field,
                message,
                received,
            } => AppError::Validation {
                message,
                field: Some(field),
                received,
                docs_hint: None,
            },
            TrustError::NotFound { resource } => AppError::NotFound { resource },
            TrustError::ConfigurationInvariant { violations } => {
                AppError::ConfigurationInvalid { violations }
            }
            TrustError::Computation { stage, message } => AppError::Computation { stage, message },
            TrustError::ConcurrencyConflict { expected, actual } => {
                AppError::Conflict { expected, actual }
            }
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("analysis task failed: {err}"))
    }
}
