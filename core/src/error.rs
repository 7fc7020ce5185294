use serde::Serialize;
use utoipa::ToSchema;

/// Structured error response returned by every endpoint.
/// Carries enough context for an operator or client to correct the request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "not_found", "conflict")
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFIGURATION_INVALID: &str = "configuration_invalid";
    pub const COMPUTATION_FAILED: &str = "computation_failed";
    pub const CONFLICT: &str = "conflict";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const RATE_LIMITED: &str = "rate_limited";
}

/// One broken configuration rule.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ConfigViolation {
    /// Dotted path of the offending field (e.g. "confidence_thresholds.auto_approve")
    pub field: String,
    pub message: String,
}

/// Errors raised by the trust engine, the configuration store and review planning.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// Malformed request input. Nothing was computed.
    #[error("{message}")]
    Validation {
        field: String,
        message: String,
        received: Option<serde_json::Value>,
    },

    /// A referenced entity does not exist.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// A proposed configuration breaks threshold ordering or weight partitions.
    /// The current configuration is untouched.
    #[error("configuration rejected: {}", summarize_violations(.violations))]
    ConfigurationInvariant { violations: Vec<ConfigViolation> },

    /// An analyzer produced an unusable result; the whole verification fails.
    #[error("{stage} failed: {message}")]
    Computation { stage: String, message: String },

    /// Configuration apply raced another writer.
    #[error("configuration version {expected} is stale (current is {actual})")]
    ConcurrencyConflict { expected: String, actual: String },
}

impl TrustError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        TrustError::Validation {
            field: field.into(),
            message: message.into(),
            received: None,
        }
    }

    pub fn validation_with(
        field: impl Into<String>,
        message: impl Into<String>,
        received: serde_json::Value,
    ) -> Self {
        TrustError::Validation {
            field: field.into(),
            message: message.into(),
            received: Some(received),
        }
    }
}

fn summarize_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}
