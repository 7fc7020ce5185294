//! Latest verification per business, reused while still current.

use chrono::{DateTime, Utc};
use listing_trust_core::config::ConfigVersion;
use listing_trust_core::engine::{VerificationResult, VerifyOptions};
use listing_trust_core::review::PriorVerification;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::AppError;

/// Only requests with default analysis switches read or write the cache;
/// anything else would store a result other callers did not ask for.
pub fn is_cacheable(options: &VerifyOptions) -> bool {
    options.confidence_threshold.is_none()
        && options.include_duplicate_analysis
        && options.include_content_moderation
}

/// A cached result is stale once the configuration moved on, the listing
/// was edited, or any approved listing changed after it was evaluated.
pub fn is_current(
    cached: &VerificationResult,
    config_version: ConfigVersion,
    record_updated_at: DateTime<Utc>,
    latest_approval_at: Option<DateTime<Utc>>,
) -> bool {
    cached.config_version == config_version
        && evaluated_after_changes(cached.evaluated_at, record_updated_at, latest_approval_at)
}

fn evaluated_after_changes(
    evaluated_at: DateTime<Utc>,
    record_updated_at: DateTime<Utc>,
    latest_approval_at: Option<DateTime<Utc>>,
) -> bool {
    record_updated_at <= evaluated_at && latest_approval_at.is_none_or(|at| at <= evaluated_at)
}

pub async fn fetch_cached<'c>(
    executor: impl PgExecutor<'c>,
    business_id: Uuid,
) -> Result<Option<VerificationResult>, AppError> {
    let stored = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT result FROM verification_results WHERE business_id = $1",
    )
    .bind(business_id)
    .fetch_optional(executor)
    .await?;

    match stored {
        None => Ok(None),
        // A row that no longer deserializes is treated as a miss and overwritten.
        Some(value) => match serde_json::from_value(value) {
            Ok(result) => Ok(Some(result)),
            Err(err) => {
                tracing::warn!(%business_id, error = %err, "discarding unreadable cached verification");
                Ok(None)
            }
        },
    }
}

pub async fn store<'c>(
    executor: impl PgExecutor<'c>,
    result: &VerificationResult,
) -> Result<(), AppError> {
    let value = serde_json::to_value(result)
        .map_err(|e| AppError::Internal(format!("verification serialization: {e}")))?;
    sqlx::query(
        "INSERT INTO verification_results \
         (business_id, result, decision, confidence, config_version, evaluated_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (business_id) DO UPDATE SET \
           result = EXCLUDED.result, decision = EXCLUDED.decision, \
           confidence = EXCLUDED.confidence, config_version = EXCLUDED.config_version, \
           evaluated_at = EXCLUDED.evaluated_at",
    )
    .bind(result.business_id)
    .bind(value)
    .bind(result.decision.as_str())
    .bind(i16::from(result.overall_confidence()))
    .bind(result.config_version.to_string())
    .bind(result.evaluated_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct PriorRow {
    decision: String,
    confidence: i16,
}

/// The engine's last recommendation for a business, if it was ever verified.
pub async fn fetch_prior<'c>(
    executor: impl PgExecutor<'c>,
    business_id: Uuid,
) -> Result<Option<PriorVerification>, AppError> {
    let row = sqlx::query_as::<_, PriorRow>(
        "SELECT decision, confidence FROM verification_results WHERE business_id = $1",
    )
    .bind(business_id)
    .fetch_optional(executor)
    .await?;

    row.map(|row| {
        let decision = listing_trust_core::decision::Decision::from_db_value(&row.decision)
            .ok_or_else(|| AppError::Internal(format!("unknown cached decision '{}'", row.decision)))?;
        let confidence = u8::try_from(row.confidence)
            .map_err(|_| AppError::Internal(format!("cached confidence {}", row.confidence)))?;
        Ok(PriorVerification {
            decision,
            confidence,
        })
    })
    .transpose()
}
