use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use listing_trust_core::duplicates::{DuplicateQuery, build_report};
use listing_trust_core::engine::{VerificationResult, VerifyOptions, analyze_fields, conclude};
use listing_trust_core::error::ApiError;

use crate::db;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/businesses/{id}/verify", post(verify_business))
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct VerifyResponse {
    pub result: VerificationResult,
    /// True when a stored evaluation was still current and returned as-is
    pub cached: bool,
}

/// Evaluate a listing
///
/// Runs every analyzer against the active configuration and returns the
/// decision with its full rationale. A stored result is reused unless
/// `force_recompute` is set, the configuration version changed, or the
/// listing or any approved listing was edited after it was evaluated.
#[utoipa::path(
    post,
    path = "/v1/businesses/{id}/verify",
    params(("id" = Uuid, Path, description = "Business id")),
    request_body = VerifyOptions,
    responses(
        (status = 200, description = "Verification result", body = VerifyResponse),
        (status = 400, description = "Invalid options", body = ApiError),
        (status = 404, description = "Unknown business", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError),
        (status = 500, description = "An analyzer failed", body = ApiError)
    ),
    tag = "verification"
)]
pub async fn verify_business(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(options): AppJson<VerifyOptions>,
) -> Result<Json<VerifyResponse>, AppError> {
    options.validate()?;
    let now = Utc::now();

    let mut conn = state.db.acquire().await?;
    let snapshot = db::config::load_snapshot(&mut *conn).await?.snapshot;
    let business = db::business::fetch_business(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource: format!("business {id}"),
        })?;

    let cacheable = db::verification::is_cacheable(&options);
    if cacheable && !options.force_recompute {
        let latest_approval_at = db::business::latest_approval_at(&mut *conn).await?;
        if let Some(cached) = db::verification::fetch_cached(&mut *conn, id).await?
            && db::verification::is_current(
                &cached,
                snapshot.version(),
                business.updated_at,
                latest_approval_at,
            )
        {
            tracing::debug!(business_id = %id, "returning cached verification");
            return Ok(Json(VerifyResponse {
                result: cached,
                cached: true,
            }));
        }
    }
    drop(conn);

    let record = business.record;
    let config = &snapshot.configuration;

    // Analyzers are CPU-only and share nothing with the candidate query.
    let analysis = {
        let record = record.clone();
        let config = config.clone();
        let options = options.clone();
        tokio::task::spawn_blocking(move || analyze_fields(&record, &config, &options, now))
    };
    let duplicates = async {
        if !options.duplicates_enabled(config) {
            return Ok::<_, AppError>(None);
        }
        let matching = &config.duplicate_matching;
        let query = DuplicateQuery::for_record(&record, matching.max_candidates);
        let candidates = db::business::find_candidates(&state.db, &query).await?;
        tracing::debug!(
            business_id = %id,
            predicates = query.predicates.len(),
            candidates = candidates.len(),
            "duplicate candidates fetched"
        );
        Ok(Some(build_report(&record, &candidates, matching)))
    };
    let (analysis, duplicates) = tokio::join!(analysis, duplicates);
    let analyses = analysis??;
    let duplicates = duplicates?;

    let result = conclude(&record, analyses, duplicates, &snapshot, &options, now)?;

    if cacheable {
        db::verification::store(&state.db, &result).await?;
    }

    tracing::info!(
        business_id = %id,
        decision = result.decision.as_str(),
        confidence = result.overall_confidence(),
        config_version = %result.config_version,
        "business verified"
    );

    Ok(Json(VerifyResponse {
        result,
        cached: false,
    }))
}
