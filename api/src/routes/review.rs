use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use uuid::Uuid;

use listing_trust_core::config::ApplyRequest;
use listing_trust_core::error::ApiError;
use listing_trust_core::review::{ReviewOutcome, ReviewRequest, plan_review};

use crate::db;
use crate::error::AppError;
use crate::extract::{Actor, AppJson};
use crate::middleware::rate_limit::check_threshold_budget;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/businesses/{id}/review", post(review_business))
}

/// Record an administrator decision
///
/// Applies the reviewer's action and field overrides, records feedback on
/// the engine's last recommendation and resolves duplicates. A threshold
/// adjustment sent with feedback is applied through the configuration
/// store as a versioned change and counts against the configuration update
/// budget. Audit-log failures are returned as warnings.
#[utoipa::path(
    post,
    path = "/v1/businesses/{id}/review",
    params(
        ("id" = Uuid, Path, description = "Business id"),
        ("x-actor-id" = String, Header, description = "Reviewing administrator")
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review applied", body = ReviewOutcome),
        (status = 400, description = "Invalid review", body = ApiError),
        (status = 404, description = "Unknown business", body = ApiError),
        (status = 422, description = "Threshold adjustment breaks configuration rules", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "review"
)]
pub async fn review_business(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    AppJson(request): AppJson<ReviewRequest>,
) -> Result<Json<ReviewOutcome>, AppError> {
    let now = Utc::now();
    if request.threshold_adjustment.is_some() {
        check_threshold_budget(&state.threshold_limiter)?;
    }

    let mut tx = state.db.begin().await?;
    let business = db::business::fetch_business_for_update(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource: format!("business {id}"),
        })?;
    let prior = db::verification::fetch_prior(&mut *tx, id).await?;
    let snapshot = db::config::load_snapshot(&mut *tx).await?.snapshot;

    let mut plan = plan_review(&business.record, request, prior, &snapshot, &actor, now)?;

    if let Some(resolution) = &plan.duplicate_resolution
        && !db::business::business_exists(&mut *tx, resolution.duplicate_of).await?
    {
        return Err(AppError::NotFound {
            resource: format!("business {}", resolution.duplicate_of),
        });
    }

    db::business::update_business_fields(&mut tx, id, &plan.update).await?;
    if let Some(feedback) = &plan.feedback {
        db::feedback::insert_feedback(&mut tx, feedback).await?;
    }
    tx.commit().await?;

    let mut events = std::mem::take(&mut plan.events);
    let mut warnings = Vec::new();
    let mut config_version = None;

    if let Some(patch) = &plan.threshold_patch {
        let applied = db::config::apply_configuration(
            &state.db,
            ApplyRequest {
                partial: patch,
                expected_version: Some(snapshot.version()),
                actor: &actor,
                reason: Some(plan.threshold_reason()),
                now,
            },
        )
        .await;
        match applied {
            Ok(applied) => {
                events.push(plan.threshold_event(&applied));
                config_version = Some(applied.snapshot.version());
            }
            // The review itself is committed; report the adjustment separately.
            Err(err) => {
                tracing::warn!(business_id = %id, error = ?err, "threshold adjustment not applied");
                warnings.push(format!(
                    "threshold adjustment was not applied; configuration is still {}",
                    snapshot.version()
                ));
            }
        }
    }

    warnings.extend(db::audit::record_events(&state.db, &events).await);

    tracing::info!(
        business_id = %id,
        actor = %actor,
        status = plan.update.status.as_str(),
        feedback = plan.feedback.is_some(),
        threshold_changed = config_version.is_some(),
        "business reviewed"
    );

    Ok(Json(plan.into_outcome(config_version, warnings)))
}
