use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use listing_trust_core::feedback::{FeedbackSummary, summarize};

use crate::db;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/feedback/summary", get(feedback_summary))
}

/// Reviewer agreement with engine recommendations
///
/// Aggregates every recorded feedback entry. Read-only; nothing here feeds
/// back into scoring.
#[utoipa::path(
    get,
    path = "/v1/feedback/summary",
    responses((status = 200, description = "Calibration summary", body = FeedbackSummary)),
    tag = "review"
)]
pub async fn feedback_summary(
    State(state): State<AppState>,
) -> Result<Json<FeedbackSummary>, AppError> {
    let records = db::feedback::list_feedback(&state.db).await?;
    Ok(Json(summarize(&records)))
}
