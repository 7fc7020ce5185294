use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use listing_trust_core::config::{
    AppliedConfiguration, ApplyRequest, ConfigSnapshot, ConfigVersion, HistoryPage, HistoryQuery,
    TestModeEvaluation, evaluate_test_mode, query_history,
};
use listing_trust_core::error::ApiError;

use crate::db;
use crate::error::AppError;
use crate::extract::{Actor, AppJson};
use crate::state::AppState;

const MAX_REASON_LENGTH: usize = 1000;

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/v1/config", get(get_config))
        .route("/v1/config/history", get(get_config_history))
}

pub fn write_router() -> Router<AppState> {
    Router::new().route("/v1/config", post(update_config))
}

/// Current configuration with version metadata
#[utoipa::path(
    get,
    path = "/v1/config",
    responses(
        (status = 200, description = "Active configuration", body = ConfigSnapshot),
        (status = 404, description = "Configuration not seeded", body = ApiError)
    ),
    tag = "configuration"
)]
pub async fn get_config(State(state): State<AppState>) -> Result<Json<ConfigSnapshot>, AppError> {
    let stored = db::config::load_snapshot(&state.db).await?;
    Ok(Json(stored.snapshot))
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateConfigRequest {
    /// Partial configuration, merged into the current one
    #[schema(value_type = Object)]
    pub configuration: serde_json::Value,
    #[serde(default)]
    pub reason: Option<String>,
    /// Validate and diff only; nothing is stored or versioned
    #[serde(default)]
    pub test_mode: bool,
    /// Version the caller read; the update is refused if it is no longer current
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "1.0.4")]
    pub expected_version: Option<ConfigVersion>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UpdateConfigResponse {
    pub test_mode: bool,
    /// Set in test mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<TestModeEvaluation>,
    /// Set when the update was applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<AppliedConfiguration>,
}

/// Update the configuration
///
/// Merges the partial configuration into the current one and validates
/// threshold ordering and weight partitions. In test mode the resulting
/// configuration and diff are returned without being stored. Otherwise the
/// update is applied as a new patch version with a change record.
#[utoipa::path(
    post,
    path = "/v1/config",
    params(("x-actor-id" = String, Header, description = "Administrator making the change")),
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Evaluated or applied", body = UpdateConfigResponse),
        (status = 400, description = "Malformed or empty partial", body = ApiError),
        (status = 409, description = "expected_version is stale", body = ApiError),
        (status = 422, description = "Configuration rules violated", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "configuration"
)]
pub async fn update_config(
    State(state): State<AppState>,
    Actor(actor): Actor,
    AppJson(req): AppJson<UpdateConfigRequest>,
) -> Result<Json<UpdateConfigResponse>, AppError> {
    let reason = req
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    if reason
        .as_ref()
        .is_some_and(|r| r.chars().count() > MAX_REASON_LENGTH)
    {
        return Err(AppError::Validation {
            message: format!("reason must be at most {MAX_REASON_LENGTH} characters"),
            field: Some("reason".to_string()),
            received: None,
            docs_hint: None,
        });
    }

    if req.test_mode {
        let stored = db::config::load_snapshot(&state.db).await?;
        let evaluation = evaluate_test_mode(&stored.snapshot, &req.configuration)?;
        tracing::debug!(
            actor = %actor,
            fields = evaluation.changes.len(),
            critical = evaluation.critical_changes,
            "configuration evaluated in test mode"
        );
        return Ok(Json(UpdateConfigResponse {
            test_mode: true,
            evaluation: Some(evaluation),
            applied: None,
        }));
    }

    let applied = db::config::apply_configuration(
        &state.db,
        ApplyRequest {
            partial: &req.configuration,
            expected_version: req.expected_version,
            actor: &actor,
            reason,
            now: Utc::now(),
        },
    )
    .await?;

    Ok(Json(UpdateConfigResponse {
        test_mode: false,
        evaluation: None,
        applied: Some(applied),
    }))
}

/// Configuration change history
///
/// Newest first. Stats cover every change matching the filters, not just
/// the returned page.
#[utoipa::path(
    get,
    path = "/v1/config/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "History page", body = HistoryPage),
        (status = 400, description = "Invalid filters", body = ApiError)
    ),
    tag = "configuration"
)]
pub async fn get_config_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, AppError> {
    query.validate()?;
    let changes = db::config::list_changes(&state.db, &query).await?;
    Ok(Json(query_history(&changes, &query, Utc::now())))
}
