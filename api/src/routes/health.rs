use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};

use crate::HealthResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check: the database is reachable and a configuration is active
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable or configuration missing", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let active_version =
        sqlx::query_scalar::<_, String>("SELECT version FROM configuration WHERE id = 1")
            .fetch_optional(&state.db)
            .await;
    if let Err(err) = &active_version {
        tracing::warn!(error = %err, "health check could not read configuration");
    }

    let (status, body) = health_report(active_version.ok().flatten());
    (status, Json(body))
}

fn health_report(config_version: Option<String>) -> (StatusCode, HealthResponse) {
    let status = if config_version.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        HealthResponse {
            status: if status == StatusCode::OK { "ok" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_version,
        },
    )
}
