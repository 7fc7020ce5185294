use std::net::SocketAddr;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod db;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Listing Trust API",
        version = "0.1.0",
        description = "Trust evaluation and review workflow for business listing verification."
    ),
    paths(
        routes::health::health_check,
        routes::verify::verify_business,
        routes::review::review_business,
        routes::config::get_config,
        routes::config::update_config,
        routes::config::get_config_history,
        routes::feedback::feedback_summary,
    ),
    components(schemas(
        HealthResponse,
        listing_trust_core::error::ApiError,
        listing_trust_core::error::ConfigViolation,
        listing_trust_core::engine::VerifyOptions,
        listing_trust_core::engine::VerificationResult,
        listing_trust_core::decision::Decision,
        listing_trust_core::decision::DecisionRule,
        listing_trust_core::duplicates::DuplicateReport,
        listing_trust_core::duplicates::DuplicateCandidate,
        listing_trust_core::duplicates::DuplicateTier,
        listing_trust_core::review::ReviewRequest,
        listing_trust_core::review::ReviewOutcome,
        listing_trust_core::feedback::ReviewFeedback,
        listing_trust_core::feedback::FeedbackSummary,
        listing_trust_core::config::Configuration,
        listing_trust_core::config::ConfigSnapshot,
        listing_trust_core::config::FieldChange,
        listing_trust_core::config::ConfigurationChange,
        listing_trust_core::config::HistoryPage,
        listing_trust_core::config::TestModeEvaluation,
        listing_trust_core::config::AppliedConfiguration,
        routes::verify::VerifyResponse,
        routes::config::UpdateConfigRequest,
        routes::config::UpdateConfigResponse,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Active configuration version; absent when it could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_trust_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    db::config::ensure_seeded(&pool)
        .await
        .expect("Failed to seed configuration");

    // Rate limits are sized from the configuration active at startup.
    let limits = db::config::load_snapshot(&pool)
        .await
        .expect("Failed to load configuration")
        .snapshot
        .configuration
        .rate_limits;

    let app_state = state::AppState {
        db: pool,
        threshold_limiter: middleware::rate_limit::threshold_limiter(&limits),
    };
    let cors_layer = middleware::cors::build_cors_layer();

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::verify::router().layer(middleware::rate_limit::verify_layer(&limits)))
        .merge(routes::review::router().layer(middleware::rate_limit::read_layer()))
        .merge(routes::config::read_router().layer(middleware::rate_limit::read_layer()))
        .merge(
            routes::config::write_router()
                .layer(middleware::rate_limit::config_write_layer(&limits)),
        )
        .merge(routes::feedback::router().layer(middleware::rate_limit::read_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listing trust API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
