use std::sync::Arc;

use governor::DefaultDirectRateLimiter;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Budget for threshold changes made through reviews
    pub threshold_limiter: Arc<DefaultDirectRateLimiter>,
}
