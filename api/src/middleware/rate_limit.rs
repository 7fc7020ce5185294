use std::num::NonZeroU32;
use std::sync::Arc;

use axum::http::{HeaderValue, Response, StatusCode};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use listing_trust_core::config::RateLimits;
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};

use crate::error::AppError;

type RateLimitLayer =
    GovernorLayer<SmartIpKeyExtractor, governor::middleware::NoOpMiddleware, axum::body::Body>;

const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_HOUR: u64 = 3_600_000;

/// Replenish interval in milliseconds for `count` requests per `window_ms`.
fn replenish_ms(window_ms: u64, count: u32) -> u64 {
    (window_ms / u64::from(count.max(1))).max(1)
}

/// Rate limit for POST /v1/businesses/{id}/verify, sized from
/// `rate_limits.verifications_per_minute` at startup.
pub fn verify_layer(limits: &RateLimits) -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_ms(MS_PER_MINUTE, limits.verifications_per_minute))
            .burst_size(limits.verifications_per_minute.max(1))
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for verify"),
    )
    .error_handler(json_error_handler)
}

/// Per-IP rate limit for POST /v1/config, sized from
/// `rate_limits.config_updates_per_hour`.
pub fn config_write_layer(limits: &RateLimits) -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_ms(MS_PER_HOUR, limits.config_updates_per_hour))
            .burst_size(limits.config_updates_per_hour.max(1))
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for config writes"),
    )
    .error_handler(json_error_handler)
}

/// Rate limit for read endpoints: 120 requests/minute per IP.
pub fn read_layer() -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_millisecond(500)
            .burst_size(30)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for reads"),
    )
    .error_handler(json_error_handler)
}

/// Service-wide budget for threshold changes made through reviews. The review
/// route itself is limited like a read; only reviews carrying a threshold
/// adjustment draw from this, at `rate_limits.config_updates_per_hour`.
pub fn threshold_limiter(limits: &RateLimits) -> Arc<DefaultDirectRateLimiter> {
    let per_hour = NonZeroU32::new(limits.config_updates_per_hour).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_hour(per_hour)))
}

pub fn check_threshold_budget(limiter: &DefaultDirectRateLimiter) -> Result<(), AppError> {
    limiter.check().map_err(|not_until| AppError::RateLimited {
        retry_after_secs: not_until
            .wait_time_from(DefaultClock::default().now())
            .as_secs()
            .max(1),
    })
}

/// Custom error handler that returns JSON in ApiError format with Retry-After header.
fn json_error_handler(err: GovernorError) -> Response<axum::body::Body> {
    let (status, retry_after, message) = match err {
        GovernorError::TooManyRequests { wait_time, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            Some(wait_time),
            format!("Too many requests. Retry after {wait_time} seconds."),
        ),
        GovernorError::UnableToExtractKey => (
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
            "Unable to determine client identity for rate limiting".to_string(),
        ),
        GovernorError::Other { code, msg, .. } => (code, None, msg.unwrap_or_default()),
    };

    let body = serde_json::json!({
        "error": listing_trust_core::error::codes::RATE_LIMITED,
        "message": message,
        "request_id": uuid::Uuid::now_v7().to_string(),
    });

    let mut response = Response::new(axum::body::Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Some(wait_time) = retry_after {
        response
            .headers_mut()
            .insert(axum::http::header::RETRY_AFTER, HeaderValue::from(wait_time));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replenish_interval_spreads_the_window() {
        assert_eq!(replenish_ms(MS_PER_MINUTE, 60), 1000);
        assert_eq!(replenish_ms(MS_PER_HOUR, 20), 180_000);
        assert_eq!(replenish_ms(MS_PER_MINUTE, 0), MS_PER_MINUTE);
    }

    #[test]
    fn threshold_budget_runs_out_within_the_hour() {
        let limiter = threshold_limiter(&RateLimits {
            config_updates_per_hour: 1,
            ..RateLimits::default()
        });
        assert!(check_threshold_budget(&limiter).is_ok());

        let err = check_threshold_budget(&limiter).unwrap_err();
        assert!(matches!(err, AppError::RateLimited { retry_after_secs } if retry_after_secs > 0));
        let response = axum::response::IntoResponse::into_response(err);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(axum::http::header::RETRY_AFTER));
    }

    #[test]
    fn rejection_body_is_json() {
        let response = json_error_handler(GovernorError::UnableToExtractKey);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "application/json"
        );
    }
}
