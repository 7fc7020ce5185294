use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::extract::ACTOR_HEADER;

/// Build a CORS layer from the `LISTING_TRUST_CORS_ORIGINS` env var.
///
/// - Origins: comma-separated list (default: `http://localhost:3000`)
/// - Methods: GET, POST, OPTIONS
/// - Headers: Content-Type, x-actor-id
/// - Max age: 3600s
pub fn build_cors_layer() -> CorsLayer {
    let origins_str = std::env::var("LISTING_TRUST_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());
    cors_layer_for(&origins_str)
}

fn parse_origins(origins_str: &str) -> Vec<HeaderValue> {
    origins_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect()
}

fn cors_layer_for(origins_str: &str) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(parse_origins(origins_str))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static(ACTOR_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_entries_are_skipped() {
        let origins = parse_origins("https://admin.example.com, ,http://localhost:3000,");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "https://admin.example.com");
    }
}
