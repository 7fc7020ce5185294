//! Custom extractors that convert axum rejections to structured AppError responses.
//!
//! `AppJson<T>` replaces `axum::Json<T>` in handler signatures so body errors
//! come back as `validation_failed` JSON. `Actor` reads the acting
//! administrator from the `x-actor-id` header.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request, rejection::JsonRejection},
    http::request::Parts,
};

use crate::error::AppError;

pub const ACTOR_HEADER: &str = "x-actor-id";
const MAX_ACTOR_LENGTH: usize = 200;

/// JSON extractor that converts deserialization errors to structured `AppError` responses.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

/// Convert a `JsonRejection` to a structured `AppError::Validation`.
pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let body_text = rejection.body_text();
    let field_hint = extract_field_from_serde_message(&body_text);

    AppError::Validation {
        message: format!("Invalid request body: {body_text}"),
        field: Some(field_hint.unwrap_or("body".to_string())),
        received: None,
        docs_hint: Some(
            "Check the request body against the endpoint's schema (GET /api-doc/openapi.json)."
                .to_string(),
        ),
    }
}

/// Try to extract a field name from serde's error messages.
fn extract_field_from_serde_message(msg: &str) -> Option<String> {
    for pattern in ["missing field `", "unknown field `"] {
        if let Some(start) = msg.find(pattern) {
            let after = &msg[start + pattern.len()..];
            if let Some(end) = after.find('`') {
                return Some(after[..end].to_string());
            }
        }
    }
    None
}

/// Identifier of the administrator making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();
        parse_actor(value).map(Actor)
    }
}

fn parse_actor(value: &str) -> Result<String, AppError> {
    if value.is_empty() {
        return Err(AppError::Validation {
            message: format!("the {ACTOR_HEADER} header is required"),
            field: Some(ACTOR_HEADER.to_string()),
            received: None,
            docs_hint: Some("Send the reviewing administrator's id in x-actor-id.".to_string()),
        });
    }
    if value.chars().count() > MAX_ACTOR_LENGTH {
        return Err(AppError::Validation {
            message: format!("{ACTOR_HEADER} must be at most {MAX_ACTOR_LENGTH} characters"),
            field: Some(ACTOR_HEADER.to_string()),
            received: None,
            docs_hint: None,
        });
    }
    Ok(value.to_string())
}
