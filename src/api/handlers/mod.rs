//! REST API handlers organized by domain.

pub mod health;
pub mod identity;
pub mod oauth;
pub mod user;

pub use health::*;
pub use identity::*;
pub use user::*;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::api::{ApiError, ErrorCode};
use crate::auth::{request_language, AuthError};
use crate::server::AppState;

/// Localized error response for `err`
pub(crate) fn fail(state: &AppState, err: &AuthError, lang: &str) -> Response {
    ApiError::from_auth(err, state.catalog.as_ref(), lang).into_response()
}

/// Fallback for unknown routes
pub async fn not_found(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let lang = request_language(&headers);
    ApiError::new(
        ErrorCode::ResourceNotFound,
        state.catalog.message("not_found", lang),
    )
    .into_response()
}
