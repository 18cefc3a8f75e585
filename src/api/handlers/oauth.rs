//! External identity handlers: nonce issue and provider callback.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tower_sessions::Session;
use tracing::info;

use super::fail;
use crate::api::{ApiError, ApiResponse, CallbackQuery, ErrorCode};
use crate::auth::oauth::LinkOutcome;
use crate::auth::{request_language, AuthSession};
use crate::domain::Provider;
use crate::metrics;
use crate::server::AppState;

/// GET /api/oauth/state
pub async fn issue_state(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Response {
    match state.linker.issue_state(&AuthSession::new(session)).await {
        Ok(nonce) => Json(ApiResponse::ok(nonce)).into_response(),
        Err(e) => fail(&state, &e, request_language(&headers)),
    }
}

/// GET /api/oauth/:provider?code=..&state=..
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    session: Session,
    headers: HeaderMap,
) -> Response {
    let lang = request_language(&headers);

    let Some(provider) = Provider::from_label(&provider) else {
        return ApiError::new(
            ErrorCode::ResourceNotFound,
            state.catalog.message("not_found", lang),
        )
        .into_response();
    };

    let result = state
        .linker
        .handle_callback(
            &AuthSession::new(session),
            provider,
            &query.code,
            &query.state,
        )
        .await;

    match result {
        Ok(LinkOutcome::LoggedIn { account, provisioned }) => {
            state.metrics.inc_counter(metrics::OAUTH_LOGIN).await;
            if provisioned {
                state.metrics.inc_counter(metrics::OAUTH_PROVISIONED).await;
            }
            info!(%provider, account = %account.id, provisioned, "External login");
            Json(ApiResponse::ok(account)).into_response()
        }
        Ok(LinkOutcome::Bound { account }) => {
            state.metrics.inc_counter(metrics::OAUTH_BIND).await;
            info!(%provider, account = %account.id, "External identity bound");
            Json(ApiResponse::ok(account).with_message("bound")).into_response()
        }
        Err(e) => {
            state.metrics.inc_counter(metrics::OAUTH_FAILURE).await;
            fail(&state, &e, lang)
        }
    }
}
