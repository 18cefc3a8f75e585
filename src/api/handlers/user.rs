//! Account handlers: password login, logout, session status, and the
//! handlers behind the role gate.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tower_sessions::Session;
use tracing::info;

use super::fail;
use crate::api::{
    ApiError, ApiResponse, ErrorCode, LoginRequest, LoginUser, ManageRequest, ManageResponse,
    SelfResponse, SessionStatus,
};
use crate::auth::{request_language, AuthError, AuthSession, IdentityContext, OptionalAccount};
use crate::metrics;
use crate::server::AppState;

fn invalid_body(state: &AppState, rejection: &JsonRejection, lang: &str) -> Response {
    ApiError::new(
        ErrorCode::InvalidRequestBody,
        state.catalog.message("invalid_request_body", lang),
    )
    .with_details(serde_json::json!({ "reason": rejection.body_text() }))
    .into_response()
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let lang = request_language(&headers);

    if !state.password_login.enabled() {
        return fail(&state, &AuthError::PasswordLoginDisabled, lang);
    }

    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body(&state, &rejection, lang),
    };

    match state
        .password_login
        .login(&AuthSession::new(session), &request.username, &request.password)
        .await
    {
        Ok(account) => {
            state.metrics.inc_counter(metrics::PASSWORD_LOGIN).await;
            Json(ApiResponse::ok(LoginUser::from(&account))).into_response()
        }
        Err(e) => {
            state.metrics.inc_counter(metrics::PASSWORD_LOGIN_FAILURE).await;
            fail(&state, &e, lang)
        }
    }
}

/// GET /api/user/logout
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Response {
    match AuthSession::new(session).clear().await {
        Ok(()) => Json(ApiResponse::ok(())).into_response(),
        Err(e) => fail(&state, &AuthError::from(e), request_language(&headers)),
    }
}

/// GET /api/user/session
pub async fn session_status(
    Extension(OptionalAccount(account_id)): Extension<OptionalAccount>,
) -> Json<ApiResponse<SessionStatus>> {
    Json(ApiResponse::ok(SessionStatus {
        logged_in: account_id.is_some(),
        account_id,
    }))
}

/// GET /api/user/self
pub async fn get_self(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    headers: HeaderMap,
) -> Response {
    match state
        .manager
        .view_account(&identity, identity.account_id)
        .await
    {
        Ok(account) => Json(ApiResponse::ok(SelfResponse { identity, account })).into_response(),
        Err(e) => fail(&state, &e, request_language(&headers)),
    }
}

/// GET /api/user/token
pub async fn issue_token(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    headers: HeaderMap,
) -> Response {
    match state.manager.issue_access_token(identity.account_id).await {
        Ok(token) => {
            info!(account = %identity.account_id, "Access token issued");
            Json(ApiResponse::ok(token)).into_response()
        }
        Err(e) => fail(&state, &e, request_language(&headers)),
    }
}

/// POST /api/user/manage
pub async fn manage(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    headers: HeaderMap,
    payload: Result<Json<ManageRequest>, JsonRejection>,
) -> Response {
    let lang = request_language(&headers);

    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body(&state, &rejection, lang),
    };

    if request.username.trim().is_empty() {
        return fail(&state, &AuthError::InvalidParams("username".to_string()), lang);
    }

    match state
        .manager
        .manage(&identity, &request.username, request.action)
        .await
    {
        Ok(account) => {
            info!(
                actor = %identity.account_id,
                target = %account.id,
                action = %request.action,
                "Account managed"
            );
            Json(ApiResponse::ok(ManageResponse {
                action: request.action,
                account,
            }))
            .into_response()
        }
        Err(e) => fail(&state, &e, lang),
    }
}
