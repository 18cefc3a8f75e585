//! Authentication middleware for Axum
//!
//! Three gates:
//!
//! - [`role_gate_middleware`]: session or access token, with a minimum role
//! - [`try_identity_middleware`]: session if present, never refuses
//! - [`api_key_middleware`]: structured API key for machine clients
//!
//! The strict gates insert an [`IdentityContext`] into request extensions;
//! the permissive one inserts an [`OptionalAccount`].

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header::{ACCEPT_LANGUAGE, AUTHORIZATION},
        HeaderMap,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::debug;

use super::session::AuthSession;
use super::{IdentityContext, ALTERNATE_KEY_HEADER};
use crate::api::ApiError;
use crate::domain::{AccountId, Role};
use crate::i18n::preferred_language;
use crate::metrics;
use crate::server::AppState;

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "keygate_session";

/// Language for messages in the response to `headers`
pub fn request_language(headers: &HeaderMap) -> &'static str {
    preferred_language(headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok()))
}

/// Gate state: shared app state plus the route's minimum role
#[derive(Clone)]
pub struct RoleGate {
    pub state: AppState,
    pub min_role: Role,
}

impl RoleGate {
    pub fn new(state: AppState, min_role: Role) -> Self {
        Self { state, min_role }
    }
}

/// Resolve session or access token and enforce the minimum role
pub async fn role_gate_middleware(
    State(gate): State<RoleGate>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let headers = request.headers().clone();
    let lang = request_language(&headers);
    let state = &gate.state;

    let bearer = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let result = state
        .resolver
        .resolve(&AuthSession::new(session), bearer, gate.min_role)
        .await;

    match result {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, path = %request.uri().path(), "Request refused by role gate");
            state.metrics.inc_counter(metrics::SESSION_FAILURE).await;
            ApiError::from_auth(&e, state.catalog.as_ref(), lang).into_response()
        }
    }
}

/// Account id of a logged-in caller, if there is one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalAccount(pub Option<AccountId>);

/// Note the session's account id when present; anonymous callers pass too
pub async fn try_identity_middleware(
    State(state): State<AppState>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let account = state.resolver.try_resolve(&AuthSession::new(session)).await;
    request.extensions_mut().insert(OptionalAccount(account));
    next.run(request).await
}

/// Authenticate a machine client by API key
pub async fn api_key_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let lang = request_language(request.headers());
    let headers = request.headers();
    let primary = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let alternate = headers
        .get(ALTERNATE_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.api_keys.authenticate(primary, alternate).await {
        Ok(context) => {
            state.metrics.inc_counter(metrics::API_KEY_SUCCESS).await;
            request.extensions_mut().insert::<IdentityContext>(context);
            next.run(request).await
        }
        Err(e) => {
            state.metrics.inc_counter(metrics::API_KEY_FAILURE).await;
            ApiError::from_auth(&e, state.catalog.as_ref(), lang).into_response()
        }
    }
}
