//! REST routes for keygate.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, oauth};
use crate::auth::{api_key_middleware, role_gate_middleware, try_identity_middleware, RoleGate};
use crate::domain::Role;
use crate::server::AppState;

/// Build the full router.
///
/// Session routes sit behind a role gate per minimum role; `/v1` routes
/// behind the API key gate. Expects the session layer to be applied on top.
pub fn router(state: AppState) -> Router {
    let optional = Router::new()
        .route("/api/user/session", get(handlers::session_status))
        .route_layer(from_fn_with_state(state.clone(), try_identity_middleware));

    let common = Router::new()
        .route("/api/user/self", get(handlers::get_self))
        .route("/api/user/token", get(handlers::issue_token))
        .route_layer(from_fn_with_state(
            RoleGate::new(state.clone(), Role::Common),
            role_gate_middleware,
        ));

    let admin = Router::new()
        .route("/api/user/manage", post(handlers::manage))
        .route_layer(from_fn_with_state(
            RoleGate::new(state.clone(), Role::Admin),
            role_gate_middleware,
        ));

    let machine = Router::new()
        .route("/v1/identity", get(handlers::get_identity))
        .route_layer(from_fn_with_state(state.clone(), api_key_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/oauth/state", get(oauth::issue_state))
        .route("/api/oauth/:provider", get(oauth::callback))
        .route("/api/user/login", post(handlers::login))
        .route("/api/user/logout", get(handlers::logout))
        .merge(optional)
        .merge(common)
        .merge(admin)
        .merge(machine)
        .fallback(handlers::not_found)
        .with_state(state)
}
