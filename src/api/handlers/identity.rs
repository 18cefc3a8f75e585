use axum::extract::Extension;
use axum::Json;

use crate::api::ApiResponse;
use crate::auth::IdentityContext;

/// GET /v1/identity
pub async fn get_identity(
    Extension(identity): Extension<IdentityContext>,
) -> Json<ApiResponse<IdentityContext>> {
    Json(ApiResponse::ok(identity))
}
