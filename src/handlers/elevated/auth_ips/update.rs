// handlers/elevated/auth_ips/update.rs - PUT /api/auth-ips/:id

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};

use super::GrantRequest;
use crate::app::AppState;
use crate::database::models::{AccessGrant, GrantEdit};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/**
 * PUT /api/auth-ips/:id - Edit one grant
 *
 * Every field is optional. `limite_consultas` is added to both counters
 * rather than replacing them. Returns 404 when the id does not exist.
 */
pub async fn update_put(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Result<Json<GrantRequest>, JsonRejection>,
) -> ApiResult<AccessGrant> {
    let Json(request) = body?;

    let edit = GrantEdit {
        ip: request.ip(),
        description: request.description(),
        expires_at: request.expires_at()?,
        amount: request.amount()?.unwrap_or(0),
    };

    match state.grants.update(id, edit).await? {
        Some(grant) => {
            tracing::info!("Updated grant {} for {}", grant.id, grant.ip);
            Ok(ApiResponse::success(grant))
        }
        None => Err(ApiError::not_found(format!("Grant {} not found", id))),
    }
}
