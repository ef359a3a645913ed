// handlers/elevated/auth_ips/delete.rs - DELETE /api/auth-ips/:id

use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// DELETE /api/auth-ips/:id - Remove one grant, 404 when it does not exist
pub async fn delete_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    if !state.grants.delete(id).await? {
        return Err(ApiError::not_found(format!("Grant {} not found", id)));
    }

    tracing::info!("Deleted grant {}", id);
    Ok(ApiResponse::success(json!({ "id": id, "message": "Grant deleted" })))
}
