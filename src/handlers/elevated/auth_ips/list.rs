// handlers/elevated/auth_ips/list.rs - GET /api/auth-ips

use axum::extract::State;

use crate::app::AppState;
use crate::database::models::AccessGrant;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/auth-ips - Every grant, newest first
pub async fn list_get(State(state): State<AppState>) -> ApiResult<Vec<AccessGrant>> {
    let grants = state.grants.list().await?;
    Ok(ApiResponse::success(grants))
}
