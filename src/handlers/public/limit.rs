// handlers/public/limit.rs - GET /api/limit remaining quota for the caller

use axum::extract::{Extension, State};
use chrono::Utc;
use serde::Serialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, CallerIp};

#[derive(Debug, Serialize)]
pub struct LimitResponse {
    pub ip: String,
    /// Sum across unexpired grants, 0 when the IP has none
    pub limite: i64,
}

/// GET /api/limit - Remaining allowance for the calling IP
pub async fn limit_get(
    State(state): State<AppState>,
    Extension(CallerIp(ip)): Extension<CallerIp>,
) -> ApiResult<LimitResponse> {
    let limite = state.ledger().remaining(&ip, Utc::now()).await?;
    Ok(ApiResponse::success(LimitResponse { ip, limite }))
}
