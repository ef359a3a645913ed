// handlers/elevated/auth_ips/create.rs - POST /api/auth-ips

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use chrono::Utc;
use serde::Serialize;

use super::GrantRequest;
use crate::app::AppState;
use crate::database::models::{GrantChange, GrantTopUp};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct GrantChangeResponse {
    pub message: &'static str,
    pub id: i64,
    pub created: bool,
}

/**
 * POST /api/auth-ips - Grant queries to an IP
 *
 * Expected Input:
 * ```json
 * { "ip": "10.0.0.1", "descricao": "cliente", "data_vencimento": "2025-12-31", "limite_consultas": 100 }
 * ```
 *
 * The first grant for an IP creates its row. Later grants add
 * `limite_consultas` to both the remaining allowance and `total_carregado`,
 * and replace the expiry (and description when given).
 */
pub async fn create_post(
    State(state): State<AppState>,
    body: Result<Json<GrantRequest>, JsonRejection>,
) -> ApiResult<GrantChangeResponse> {
    let Json(request) = body?;

    let ip = request.ip();
    let expires_at = request.expires_at()?;
    let amount = request.amount()?;
    let (ip, expires_at, amount) = match (ip, expires_at, amount) {
        (Some(ip), Some(expires_at), Some(amount)) => (ip, expires_at, amount),
        (ip, expires_at, amount) => {
            let missing = [
                ip.is_none().then_some("ip"),
                expires_at.is_none().then_some("data_vencimento"),
                amount.is_none().then_some("limite_consultas"),
            ];
            return Err(ApiError::missing_fields(missing.into_iter().flatten()));
        }
    };

    let change = state
        .grants
        .top_up(
            GrantTopUp {
                ip: ip.clone(),
                description: request.description(),
                expires_at,
                amount,
            },
            Utc::now(),
        )
        .await?;

    tracing::info!("Granted {} queries to {} ({:?})", amount, ip, change);

    Ok(match change {
        GrantChange::Created(id) => ApiResponse::created(GrantChangeResponse {
            message: "Grant created",
            id,
            created: true,
        }),
        GrantChange::ToppedUp(id) => ApiResponse::success(GrantChangeResponse {
            message: "Grant updated and limit added",
            id,
            created: false,
        }),
    })
}
