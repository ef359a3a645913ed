// handlers/protected/records/insert.rs - POST /api/insert handler

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    response::Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::app::AppState;
use crate::config::QuotaMode;
use crate::database::models::RecordPayload;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CallerIp};
use crate::types::WriteOutcome;

#[derive(Debug, Serialize)]
pub struct InsertResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub outcome: WriteOutcome,
}

/**
 * POST /api/insert - Write one benefit record under the configured policy
 *
 * Expected Input: a record object keyed by column name. `numero_documento`
 * and `numero_beneficio` are required; `id` is required for `upsert_by_id`.
 * `ip_origem` defaults to the caller IP and `data_hora_registro` to now.
 *
 * Expected Output:
 * ```json
 * {
 *   "success": true,
 *   "data": { "message": "Record inserted", "outcome": "inserted", "id": "..." }
 * }
 * ```
 *
 * Quota: in `pre_write` mode one unit is reserved before the write and given
 * back if the write fails. In `post_write` mode the guard only checks the
 * balance and one unit is consumed after a successful write.
 */
pub async fn insert_post(
    State(state): State<AppState>,
    Extension(CallerIp(ip)): Extension<CallerIp>,
    body: Result<Json<RecordPayload>, JsonRejection>,
) -> ApiResult<InsertResponse> {
    let Json(payload) = body?;
    let writer = state.writer();
    let ledger = state.ledger();
    let now = Utc::now();

    // Invalid bodies are rejected before any quota or storage access
    let prepared = writer.prepare(payload)?;

    let outcome = match state.config.quota.mode {
        QuotaMode::PreWrite => {
            let reservation = ledger
                .check_and_reserve(&ip, now)
                .await?
                .ok_or_else(|| ApiError::quota_exceeded("Query limit reached for this IP"))?;

            match writer.apply(prepared, &ip, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    if let Err(release_err) = ledger.release(reservation).await {
                        tracing::error!("Failed to release quota for {}: {}", ip, release_err);
                    }
                    return Err(e.into());
                }
            }
        }
        QuotaMode::PostWrite => {
            let outcome = writer.apply(prepared, &ip, now).await?;
            // The write stands even if the decrement does not happen
            match ledger.consume(&ip, now).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!("Record {} written for {} with no balance left", outcome.id(), ip),
                Err(e) => tracing::error!("Failed to decrement quota for {}: {}", ip, e),
            }
            outcome
        }
    };

    tracing::info!("{} for {} ({})", outcome.message(), ip, outcome.id());

    Ok(ApiResponse::success(InsertResponse {
        message: outcome.message(),
        outcome,
    }))
}
