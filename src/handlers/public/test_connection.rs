// handlers/public/test_connection.rs - GET /test connectivity probe

use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/**
 * GET /test - Read one arbitrary record to prove the database answers
 *
 * Returns the record, or a message when the table is empty.
 * Any storage failure is reported as 503.
 */
pub async fn test_connection(State(state): State<AppState>) -> ApiResult<Value> {
    match state.records.sample().await {
        Ok(Some(record)) => Ok(ApiResponse::success(json!({
            "message": "Database connection OK",
            "record": record
        }))),
        Ok(None) => Ok(ApiResponse::success(json!({
            "message": "Database connection OK, no records found",
            "record": null
        }))),
        Err(e) => {
            tracing::error!("Connectivity check failed: {}", e);
            Err(ApiError::service_unavailable(e.to_string()))
        }
    }
}
