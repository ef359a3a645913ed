// handlers/protected/records/delete.rs - DELETE /api/delete?nome_arquivo=

use axum::extract::{Extension, Query, State};
use serde::Serialize;

use super::FileQuery;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, CallerIp};

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub nome_arquivo: String,
    pub deleted: u64,
}

/**
 * DELETE /api/delete - Remove every record imported from one file
 *
 * Query: `nome_arquivo` (required, 400 without touching storage when blank)
 */
pub async fn delete_by_file(
    State(state): State<AppState>,
    Extension(CallerIp(ip)): Extension<CallerIp>,
    Query(query): Query<FileQuery>,
) -> ApiResult<DeleteResponse> {
    let file_name = query.file_name()?;
    let deleted = state.records.delete_by_file(file_name).await?;

    tracing::info!("{} deleted {} records from file {}", ip, deleted, file_name);

    Ok(ApiResponse::success(DeleteResponse {
        nome_arquivo: file_name.to_string(),
        deleted,
    }))
}
