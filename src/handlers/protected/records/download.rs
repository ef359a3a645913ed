// handlers/protected/records/download.rs - GET /api/download?nome_arquivo=

use axum::extract::{Query, State};

use super::FileQuery;
use crate::app::AppState;
use crate::database::models::BenefitRecord;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/download - Every record imported from one file, oldest first
pub async fn download_get(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Vec<BenefitRecord>> {
    let file_name = query.file_name()?;
    let records = state.records.list_by_file(file_name).await?;
    Ok(ApiResponse::success(records))
}
