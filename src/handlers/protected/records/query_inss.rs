// handlers/protected/records/query_inss.rs - POST /api/query-inss provider passthrough

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::database::models::NaturalKey;
use crate::error::ApiError;
use crate::types::lenient_string;

#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default, alias = "identity", deserialize_with = "lenient_string")]
    pub numero_documento: Option<String>,
    #[serde(default, alias = "benefitNumber", deserialize_with = "lenient_string")]
    pub numero_beneficio: Option<String>,
}

impl QueryRequest {
    fn natural_key(&self) -> Result<NaturalKey, ApiError> {
        let document = non_blank(&self.numero_documento);
        let benefit = non_blank(&self.numero_beneficio);
        match (document, benefit) {
            (Some(document_number), Some(benefit_number)) => Ok(NaturalKey {
                document_number,
                benefit_number,
            }),
            (document, benefit) => {
                let missing = [
                    document.is_none().then_some("numero_documento"),
                    benefit.is_none().then_some("numero_beneficio"),
                ];
                Err(ApiError::missing_fields(missing.into_iter().flatten()))
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/**
 * POST /api/query-inss - Ask the benefit provider directly
 *
 * Body: `{"numero_documento": "...", "numero_beneficio": "..."}`
 * (`identity` / `benefitNumber` accepted as aliases).
 *
 * The provider's JSON object is returned unchanged. Nothing is stored and no
 * quota is consumed.
 */
pub async fn query_inss_post(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let key = request.natural_key()?;
    let response = state.provider.query(&key).await?;
    Ok(Json(response))
}
