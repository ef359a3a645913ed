// handlers/elevated/auth_ips/mod.rs - Access grant administration

mod create;
mod delete;
mod list;
mod update;

pub use create::create_post;
pub use delete::delete_by_id;
pub use list::list_get;
pub use update::update_put;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::ApiError;
use crate::types::{lenient_i64, lenient_string, parse_expiry};

/// Body of `POST /api/auth-ips` and `PUT /api/auth-ips/:id`
#[derive(Debug, Default, Deserialize)]
pub struct GrantRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub ip: Option<String>,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub data_vencimento: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub limite_consultas: Option<i64>,
}

impl GrantRequest {
    fn ip(&self) -> Option<String> {
        self.ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    }

    fn description(&self) -> Option<String> {
        self.descricao.clone().filter(|d| !d.trim().is_empty())
    }

    /// Parsed expiry; `Ok(None)` when the field is absent or blank
    fn expires_at(&self) -> Result<Option<DateTime<Utc>>, ApiError> {
        match self.data_vencimento.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_expiry(raw)
                .map(Some)
                .ok_or_else(|| field_error("data_vencimento", format!("Invalid date '{}'", raw))),
        }
    }

    /// Units to add; absent means 0, negative is rejected
    fn amount(&self) -> Result<Option<i64>, ApiError> {
        match self.limite_consultas {
            Some(n) if n < 0 => Err(field_error("limite_consultas", "Must be zero or greater")),
            other => Ok(other),
        }
    }
}

fn field_error(field: &str, message: impl Into<String>) -> ApiError {
    let mut field_errors = HashMap::new();
    field_errors.insert(field.to_string(), message.into());
    ApiError::validation_error("Invalid field value", Some(field_errors))
}
