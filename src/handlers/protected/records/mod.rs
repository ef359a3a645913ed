// handlers/protected/records/mod.rs - Benefit record endpoints

mod delete;
mod download;
mod insert;
mod query_inss;

pub use delete::delete_by_file;
pub use download::download_get;
pub use insert::insert_post;
pub use query_inss::query_inss_post;

use serde::Deserialize;

use crate::error::ApiError;

/// `?nome_arquivo=` shared by delete and download
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    pub nome_arquivo: Option<String>,
}

impl FileQuery {
    /// Trimmed file name, or a validation error when missing or blank
    pub fn file_name(&self) -> Result<&str, ApiError> {
        self.nome_arquivo
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::missing_fields(["nome_arquivo"]))
    }
}
