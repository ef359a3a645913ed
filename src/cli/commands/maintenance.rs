use chrono::Utc;
use serde_json::json;

use crate::cli::{connect, utils::output_success, OutputFormat};
use crate::config::AppConfig;
use crate::database::{DatabaseManager, PgRecordStore};
use crate::services::retention;

pub async fn migrate(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    DatabaseManager::migrate(&pool).await?;
    DatabaseManager::close(pool).await;

    output_success(output_format, "Schema applied", None)
}

pub async fn sweep(config: &AppConfig, days: Option<i64>, output_format: OutputFormat) -> anyhow::Result<()> {
    let days = days.unwrap_or(config.retention.days);
    retention::cutoff(days, Utc::now())?;

    let pool = connect(config).await?;
    let store = PgRecordStore::new(pool.clone());
    let deleted = retention::sweep(&store, days, Utc::now()).await?;
    DatabaseManager::close(pool).await;

    output_success(
        output_format,
        &format!("Deleted {} records older than {} days", deleted, days),
        Some(json!({ "deleted": deleted, "days": days })),
    )
}
