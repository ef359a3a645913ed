use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use inss_api::config::AppConfig;
use inss_api::database::{DatabaseManager, PgGrantStore, PgRecordStore};
use inss_api::services::{retention, HttpBenefitProvider};
use inss_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, PROVIDER_API_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        "Starting INSS API in {:?} mode (quota {:?}, policy {})",
        config.environment,
        config.quota.mode,
        config.records.policy
    );

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("connecting to database")?;
    DatabaseManager::migrate(&pool).await.context("applying schema")?;

    let records = Arc::new(PgRecordStore::new(pool.clone()));
    let grants = Arc::new(PgGrantStore::new(pool.clone()));
    let provider = Arc::new(HttpBenefitProvider::new(&config.provider).context("building provider client")?);
    if config.provider.api_key.is_none() {
        tracing::warn!("PROVIDER_API_KEY is not set; provider lookups will fail");
    }

    // Kept alive for the lifetime of the server
    let _scheduler = retention::start_scheduler(records.clone(), &config.retention)
        .await
        .context("starting retention scheduler")?;

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let state = AppState::new(config, grants, records, provider);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("INSS API listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;

    DatabaseManager::close(pool).await;
    Ok(())
}
