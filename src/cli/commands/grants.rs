use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::cli::{connect, utils, OutputFormat};
use crate::config::AppConfig;
use crate::database::models::{GrantChange, GrantTopUp};
use crate::database::{DatabaseManager, GrantStore, PgGrantStore};
use crate::services::QuotaLedger;
use crate::types::parse_expiry;

#[derive(Subcommand)]
pub enum GrantCommands {
    #[command(about = "List every grant, newest first")]
    List,

    #[command(about = "Grant queries to an IP (adds to an existing grant)")]
    Add {
        #[arg(help = "Caller IP address")]
        ip: String,
        #[arg(long, help = "Number of queries to add")]
        limit: u32,
        #[arg(long, help = "Expiry, YYYY-MM-DD (end of day UTC) or RFC 3339")]
        expires: String,
        #[arg(long, help = "Free-text description")]
        description: Option<String>,
    },

    #[command(about = "Delete a grant by id")]
    Remove {
        #[arg(help = "Grant id")]
        id: i64,
    },
}

pub async fn handle(cmd: GrantCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let store = PgGrantStore::new(pool.clone());

    let result = match cmd {
        GrantCommands::List => {
            let grants = store.list().await?;
            utils::output_grants(output_format, &grants)
        }
        GrantCommands::Add {
            ip,
            limit,
            expires,
            description,
        } => {
            let expires_at = parse_expiry(&expires).with_context(|| format!("invalid expiry '{}'", expires))?;
            let change = store
                .top_up(
                    GrantTopUp {
                        ip: ip.clone(),
                        description,
                        expires_at,
                        amount: i64::from(limit),
                    },
                    Utc::now(),
                )
                .await?;
            let message = match change {
                GrantChange::Created(id) => format!("Created grant {} for {}", id, ip),
                GrantChange::ToppedUp(id) => format!("Added {} queries to grant {} for {}", limit, id, ip),
            };
            utils::output_success(output_format, &message, Some(json!({ "id": change.id() })))
        }
        GrantCommands::Remove { id } => {
            if !store.delete(id).await? {
                anyhow::bail!("grant {} not found", id);
            }
            utils::output_success(output_format, &format!("Deleted grant {}", id), Some(json!({ "id": id })))
        }
    };

    DatabaseManager::close(pool).await;
    result
}

pub async fn limit(config: &AppConfig, ip: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let ledger = QuotaLedger::new(std::sync::Arc::new(PgGrantStore::new(pool.clone())));
    let remaining = ledger.remaining(ip, Utc::now()).await?;
    DatabaseManager::close(pool).await;

    utils::output_success(
        output_format,
        &format!("{} has {} queries left", ip, remaining),
        Some(json!({ "ip": ip, "limite": remaining })),
    )
}
