pub mod commands;
pub mod utils;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::config::{AppConfig, MAX_RETENTION_DAYS};
use crate::database::DatabaseManager;

#[derive(Parser)]
#[command(name = "inss-admin")]
#[command(about = "INSS API administration: schema, retention and access grants")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create tables and indexes if they are missing")]
    Migrate,

    #[command(about = "Delete records older than the retention window, once")]
    Sweep {
        #[arg(
            long,
            help = "Window in days (defaults to RETENTION_DAYS)",
            value_parser = clap::value_parser!(i64).range(1..=MAX_RETENTION_DAYS)
        )]
        days: Option<i64>,
    },

    #[command(about = "Access grant management")]
    Grants {
        #[command(subcommand)]
        cmd: commands::grants::GrantCommands,
    },

    #[command(about = "Show the remaining quota for an IP")]
    Limit {
        #[arg(help = "Caller IP address")]
        ip: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Open a pool from the same environment the server reads
pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    DatabaseManager::connect(&config.database)
        .await
        .context("connecting to database")
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = AppConfig::from_env();

    match cli.command {
        Commands::Migrate => commands::maintenance::migrate(&config, output_format).await,
        Commands::Sweep { days } => commands::maintenance::sweep(&config, days, output_format).await,
        Commands::Grants { cmd } => commands::grants::handle(cmd, &config, output_format).await,
        Commands::Limit { ip } => commands::grants::limit(&config, &ip, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_days_are_bounded() {
        let parsed = Cli::try_parse_from(["inss-admin", "sweep", "--days", "7"]).unwrap();
        assert!(matches!(parsed.command, Commands::Sweep { days: Some(7) }));

        assert!(Cli::try_parse_from(["inss-admin", "sweep", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["inss-admin", "sweep", "--days", "1000000000"]).is_err());
    }
}
