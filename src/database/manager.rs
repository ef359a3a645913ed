use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Schema bootstrap, applied statement by statement
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS ip_data (
        id BIGSERIAL PRIMARY KEY,
        ip TEXT NOT NULL,
        descricao TEXT,
        data_adicao TIMESTAMPTZ NOT NULL DEFAULT now(),
        data_vencimento TIMESTAMPTZ NOT NULL,
        limite_consultas BIGINT NOT NULL DEFAULT 0 CHECK (limite_consultas >= 0),
        total_carregado BIGINT NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ip_data_ip_idx ON ip_data (ip, data_adicao DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS inss_higienizado (
        id TEXT PRIMARY KEY,
        numero_beneficio TEXT NOT NULL,
        numero_documento TEXT NOT NULL,
        nome TEXT,
        estado TEXT,
        pensao TEXT,
        data_nascimento TEXT,
        tipo_bloqueio TEXT,
        data_concessao TEXT,
        tipo_credito TEXT,
        limite_cartao_beneficio NUMERIC,
        saldo_cartao_beneficio NUMERIC,
        status_beneficio TEXT,
        data_fim_beneficio TEXT,
        limite_cartao_consignado NUMERIC,
        saldo_cartao_consignado NUMERIC,
        saldo_credito_consignado NUMERIC,
        saldo_total_maximo NUMERIC,
        saldo_total_utilizado NUMERIC,
        saldo_total_disponivel NUMERIC,
        data_consulta TEXT,
        data_retorno_consulta TEXT,
        tempo_retorno_consulta TEXT,
        nome_representante_legal TEXT,
        banco_desembolso TEXT,
        agencia_desembolso TEXT,
        numero_conta_desembolso TEXT,
        digito_conta_desembolso TEXT,
        numero_portabilidades INTEGER,
        ip_origem TEXT,
        data_hora_registro TIMESTAMPTZ NOT NULL DEFAULT now(),
        nome_arquivo TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS inss_higienizado_key_idx ON inss_higienizado (numero_documento, numero_beneficio)",
    "CREATE INDEX IF NOT EXISTS inss_higienizado_arquivo_idx ON inss_higienizado (nome_arquivo)",
    "CREATE INDEX IF NOT EXISTS inss_higienizado_registro_idx ON inss_higienizado (data_hora_registro)",
];

/// Builds and maintains the Postgres pool owned by the process entry point
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open a pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        Self::validate_url(url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected database pool (max {} connections)", config.max_connections);
        Ok(pool)
    }

    /// Create tables and indexes if they are missing
    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        info!("Database schema is up to date");
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(pool: PgPool) {
        pool.close().await;
        info!("Closed database pool");
    }

    fn validate_url(raw: &str) -> Result<(), DatabaseError> {
        let url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(()),
            _ => Err(DatabaseError::InvalidDatabaseUrl),
        }
    }
}
