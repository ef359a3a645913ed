use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use url::Url;

const DEFAULT_PROVIDER_URL: &str = "https://api.ajin.io/v3/query-inss-balances/finder/await";

/// Largest accepted retention window, in days
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub quota: QuotaConfig,
    pub records: RecordConfig,
    pub retention: RetentionConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// IPs allowed to manage access grants. Separate from the grant table.
    pub admin_ips: Vec<String>,
    /// Headers consulted, in order, before the peer address.
    pub client_ip_headers: Vec<String>,
    pub cors_origins: Vec<String>,
}

/// When the monthly quota is checked relative to the record write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaMode {
    /// Reserve one unit atomically before writing; give it back if the write fails.
    PreWrite,
    /// Check the balance, write, then decrement. Decrement failures are only logged.
    PostWrite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    pub mode: QuotaMode,
}

/// How `/api/insert` resolves an incoming record against stored rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    UpsertById,
    EnrichOrDuplicate,
    PlainUpsert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    pub policy: WritePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub days: i64,
    /// Six-field cron expression (seconds first), evaluated in UTC.
    pub cron: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: Url,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub attempts: u32,
    pub last_days: u32,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value '{value}' for {name}")]
pub struct ParseConfigError {
    name: &'static str,
    value: String,
}

impl FromStr for QuotaMode {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pre_write" | "pre" | "strict" => Ok(QuotaMode::PreWrite),
            "post_write" | "post" | "loose" => Ok(QuotaMode::PostWrite),
            _ => Err(ParseConfigError { name: "QUOTA_MODE", value: s.to_string() }),
        }
    }
}

impl FromStr for WritePolicy {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "upsert_by_id" => Ok(WritePolicy::UpsertById),
            "enrich_or_duplicate" => Ok(WritePolicy::EnrichOrDuplicate),
            "plain_upsert" => Ok(WritePolicy::PlainUpsert),
            _ => Err(ParseConfigError { name: "WRITE_POLICY", value: s.to_string() }),
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WritePolicy::UpsertById => "upsert_by_id",
            WritePolicy::EnrichOrDuplicate => "enrich_or_duplicate",
            WritePolicy::PlainUpsert => "plain_upsert",
        };
        f.write_str(name)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server
        if let Some(port) = env::var("INSS_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("ADMIN_IPS") {
            self.security.admin_ips = split_list(&v);
        }
        if let Ok(v) = env::var("CLIENT_IP_HEADERS") {
            self.security.client_ip_headers = split_list(&v)
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect();
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        // Quota and write policy
        if let Ok(v) = env::var("QUOTA_MODE") {
            match v.parse() {
                Ok(mode) => self.quota.mode = mode,
                Err(e) => tracing::warn!("{}, keeping {:?}", e, self.quota.mode),
            }
        }
        if let Ok(v) = env::var("WRITE_POLICY") {
            match v.parse() {
                Ok(policy) => self.records.policy = policy,
                Err(e) => tracing::warn!("{}, keeping {}", e, self.records.policy),
            }
        }

        // Retention
        if let Ok(v) = env::var("RETENTION_ENABLED") {
            self.retention.enabled = v.parse().unwrap_or(self.retention.enabled);
        }
        if let Ok(v) = env::var("RETENTION_DAYS") {
            match v.parse::<i64>() {
                Ok(days) if (1..=MAX_RETENTION_DAYS).contains(&days) => self.retention.days = days,
                _ => tracing::warn!("invalid RETENTION_DAYS '{}', keeping {}", v, self.retention.days),
            }
        }
        if let Ok(v) = env::var("RETENTION_CRON") {
            self.retention.cron = v;
        }

        // Provider
        if let Ok(v) = env::var("PROVIDER_URL") {
            match Url::parse(&v) {
                Ok(url) => self.provider.url = url,
                Err(e) => tracing::warn!("invalid PROVIDER_URL '{}': {}", v, e),
            }
        }
        if let Ok(v) = env::var("PROVIDER_API_KEY") {
            self.provider.api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Ok(v) = env::var("PROVIDER_TIMEOUT_SECS") {
            self.provider.timeout_secs = v.parse().unwrap_or(self.provider.timeout_secs);
        }
        if let Ok(v) = env::var("PROVIDER_ATTEMPTS") {
            self.provider.attempts = v.parse().unwrap_or(self.provider.attempts);
        }
        if let Ok(v) = env::var("PROVIDER_LAST_DAYS") {
            self.provider.last_days = v.parse().unwrap_or(self.provider.last_days);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 5000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                admin_ips: vec!["127.0.0.1".to_string()],
                client_ip_headers: default_ip_headers(),
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            quota: QuotaConfig { mode: QuotaMode::PreWrite },
            records: RecordConfig { policy: WritePolicy::EnrichOrDuplicate },
            retention: RetentionConfig {
                enabled: false,
                days: 30,
                cron: "0 0 0 * * *".to_string(),
            },
            provider: ProviderConfig::default(),
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 5000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                admin_ips: Vec::new(),
                client_ip_headers: proxy_ip_headers(),
                cors_origins: Vec::new(),
            },
            quota: QuotaConfig { mode: QuotaMode::PreWrite },
            records: RecordConfig { policy: WritePolicy::EnrichOrDuplicate },
            retention: RetentionConfig {
                enabled: true,
                days: 7,
                cron: "0 0 0 * * *".to_string(),
            },
            provider: ProviderConfig::default(),
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 5000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                admin_ips: Vec::new(),
                client_ip_headers: proxy_ip_headers(),
                cors_origins: Vec::new(),
            },
            quota: QuotaConfig { mode: QuotaMode::PreWrite },
            records: RecordConfig { policy: WritePolicy::EnrichOrDuplicate },
            retention: RetentionConfig {
                enabled: true,
                days: 30,
                cron: "0 0 0 * * *".to_string(),
            },
            provider: ProviderConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            // Constant literal, parse cannot fail
            url: Url::parse(DEFAULT_PROVIDER_URL).expect("default provider url"),
            api_key: None,
            timeout_secs: 120,
            attempts: 60,
            last_days: 0,
        }
    }
}

/// Development trusts `x-client-ip` so local callers can pick their IP.
/// Any client can set that header, so it also lets a caller claim an admin IP.
fn default_ip_headers() -> Vec<String> {
    vec!["x-client-ip".to_string(), "x-forwarded-for".to_string()]
}

/// Deployed presets only trust the header written by the fronting proxy
fn proxy_ip_headers() -> Vec<String> {
    vec!["x-forwarded-for".to_string()]
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
