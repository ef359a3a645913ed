use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One authorized caller IP with its consumable monthly query allowance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AccessGrant {
    pub id: i64,
    pub ip: String,
    #[serde(rename = "descricao")]
    #[sqlx(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "data_adicao")]
    #[sqlx(rename = "data_adicao")]
    pub granted_at: DateTime<Utc>,
    #[serde(rename = "data_vencimento")]
    #[sqlx(rename = "data_vencimento")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "limite_consultas")]
    #[sqlx(rename = "limite_consultas")]
    pub monthly_limit: i64,
    #[serde(rename = "total_carregado")]
    #[sqlx(rename = "total_carregado")]
    pub total_loaded: i64,
}

impl AccessGrant {
    /// A grant is usable up to and including its expiry instant.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }

    pub fn has_balance(&self) -> bool {
        self.monthly_limit > 0
    }
}

/// Additive grant for an IP: creates the row or tops up the existing one
#[derive(Debug, Clone)]
pub struct GrantTopUp {
    pub ip: String,
    pub description: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub amount: i64,
}

/// Edit of an existing grant row. `amount` is added to both counters.
#[derive(Debug, Clone, Default)]
pub struct GrantEdit {
    pub ip: Option<String>,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub amount: i64,
}

/// What a top-up did to the grant table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantChange {
    Created(i64),
    ToppedUp(i64),
}

impl GrantChange {
    pub fn id(&self) -> i64 {
        match self {
            GrantChange::Created(id) | GrantChange::ToppedUp(id) => *id,
        }
    }
}

/// A unit of quota taken from a specific grant row, returnable if the
/// guarded write fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub grant_id: i64,
}
