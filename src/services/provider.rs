use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::database::models::{BenefitDetails, BenefitRecord, NaturalKey, Provenance};

/// Longest slice of an error body kept in [`ProviderError::Status`]
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Benefit provider API key is not configured")]
    NotConfigured,

    #[error("Benefit provider timed out after {0}s")]
    Timeout(u64),

    #[error("Benefit provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Benefit provider request failed: {0}")]
    Transport(String),

    #[error("Benefit provider returned a malformed body: {0}")]
    Malformed(String),
}

/// Third-party benefit-inquiry service
#[async_trait]
pub trait BenefitProvider: Send + Sync {
    /// Look up one benefit and return the provider's JSON object untouched
    async fn query(&self, key: &NaturalKey) -> Result<Value, ProviderError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InquiryRequest<'a> {
    identity: &'a str,
    benefit_number: &'a str,
    last_days: u32,
    attempts: u32,
}

/// [`BenefitProvider`] over HTTP with a bounded per-request timeout
pub struct HttpBenefitProvider {
    client: reqwest::Client,
    url: Url,
    api_key: Option<String>,
    timeout_secs: u64,
    attempts: u32,
    last_days: u32,
}

impl HttpBenefitProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
            attempts: config.attempts,
            last_days: config.last_days,
        })
    }

    fn classify(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout_secs)
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl BenefitProvider for HttpBenefitProvider {
    async fn query(&self, key: &NaturalKey) -> Result<Value, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::NotConfigured)?;
        let body = InquiryRequest {
            identity: &key.document_number,
            benefit_number: &key.benefit_number,
            last_days: self.last_days,
            attempts: self.attempts,
        };

        tracing::debug!(
            "Querying benefit provider for {}/{}",
            key.document_number,
            key.benefit_number
        );

        let response = self
            .client
            .post(self.url.clone())
            .header("apiKey", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let value: Value = response.json().await.map_err(|e| self.classify(e))?;
        if !value.is_object() {
            return Err(ProviderError::Malformed("expected a JSON object".to_string()));
        }
        Ok(value)
    }
}

/// Build a storable record from a provider response.
///
/// The provider's own document/benefit numbers win when present; otherwise the
/// requested key is used. A provider `id` becomes the row id.
pub fn record_from_provider(
    value: &Value,
    requested: &NaturalKey,
    provenance: Provenance,
) -> Result<BenefitRecord, ProviderError> {
    if !value.is_object() {
        return Err(ProviderError::Malformed("expected a JSON object".to_string()));
    }

    let key = NaturalKey {
        document_number: text(value, "documentNumber").unwrap_or_else(|| requested.document_number.clone()),
        benefit_number: text(value, "benefitNumber").unwrap_or_else(|| requested.benefit_number.clone()),
    };
    let bank = value.get("disbursementBankAccount").filter(|v| v.is_object());

    let details = BenefitDetails {
        name: text(value, "name"),
        state: text(value, "state"),
        alimony: text(value, "alimony"),
        birth_date: text(value, "birthDate"),
        block_type: text(value, "blockType"),
        grant_date: text(value, "grantDate"),
        credit_type: text(value, "creditType"),
        benefit_card_limit: money(value, "benefitCardLimit")?,
        benefit_card_balance: money(value, "benefitCardBalance")?,
        benefit_status: text(value, "benefitStatus"),
        benefit_end_date: text(value, "benefitEndDate"),
        consigned_card_limit: money(value, "consignedCardLimit")?,
        consigned_card_balance: money(value, "consignedCardBalance")?,
        consigned_credit_balance: money(value, "consignedCreditBalance")?,
        max_total_balance: money(value, "maxTotalBalance")?,
        used_total_balance: money(value, "usedTotalBalance")?,
        available_total_balance: money(value, "availableTotalBalance")?,
        query_date: text(value, "queryDate"),
        query_return_date: text(value, "queryReturnDate"),
        query_return_time: text(value, "queryReturnTime"),
        legal_representative_name: text(value, "legalRepresentativeName"),
        disbursement_bank: bank.and_then(|b| text(b, "bank")),
        disbursement_branch: bank.and_then(|b| text(b, "branch")),
        disbursement_account: bank.and_then(|b| text(b, "number")),
        disbursement_digit: bank.and_then(|b| text(b, "digit")),
        portability_count: integer(value, "numberOfPortabilities")?,
    };

    let id = text(value, "id").unwrap_or_else(|| Uuid::new_v4().to_string());
    Ok(BenefitRecord::new(id, key, details, provenance))
}

fn text(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn money(value: &Value, field: &str) -> Result<Option<Decimal>, ProviderError> {
    let raw = match value.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => {
            return Err(ProviderError::Malformed(format!("{} is not a number: {}", field, other)));
        }
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|_| ProviderError::Malformed(format!("{} is not a decimal: {}", field, raw)))
}

fn integer(value: &Value, field: &str) -> Result<Option<i32>, ProviderError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| ProviderError::Malformed(format!("{} is not an integer: {}", field, n))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ProviderError::Malformed(format!("{} is not an integer: {}", field, s))),
        Some(other) => Err(ProviderError::Malformed(format!("{} is not an integer: {}", field, other))),
    }
}
