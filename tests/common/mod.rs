#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use inss_api::config::AppConfig;
use inss_api::database::models::{GrantTopUp, NaturalKey};
use inss_api::database::{GrantStore, MemoryStore};
use inss_api::services::{BenefitProvider, ProviderError};
use inss_api::{router, AppState};

pub const ADMIN_IP: &str = "127.0.0.1";

/// Provider double that answers with a fixed body or a fixed HTTP failure
pub struct StubProvider {
    response: Mutex<std::result::Result<Value, u16>>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            response: Mutex::new(Ok(sample_provider_response())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn respond_with(&self, value: Value) {
        *self.response.lock().unwrap() = Ok(value);
    }

    pub fn fail_with(&self, status: u16) {
        *self.response.lock().unwrap() = Err(status);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BenefitProvider for StubProvider {
    async fn query(&self, _key: &NaturalKey) -> std::result::Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.response.lock().unwrap().clone() {
            Ok(value) => Ok(value),
            Err(status) => Err(ProviderError::Status {
                status,
                body: "provider unavailable".to_string(),
            }),
        }
    }
}

pub fn sample_provider_response() -> Value {
    json!({
        "name": "MARIA DA SILVA",
        "state": "SP",
        "benefitStatus": "ATIVO",
        "benefitCardLimit": 1500.75,
        "maxTotalBalance": "3200.00",
        "availableTotalBalance": 980.1,
        "numberOfPortabilities": 1,
        "disbursementBankAccount": { "bank": "001", "branch": "1234", "number": "55667", "digit": "8" }
    })
}

/// Router wired to in-memory storage and a stub provider
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<StubProvider>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(StubProvider::new());
        let state = AppState::new(config, store.clone(), store.clone(), provider.clone());
        Self {
            store,
            provider,
            router: router(state),
        }
    }

    /// Grant `limit` queries to `ip`, expiring `days` from now (negative means already expired)
    pub async fn grant(&self, ip: &str, limit: i64, days: i64) -> Result<i64> {
        let now = Utc::now();
        let change = self
            .store
            .top_up(
                GrantTopUp {
                    ip: ip.to_string(),
                    description: Some("test".to_string()),
                    expires_at: now + Duration::days(days),
                    amount: limit,
                },
                now,
            )
            .await?;
        Ok(change.id())
    }

    pub async fn remaining(&self, ip: &str) -> Result<i64> {
        Ok(self.store.remaining(ip, Utc::now()).await?)
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok((status, body))
    }

    /// Request from `ip` (sent as `x-client-ip`) with an optional JSON body
    pub async fn request(&self, method: Method, uri: &str, ip: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let builder = Request::builder().method(method).uri(uri).header("x-client-ip", ip);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, ip: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, ip, None).await
    }

    pub async fn post(&self, uri: &str, ip: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, uri, ip, Some(body)).await
    }

    pub async fn put(&self, uri: &str, ip: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::PUT, uri, ip, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, ip: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::DELETE, uri, ip, None).await
    }
}

pub fn record_body(document: &str, benefit: &str) -> Value {
    json!({
        "numero_documento": document,
        "numero_beneficio": benefit,
        "nome_arquivo": "lote-01.csv"
    })
}

pub fn timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}
