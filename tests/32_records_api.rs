mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::json;
use std::time::Duration;

use common::{record_body, timestamp, TestApp};
use inss_api::config::{AppConfig, WritePolicy};

fn with_policy(policy: WritePolicy) -> TestApp {
    let mut config = AppConfig::development();
    config.records.policy = policy;
    TestApp::with_config(config)
}

#[tokio::test]
async fn upsert_by_id_twice_keeps_the_second_values() -> Result<()> {
    let app = with_policy(WritePolicy::UpsertById);
    app.grant("10.0.0.1", 10, 30).await?;

    let mut body = record_body("12345678901", "9876543210");
    body["id"] = json!("rec-1");
    body["nome"] = json!("PRIMEIRO");
    let (status, first) = app.post("/api/insert", "10.0.0.1", body.clone()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["outcome"], "inserted");
    assert_eq!(first["data"]["id"], "rec-1");

    body["nome"] = json!("SEGUNDO");
    body["saldo_total_disponivel"] = json!("1234.56");
    let (status, second) = app.post("/api/insert", "10.0.0.1", body).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["outcome"], "updated");

    let rows = app.store.records().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].details.name.as_deref(), Some("SEGUNDO"));
    assert_eq!(rows[0].details.available_total_balance.map(|d| d.to_string()), Some("1234.56".to_string()));
    assert_eq!(app.provider.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn upsert_by_id_rejects_missing_id() -> Result<()> {
    let app = with_policy(WritePolicy::UpsertById);
    app.grant("10.0.0.1", 10, 30).await?;

    let (status, body) = app.post("/api/insert", "10.0.0.1", record_body("1", "2")).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["id"], "This field is required");
    Ok(())
}

#[tokio::test]
async fn repeat_natural_key_is_duplicated_with_fresh_provenance() -> Result<()> {
    let app = TestApp::new();
    app.grant("10.0.0.1", 10, 30).await?;
    app.grant("10.0.0.2", 10, 30).await?;

    let (status, first) = app.post("/api/insert", "10.0.0.1", record_body("111", "222")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["outcome"], "inserted");

    tokio::time::sleep(Duration::from_millis(5)).await;

    let mut again = record_body("111", "222");
    again["nome_arquivo"] = json!("lote-02.csv");
    let (status, second) = app.post("/api/insert", "10.0.0.2", again).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["outcome"], "duplicated");
    assert_ne!(first["data"]["id"], second["data"]["id"]);

    // Only the first write needed the provider
    assert_eq!(app.provider.calls(), 1);

    let rows = app.store.records().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].details, rows[1].details);
    assert_eq!(rows[0].details.name.as_deref(), Some("MARIA DA SILVA"));
    assert_ne!(rows[0].registered_at, rows[1].registered_at);
    assert_eq!(rows[0].origin_ip.as_deref(), Some("10.0.0.1"));
    assert_eq!(rows[1].origin_ip.as_deref(), Some("10.0.0.2"));
    assert_eq!(rows[1].source_file_name.as_deref(), Some("lote-02.csv"));
    Ok(())
}

#[tokio::test]
async fn body_provenance_overrides_defaults() -> Result<()> {
    let app = with_policy(WritePolicy::PlainUpsert);
    app.grant("10.0.0.1", 10, 30).await?;

    let mut body = record_body("111", "222");
    body["ip_origem"] = json!("192.168.0.50");
    body["data_hora_registro"] = json!("2024-05-01 08:00:00");
    let (status, _) = app.post("/api/insert", "10.0.0.1", body).await?;
    assert_eq!(status, StatusCode::OK);

    let rows = app.store.records().await;
    assert_eq!(rows[0].origin_ip.as_deref(), Some("192.168.0.50"));
    assert_eq!(rows[0].registered_at, timestamp("2024-05-01T08:00:00Z"));
    Ok(())
}

#[tokio::test]
async fn plain_upsert_updates_the_natural_key_row() -> Result<()> {
    let app = with_policy(WritePolicy::PlainUpsert);
    app.grant("10.0.0.1", 10, 30).await?;

    let mut body = record_body("111", "222");
    body["nome"] = json!("A");
    let (_, first) = app.post("/api/insert", "10.0.0.1", body.clone()).await?;
    body["nome"] = json!("B");
    let (_, second) = app.post("/api/insert", "10.0.0.1", body).await?;

    assert_eq!(second["data"]["outcome"], "updated");
    assert_eq!(first["data"]["id"], second["data"]["id"]);
    let rows = app.store.records().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].details.name.as_deref(), Some("B"));
    Ok(())
}

#[tokio::test]
async fn provider_failure_writes_nothing() -> Result<()> {
    let app = TestApp::new();
    app.grant("10.0.0.1", 10, 30).await?;
    app.provider.fail_with(500);

    let (status, body) = app.post("/api/insert", "10.0.0.1", record_body("111", "222")).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert!(app.store.records().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_provider_body_is_upstream_error() -> Result<()> {
    let app = TestApp::new();
    app.grant("10.0.0.1", 10, 30).await?;
    app.provider.respond_with(json!({ "maxTotalBalance": "not money" }));

    let (status, body) = app.post("/api/insert", "10.0.0.1", record_body("111", "222")).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    assert!(app.store.records().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_natural_key_is_rejected_before_storage() -> Result<()> {
    let app = TestApp::new();
    app.grant("10.0.0.1", 10, 30).await?;

    let (status, body) = app
        .post("/api/insert", "10.0.0.1", json!({ "numero_documento": "", "nome": "X" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["field_errors"]["numero_documento"], "This field is required");
    assert_eq!(body["field_errors"]["numero_beneficio"], "This field is required");
    assert_eq!(app.store.record_calls(), 0);
    assert_eq!(app.provider.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() -> Result<()> {
    let app = TestApp::new();
    app.grant("10.0.0.1", 10, 30).await?;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/insert")
        .header("x-client-ip", "10.0.0.1")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))?;
    let (status, body) = app.send(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_JSON");
    assert_eq!(app.remaining("10.0.0.1").await?, 10);
    Ok(())
}

#[tokio::test]
async fn file_routes_require_a_file_name() -> Result<()> {
    let app = TestApp::new();
    app.grant("10.0.0.1", 10, 30).await?;

    for uri in ["/api/delete", "/api/delete?nome_arquivo=", "/api/delete?nome_arquivo=%20"] {
        let (status, body) = app.delete(uri, "10.0.0.1").await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["field_errors"]["nome_arquivo"], "This field is required");
    }
    for uri in ["/api/download", "/api/download?nome_arquivo="] {
        let (status, _) = app.get(uri, "10.0.0.1").await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }

    assert_eq!(app.store.record_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn download_and_delete_by_file() -> Result<()> {
    let app = with_policy(WritePolicy::PlainUpsert);
    app.grant("10.0.0.1", 10, 30).await?;

    app.post("/api/insert", "10.0.0.1", record_body("111", "001")).await?;
    app.post("/api/insert", "10.0.0.1", record_body("111", "002")).await?;
    let mut other = record_body("111", "003");
    other["nome_arquivo"] = json!("outro.csv");
    app.post("/api/insert", "10.0.0.1", other).await?;

    let (status, body) = app.get("/api/download?nome_arquivo=lote-01.csv", "10.0.0.1").await?;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["nome_arquivo"], "lote-01.csv");
    assert_eq!(rows[0]["ip_origem"], "10.0.0.1");

    let (status, body) = app.delete("/api/delete?nome_arquivo=lote-01.csv", "10.0.0.1").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 2);

    let remaining = app.store.records().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].source_file_name.as_deref(), Some("outro.csv"));
    Ok(())
}

#[tokio::test]
async fn query_inss_returns_provider_json_untouched() -> Result<()> {
    let app = TestApp::new();
    app.grant("10.0.0.1", 10, 30).await?;
    app.provider.respond_with(json!({ "name": "JOSE", "extra": { "nested": true } }));

    let (status, body) = app
        .post("/api/query-inss", "10.0.0.1", json!({ "identity": "111", "benefitNumber": "222" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "name": "JOSE", "extra": { "nested": true } }));
    assert_eq!(app.remaining("10.0.0.1").await?, 10);
    assert!(app.store.records().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn connectivity_probe_returns_a_record() -> Result<()> {
    let app = with_policy(WritePolicy::PlainUpsert);
    app.grant("10.0.0.1", 10, 30).await?;
    app.post("/api/insert", "10.0.0.1", record_body("111", "222")).await?;

    let (status, body) = app.get("/test", "10.9.9.9").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["record"]["numero_documento"], "111");
    Ok(())
}
