mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;

use inss_api::config::AppConfig;

use common::{record_body, TestApp, ADMIN_IP};

#[tokio::test]
async fn unknown_ip_is_rejected_on_every_gated_route() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.post("/api/insert", "10.9.9.9", record_body("111", "222")).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.delete("/api/delete?nome_arquivo=a.csv", "10.9.9.9").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/download?nome_arquivo=a.csv", "10.9.9.9").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post("/api/query-inss", "10.9.9.9", record_body("111", "222")).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(app.store.record_calls(), 0);
    assert_eq!(app.provider.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn expired_grant_is_rejected_despite_balance() -> Result<()> {
    let app = TestApp::new();
    app.grant("10.0.0.7", 50, -1).await?;

    let (status, body) = app.post("/api/insert", "10.0.0.7", record_body("111", "222")).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(app.remaining("10.0.0.7").await?, 0);
    Ok(())
}

#[tokio::test]
async fn active_grant_passes_the_gate() -> Result<()> {
    let app = TestApp::new();
    app.grant("10.0.0.1", 5, 30).await?;

    let (status, body) = app.get("/api/download?nome_arquivo=lote-01.csv", "10.0.0.1").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn forwarded_for_first_hop_identifies_the_caller() -> Result<()> {
    let app = TestApp::new();
    app.grant("203.0.113.5", 5, 30).await?;

    let request = Request::builder()
        .uri("/api/download?nome_arquivo=x.csv")
        .header("x-forwarded-for", "203.0.113.5, 10.0.0.254")
        .body(Body::empty())?;
    let (status, _) = app.send(request).await?;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/api/download?nome_arquivo=x.csv")
        .header("x-client-ip", "::ffff:203.0.113.5")
        .body(Body::empty())?;
    let (status, _) = app.send(request).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn admin_scope_is_separate_from_grants() -> Result<()> {
    let app = TestApp::new();
    app.grant("10.0.0.1", 5, 30).await?;

    // A paying customer is still not an administrator
    let (status, body) = app.get("/api/auth-ips", "10.0.0.1").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = app.get("/api/auth-ips", ADMIN_IP).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    // And an administrator holds no customer grant
    let (status, _) = app.post("/api/insert", ADMIN_IP, record_body("111", "222")).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn production_ignores_a_spoofed_client_ip_header() -> Result<()> {
    let mut config = AppConfig::production();
    config.security.admin_ips = vec![ADMIN_IP.to_string()];
    let app = TestApp::with_config(config);

    let (status, _) = app.get("/api/auth-ips", ADMIN_IP).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .uri("/api/auth-ips")
        .header("x-forwarded-for", ADMIN_IP)
        .body(Body::empty())?;
    let (status, _) = app.send(request).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn public_routes_need_no_grant() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.get("/", "10.9.9.9").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "INSS API");

    let (status, body) = app.get("/test", "10.9.9.9").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["record"], serde_json::Value::Null);

    let (status, body) = app.get("/api/limit", "10.9.9.9").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ip"], "10.9.9.9");
    assert_eq!(body["data"]["limite"], 0);
    Ok(())
}
