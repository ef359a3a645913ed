//! Runs the Postgres stores against a live database. Each test returns early
//! when `DATABASE_URL` is not set (it is also read from `.env`).

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use inss_api::config::DatabaseConfig;
use inss_api::database::models::{BenefitDetails, BenefitRecord, GrantTopUp, NaturalKey, Provenance};
use inss_api::database::{DatabaseManager, GrantStore, PgGrantStore, PgRecordStore, RecordStore};
use inss_api::types::WriteOutcome;

async fn pool() -> Result<Option<PgPool>> {
    let _ = dotenvy::dotenv();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres store test");
        return Ok(None);
    };

    let config = DatabaseConfig {
        url: Some(url),
        max_connections: 20,
        connection_timeout: 10,
    };
    let pool = DatabaseManager::connect(&config).await?;
    DatabaseManager::migrate(&pool).await?;
    Ok(Some(pool))
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

fn record(id: &str, key: &NaturalKey, name: &str, file: &str, registered_at: DateTime<Utc>) -> BenefitRecord {
    BenefitRecord::new(
        id.to_string(),
        key.clone(),
        BenefitDetails {
            name: Some(name.to_string()),
            ..Default::default()
        },
        Provenance {
            origin_ip: Some("10.0.0.1".into()),
            registered_at,
            source_file_name: Some(file.to_string()),
        },
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_decrements_never_oversell() -> Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let grants = Arc::new(PgGrantStore::new(pool));
    let ip = unique("ip");
    let now = Utc::now();

    let grant_id = grants
        .top_up(
            GrantTopUp {
                ip: ip.clone(),
                description: Some("concurrency".into()),
                expires_at: now + Duration::days(1),
                amount: 5,
            },
            now,
        )
        .await?
        .id();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let grants = grants.clone();
        let ip = ip.clone();
        tasks.push(tokio::spawn(async move { grants.decrement(&ip, Utc::now()).await }));
    }

    let mut paid = 0;
    for task in tasks {
        if task.await??.is_some() {
            paid += 1;
        }
    }

    assert_eq!(paid, 5);
    assert_eq!(grants.remaining(&ip, Utc::now()).await?, 0);
    assert!(grants.decrement(&ip, Utc::now()).await?.is_none());

    grants.delete(grant_id).await?;
    Ok(())
}

#[tokio::test]
async fn upsert_by_id_reports_insert_then_update() -> Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let records = PgRecordStore::new(pool);
    let file = unique("file");
    let id = unique("rec");
    let key = NaturalKey {
        document_number: unique("doc"),
        benefit_number: "222".into(),
    };
    let now = Utc::now();

    let first = records.upsert_by_id(&record(&id, &key, "A", &file, now)).await?;
    let second = records.upsert_by_id(&record(&id, &key, "B", &file, now)).await?;

    assert_eq!(first, WriteOutcome::Inserted(id.clone()));
    assert_eq!(second, WriteOutcome::Updated(id.clone()));

    let rows = records.list_by_file(&file).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].details.name.as_deref(), Some("B"));

    records.delete_by_file(&file).await?;
    Ok(())
}

#[tokio::test]
async fn upsert_by_key_updates_the_existing_row() -> Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let records = PgRecordStore::new(pool);
    let file = unique("file");
    let key = NaturalKey {
        document_number: unique("doc"),
        benefit_number: "333".into(),
    };
    let now = Utc::now();
    let first_id = unique("rec");

    let first = records.upsert_by_key(&record(&first_id, &key, "A", &file, now)).await?;
    let second = records
        .upsert_by_key(&record(&unique("rec"), &key, "B", &file, now + Duration::seconds(1)))
        .await?;

    assert_eq!(first, WriteOutcome::Inserted(first_id.clone()));
    assert_eq!(second, WriteOutcome::Updated(first_id.clone()));

    let rows = records.list_by_file(&file).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, first_id);
    assert_eq!(rows[0].details.name.as_deref(), Some("B"));

    records.delete_by_file(&file).await?;
    Ok(())
}

#[tokio::test]
async fn delete_registered_before_keeps_newer_rows() -> Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let records = PgRecordStore::new(pool);
    let file = unique("file");
    let key = NaturalKey {
        document_number: unique("doc"),
        benefit_number: "444".into(),
    };
    let now = Utc::now();

    records
        .insert(&record(&unique("old"), &key, "OLD", &file, now - Duration::days(400)))
        .await?;
    let recent_id = unique("recent");
    records
        .insert(&record(&recent_id, &key, "RECENT", &file, now - Duration::days(1)))
        .await?;

    let deleted = records.delete_registered_before(now - Duration::days(30)).await?;
    assert!(deleted >= 1);

    let rows = records.list_by_file(&file).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, recent_id);

    records.delete_by_file(&file).await?;
    Ok(())
}
