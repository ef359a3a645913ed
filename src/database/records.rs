use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use sqlx::{PgPool, Row};

use crate::database::manager::DatabaseError;
use crate::database::models::{BenefitRecord, NaturalKey, RECORD_COLUMNS};
use crate::types::WriteOutcome;

/// Storage for benefit records (`inss_higienizado`)
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Any one row, used as a connectivity probe
    async fn sample(&self) -> Result<Option<BenefitRecord>, DatabaseError>;

    /// Most recently registered row for a natural key
    async fn find_latest(&self, key: &NaturalKey) -> Result<Option<BenefitRecord>, DatabaseError>;

    async fn insert(&self, record: &BenefitRecord) -> Result<(), DatabaseError>;

    /// Insert, or overwrite every mutable column of the row with the same id
    async fn upsert_by_id(&self, record: &BenefitRecord) -> Result<WriteOutcome, DatabaseError>;

    /// Overwrite the newest row with the same natural key in place, or insert
    async fn upsert_by_key(&self, record: &BenefitRecord) -> Result<WriteOutcome, DatabaseError>;

    async fn list_by_file(&self, file_name: &str) -> Result<Vec<BenefitRecord>, DatabaseError>;

    async fn delete_by_file(&self, file_name: &str) -> Result<u64, DatabaseError>;

    /// Delete rows registered strictly before `cutoff`
    async fn delete_registered_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError>;
}

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

static SELECT_COLUMNS: Lazy<String> = Lazy::new(|| RECORD_COLUMNS.join(", "));

static INSERT_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "INSERT INTO inss_higienizado ({}) VALUES ({})",
        RECORD_COLUMNS.join(", "),
        placeholders(RECORD_COLUMNS.len())
    )
});

static UPSERT_BY_ID_SQL: Lazy<String> = Lazy::new(|| {
    let assignments = RECORD_COLUMNS[1..]
        .iter()
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} ON CONFLICT (id) DO UPDATE SET {} RETURNING (xmax = 0) AS inserted",
        INSERT_SQL.as_str(),
        assignments
    )
});

// Binds like an insert: $1 is the id, $2.. are the remaining columns in order
static UPDATE_BY_ID_SQL: Lazy<String> = Lazy::new(|| {
    let assignments = RECORD_COLUMNS[1..]
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ${}", column, i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE inss_higienizado SET {} WHERE id = $1", assignments)
});

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bind every column of `record` in [`RECORD_COLUMNS`] order, using `id` for the first
fn bind_record<'q>(query: PgQuery<'q>, id: &'q str, record: &'q BenefitRecord) -> PgQuery<'q> {
    let d = &record.details;
    query
        .bind(id)
        .bind(&record.benefit_number)
        .bind(&record.document_number)
        .bind(&d.name)
        .bind(&d.state)
        .bind(&d.alimony)
        .bind(&d.birth_date)
        .bind(&d.block_type)
        .bind(&d.grant_date)
        .bind(&d.credit_type)
        .bind(d.benefit_card_limit)
        .bind(d.benefit_card_balance)
        .bind(&d.benefit_status)
        .bind(&d.benefit_end_date)
        .bind(d.consigned_card_limit)
        .bind(d.consigned_card_balance)
        .bind(d.consigned_credit_balance)
        .bind(d.max_total_balance)
        .bind(d.used_total_balance)
        .bind(d.available_total_balance)
        .bind(&d.query_date)
        .bind(&d.query_return_date)
        .bind(&d.query_return_time)
        .bind(&d.legal_representative_name)
        .bind(&d.disbursement_bank)
        .bind(&d.disbursement_branch)
        .bind(&d.disbursement_account)
        .bind(&d.disbursement_digit)
        .bind(d.portability_count)
        .bind(&record.origin_ip)
        .bind(record.registered_at)
        .bind(&record.source_file_name)
}

/// Postgres-backed [`RecordStore`]
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn sample(&self) -> Result<Option<BenefitRecord>, DatabaseError> {
        let query = format!("SELECT {} FROM inss_higienizado LIMIT 1", SELECT_COLUMNS.as_str());
        let record = sqlx::query_as::<_, BenefitRecord>(&query)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_latest(&self, key: &NaturalKey) -> Result<Option<BenefitRecord>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM inss_higienizado \
             WHERE numero_documento = $1 AND numero_beneficio = $2 \
             ORDER BY data_hora_registro DESC, id DESC LIMIT 1",
            SELECT_COLUMNS.as_str()
        );
        let record = sqlx::query_as::<_, BenefitRecord>(&query)
            .bind(&key.document_number)
            .bind(&key.benefit_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn insert(&self, record: &BenefitRecord) -> Result<(), DatabaseError> {
        bind_record(sqlx::query(INSERT_SQL.as_str()), &record.id, record)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_by_id(&self, record: &BenefitRecord) -> Result<WriteOutcome, DatabaseError> {
        let row = bind_record(sqlx::query(UPSERT_BY_ID_SQL.as_str()), &record.id, record)
            .fetch_one(&self.pool)
            .await?;
        let inserted: bool = row.try_get("inserted")?;
        Ok(if inserted {
            WriteOutcome::Inserted(record.id.clone())
        } else {
            WriteOutcome::Updated(record.id.clone())
        })
    }

    async fn upsert_by_key(&self, record: &BenefitRecord) -> Result<WriteOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // No unique index on the natural key (duplicates are legal under other
        // policies), so writers for the same key are serialized by a lock instead
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || ':' || $2))")
            .bind(&record.document_number)
            .bind(&record.benefit_number)
            .execute(&mut *tx)
            .await?;

        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM inss_higienizado \
             WHERE numero_documento = $1 AND numero_beneficio = $2 \
             ORDER BY data_hora_registro DESC, id DESC LIMIT 1",
        )
        .bind(&record.document_number)
        .bind(&record.benefit_number)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some((id,)) => {
                bind_record(sqlx::query(UPDATE_BY_ID_SQL.as_str()), &id, record)
                    .execute(&mut *tx)
                    .await?;
                WriteOutcome::Updated(id)
            }
            None => {
                bind_record(sqlx::query(INSERT_SQL.as_str()), &record.id, record)
                    .execute(&mut *tx)
                    .await?;
                WriteOutcome::Inserted(record.id.clone())
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn list_by_file(&self, file_name: &str) -> Result<Vec<BenefitRecord>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM inss_higienizado WHERE nome_arquivo = $1 ORDER BY data_hora_registro, id",
            SELECT_COLUMNS.as_str()
        );
        let records = sqlx::query_as::<_, BenefitRecord>(&query)
            .bind(file_name)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn delete_by_file(&self, file_name: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM inss_higienizado WHERE nome_arquivo = $1")
            .bind(file_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_registered_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM inss_higienizado WHERE data_hora_registro < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
