use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::database::manager::DatabaseError;
use crate::database::models::{AccessGrant, GrantChange, GrantEdit, GrantTopUp};

/// Storage for access grants (`ip_data`)
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Most recently granted row for `ip` that has not expired at `now`
    async fn find_active(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<AccessGrant>, DatabaseError>;

    /// Sum of the remaining allowance across all unexpired rows for `ip`
    async fn remaining(&self, ip: &str, now: DateTime<Utc>) -> Result<i64, DatabaseError>;

    /// Take one unit from the newest unexpired row with balance left.
    ///
    /// Must be a single conditional update: the value is only decremented
    /// while it is above zero. Returns the id of the row that paid.
    async fn decrement(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<i64>, DatabaseError>;

    /// Give one unit back to a row, used to undo a reservation
    async fn increment(&self, grant_id: i64) -> Result<(), DatabaseError>;

    async fn list(&self) -> Result<Vec<AccessGrant>, DatabaseError>;

    /// Create the grant for an IP, or add to the existing one
    async fn top_up(&self, top_up: GrantTopUp, now: DateTime<Utc>) -> Result<GrantChange, DatabaseError>;

    async fn update(&self, id: i64, edit: GrantEdit) -> Result<Option<AccessGrant>, DatabaseError>;

    async fn delete(&self, id: i64) -> Result<bool, DatabaseError>;
}

const GRANT_COLUMNS: &str =
    "id, ip, descricao, data_adicao, data_vencimento, limite_consultas, total_carregado";

/// Postgres-backed [`GrantStore`]
#[derive(Clone)]
pub struct PgGrantStore {
    pool: PgPool,
}

impl PgGrantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GrantStore for PgGrantStore {
    async fn find_active(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<AccessGrant>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM ip_data WHERE ip = $1 AND data_vencimento >= $2 \
             ORDER BY data_adicao DESC, id DESC LIMIT 1",
            GRANT_COLUMNS
        );
        let grant = sqlx::query_as::<_, AccessGrant>(&query)
            .bind(ip)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(grant)
    }

    async fn remaining(&self, ip: &str, now: DateTime<Utc>) -> Result<i64, DatabaseError> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(limite_consultas), 0)::BIGINT FROM ip_data \
             WHERE ip = $1 AND data_vencimento >= $2",
        )
        .bind(ip)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn decrement(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<i64>, DatabaseError> {
        // The row lock plus the repeated `> 0` predicate make the check and the
        // decrement one step; a waiter that finds the row drained gets no row back.
        // Each lost race means another request spent a unit, so retrying while
        // balance remains always ends.
        loop {
            let paid: Option<(i64,)> = sqlx::query_as(
                r#"
                UPDATE ip_data SET limite_consultas = limite_consultas - 1
                WHERE id = (
                    SELECT id FROM ip_data
                    WHERE ip = $1 AND data_vencimento >= $2 AND limite_consultas > 0
                    ORDER BY data_adicao DESC, id DESC
                    LIMIT 1
                    FOR UPDATE
                )
                AND limite_consultas > 0
                RETURNING id
                "#,
            )
            .bind(ip)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

            if let Some((id,)) = paid {
                return Ok(Some(id));
            }
            if self.remaining(ip, now).await? <= 0 {
                return Ok(None);
            }
            tracing::debug!("Quota decrement for {} lost a race, retrying", ip);
        }
    }

    async fn increment(&self, grant_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE ip_data SET limite_consultas = limite_consultas + 1 WHERE id = $1")
            .bind(grant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<AccessGrant>, DatabaseError> {
        let query = format!("SELECT {} FROM ip_data ORDER BY id DESC", GRANT_COLUMNS);
        let grants = sqlx::query_as::<_, AccessGrant>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(grants)
    }

    async fn top_up(&self, top_up: GrantTopUp, now: DateTime<Utc>) -> Result<GrantChange, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // Serialize grants for the same IP so two first-time grants cannot both insert
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&top_up.ip)
            .execute(&mut *tx)
            .await?;

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM ip_data WHERE ip = $1 ORDER BY data_adicao DESC, id DESC LIMIT 1 FOR UPDATE",
        )
        .bind(&top_up.ip)
        .fetch_optional(&mut *tx)
        .await?;

        let change = match existing {
            Some((id,)) => {
                sqlx::query(
                    r#"
                    UPDATE ip_data
                    SET descricao = COALESCE($2, descricao),
                        data_vencimento = $3,
                        limite_consultas = limite_consultas + $4,
                        total_carregado = total_carregado + $4
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&top_up.description)
                .bind(top_up.expires_at)
                .bind(top_up.amount)
                .execute(&mut *tx)
                .await?;
                GrantChange::ToppedUp(id)
            }
            None => {
                let (id,): (i64,) = sqlx::query_as(
                    r#"
                    INSERT INTO ip_data
                        (ip, descricao, data_adicao, data_vencimento, limite_consultas, total_carregado)
                    VALUES ($1, $2, $3, $4, $5, $5)
                    RETURNING id
                    "#,
                )
                .bind(&top_up.ip)
                .bind(&top_up.description)
                .bind(now)
                .bind(top_up.expires_at)
                .bind(top_up.amount)
                .fetch_one(&mut *tx)
                .await?;
                GrantChange::Created(id)
            }
        };

        tx.commit().await?;
        Ok(change)
    }

    async fn update(&self, id: i64, edit: GrantEdit) -> Result<Option<AccessGrant>, DatabaseError> {
        let query = format!(
            r#"
            UPDATE ip_data
            SET ip = COALESCE($2, ip),
                descricao = COALESCE($3, descricao),
                data_vencimento = COALESCE($4, data_vencimento),
                limite_consultas = limite_consultas + $5,
                total_carregado = total_carregado + $5
            WHERE id = $1
            RETURNING {}
            "#,
            GRANT_COLUMNS
        );
        let grant = sqlx::query_as::<_, AccessGrant>(&query)
            .bind(id)
            .bind(&edit.ip)
            .bind(&edit.description)
            .bind(edit.expires_at)
            .bind(edit.amount)
            .fetch_optional(&self.pool)
            .await?;
        Ok(grant)
    }

    async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM ip_data WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
