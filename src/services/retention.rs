use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::config::{RetentionConfig, MAX_RETENTION_DAYS};
use crate::database::{DatabaseError, RecordStore};

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("retention window must be between 1 and {} days, got {}", MAX_RETENTION_DAYS, .0)]
    WindowOutOfRange(i64),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// Oldest registration time kept by a `days` window ending at `now`
pub fn cutoff(days: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>, RetentionError> {
    if !(1..=MAX_RETENTION_DAYS).contains(&days) {
        return Err(RetentionError::WindowOutOfRange(days));
    }
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or(RetentionError::WindowOutOfRange(days))
}

/// Delete every record registered more than `days` days before `now`
pub async fn sweep(records: &dyn RecordStore, days: i64, now: DateTime<Utc>) -> Result<u64, RetentionError> {
    let cutoff = cutoff(days, now)?;
    let deleted = records.delete_registered_before(cutoff).await?;
    tracing::info!("Retention sweep removed {} records registered before {}", deleted, cutoff);
    Ok(deleted)
}

/// Start the periodic sweep. Returns `None` when retention is disabled.
///
/// The returned scheduler owns the job; dropping it stops the sweep.
pub async fn start_scheduler(
    records: Arc<dyn RecordStore>,
    config: &RetentionConfig,
) -> Result<Option<JobScheduler>, JobSchedulerError> {
    if !config.enabled {
        tracing::info!("Retention sweep disabled");
        return Ok(None);
    }

    let days = config.days;
    let sched = JobScheduler::new().await?;
    let job = Job::new_async(config.cron.as_str(), move |_uuid, _l| {
        let records = records.clone();
        Box::pin(async move {
            // Failures wait for the next tick
            if let Err(e) = sweep(records.as_ref(), days, Utc::now()).await {
                tracing::error!("Retention sweep failed: {}", e);
            }
        })
    })?;
    sched.add(job).await?;
    sched.start().await?;

    tracing::info!("Retention sweep scheduled ({}), window {} days", config.cron, days);
    Ok(Some(sched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{BenefitDetails, BenefitRecord, NaturalKey, Provenance};
    use crate::database::MemoryStore;

    fn record(id: &str, registered_at: DateTime<Utc>) -> BenefitRecord {
        BenefitRecord::new(
            id.to_string(),
            NaturalKey {
                document_number: "1".into(),
                benefit_number: "2".into(),
            },
            BenefitDetails::default(),
            Provenance {
                origin_ip: None,
                registered_at,
                source_file_name: None,
            },
        )
    }

    #[tokio::test]
    async fn removes_only_rows_outside_the_window() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert(&record("old", now - Duration::days(31))).await.unwrap();
        store.insert(&record("new", now - Duration::days(1))).await.unwrap();

        assert_eq!(sweep(&store, 30, now).await.unwrap(), 1);

        let left = store.records().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "new");
    }

    #[tokio::test]
    async fn oversized_window_is_an_error_not_a_panic() {
        let store = MemoryStore::new();
        store.insert(&record("kept", Utc::now())).await.unwrap();

        let err = sweep(&store, 1_000_000_000, Utc::now()).await.unwrap_err();
        assert!(matches!(err, RetentionError::WindowOutOfRange(1_000_000_000)));
        assert!(matches!(sweep(&store, 0, Utc::now()).await, Err(RetentionError::WindowOutOfRange(0))));
        assert_eq!(store.records().await.len(), 1);
    }

    #[test]
    fn cutoff_rejects_windows_past_the_calendar() {
        let earliest = DateTime::<Utc>::MIN_UTC;
        assert!(cutoff(1, earliest).is_err());
        assert!(cutoff(MAX_RETENTION_DAYS, Utc::now()).is_ok());
    }

    #[tokio::test]
    async fn disabled_retention_starts_nothing() {
        let config = RetentionConfig {
            enabled: false,
            days: 30,
            cron: "0 0 0 * * *".into(),
        };
        let sched = start_scheduler(Arc::new(MemoryStore::new()), &config).await.unwrap();
        assert!(sched.is_none());
    }
}
