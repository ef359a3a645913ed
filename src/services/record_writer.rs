use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::WritePolicy;
use crate::database::models::{BenefitRecord, NaturalKey, RecordPayload};
use crate::database::{DatabaseError, RecordStore};
use crate::services::provider::{record_from_provider, BenefitProvider, ProviderError};
use crate::types::WriteOutcome;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// A payload that passed validation and is ready to be written
#[derive(Debug)]
pub struct PreparedWrite {
    key: NaturalKey,
    id: Option<String>,
    payload: RecordPayload,
}

/// Applies the configured [`WritePolicy`] to incoming benefit records
#[derive(Clone)]
pub struct RecordWriter {
    records: Arc<dyn RecordStore>,
    provider: Arc<dyn BenefitProvider>,
    policy: WritePolicy,
}

impl RecordWriter {
    pub fn new(records: Arc<dyn RecordStore>, provider: Arc<dyn BenefitProvider>, policy: WritePolicy) -> Self {
        Self {
            records,
            provider,
            policy,
        }
    }

    /// Check the payload without touching storage or the provider
    pub fn prepare(&self, payload: RecordPayload) -> Result<PreparedWrite, RecordError> {
        let id = payload.supplied_id();
        let key = match (payload.natural_key(), self.policy) {
            (Ok(_), WritePolicy::UpsertById) if id.is_none() => {
                return Err(RecordError::MissingFields(vec!["id"]));
            }
            (Ok(key), _) => key,
            (Err(mut missing), policy) => {
                if policy == WritePolicy::UpsertById && id.is_none() {
                    missing.insert(0, "id");
                }
                return Err(RecordError::MissingFields(missing));
            }
        };

        Ok(PreparedWrite { key, id, payload })
    }

    pub async fn apply(
        &self,
        write: PreparedWrite,
        caller_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, RecordError> {
        let provenance = write.payload.provenance(caller_ip, now);

        match self.policy {
            WritePolicy::UpsertById => {
                let id = write.id.unwrap_or_else(|| Uuid::new_v4().to_string());
                let record = BenefitRecord::new(id, write.key, write.payload.details, provenance);
                Ok(self.records.upsert_by_id(&record).await?)
            }
            WritePolicy::PlainUpsert => {
                let id = write.id.unwrap_or_else(|| Uuid::new_v4().to_string());
                let record = BenefitRecord::new(id, write.key, write.payload.details, provenance);
                Ok(self.records.upsert_by_key(&record).await?)
            }
            WritePolicy::EnrichOrDuplicate => {
                if let Some(existing) = self.records.find_latest(&write.key).await? {
                    let copy = existing.duplicate(provenance);
                    self.records.insert(&copy).await?;
                    tracing::info!(
                        "Duplicated record {} as {} for {}/{}",
                        existing.id,
                        copy.id,
                        write.key.document_number,
                        write.key.benefit_number
                    );
                    return Ok(WriteOutcome::Duplicated(copy.id));
                }

                let response = self.provider.query(&write.key).await?;
                let record = record_from_provider(&response, &write.key, provenance)?;
                // An id clash with an existing row is a storage error, never an overwrite
                self.records.insert(&record).await?;
                Ok(WriteOutcome::Inserted(record.id))
            }
        }
    }

    /// [`prepare`](Self::prepare) then [`apply`](Self::apply)
    pub async fn write(
        &self,
        payload: RecordPayload,
        caller_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, RecordError> {
        let prepared = self.prepare(payload)?;
        self.apply(prepared, caller_ip, now).await
    }
}
