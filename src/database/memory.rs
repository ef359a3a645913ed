// In-process implementation of both storage traits.
//
// Every operation runs under one async mutex, so check-and-decrement is as
// atomic here as the conditional UPDATE is in Postgres. Used by the test
// suites and for running the API without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::database::grants::GrantStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{AccessGrant, BenefitRecord, GrantChange, GrantEdit, GrantTopUp, NaturalKey};
use crate::database::records::RecordStore;
use crate::types::WriteOutcome;

#[derive(Default)]
struct Tables {
    grants: Vec<AccessGrant>,
    next_grant_id: i64,
    records: Vec<BenefitRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    record_calls: AtomicUsize,
    fail_record_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`RecordStore`] calls made so far
    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    /// Make record inserts and upserts fail with [`DatabaseError::Unavailable`]
    pub fn fail_record_writes(&self, fail: bool) {
        self.fail_record_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all stored records, in insertion order
    pub async fn records(&self) -> Vec<BenefitRecord> {
        self.tables.lock().await.records.clone()
    }

    fn touch_records(&self) {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), DatabaseError> {
        if self.fail_record_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("record writes are disabled".to_string()));
        }
        Ok(())
    }
}

/// Newest-first ordering used by every "most recent grant" lookup
fn newest_first(grants: &mut [&mut AccessGrant]) {
    grants.sort_by(|a, b| b.granted_at.cmp(&a.granted_at).then(b.id.cmp(&a.id)));
}

fn latest_for_key<'a>(records: &'a [BenefitRecord], key: &NaturalKey) -> Option<&'a BenefitRecord> {
    records
        .iter()
        .filter(|r| r.document_number == key.document_number && r.benefit_number == key.benefit_number)
        .max_by(|a, b| a.registered_at.cmp(&b.registered_at).then(a.id.cmp(&b.id)))
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn find_active(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<AccessGrant>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let mut matching: Vec<&mut AccessGrant> = tables
            .grants
            .iter_mut()
            .filter(|g| g.ip == ip && g.is_active(now))
            .collect();
        newest_first(&mut matching);
        Ok(matching.first().map(|g| (**g).clone()))
    }

    async fn remaining(&self, ip: &str, now: DateTime<Utc>) -> Result<i64, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .grants
            .iter()
            .filter(|g| g.ip == ip && g.is_active(now))
            .map(|g| g.monthly_limit)
            .sum())
    }

    async fn decrement(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<i64>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let mut candidates: Vec<&mut AccessGrant> = tables
            .grants
            .iter_mut()
            .filter(|g| g.ip == ip && g.is_active(now) && g.has_balance())
            .collect();
        newest_first(&mut candidates);
        Ok(candidates.into_iter().next().map(|grant| {
            grant.monthly_limit = (grant.monthly_limit - 1).max(0);
            grant.id
        }))
    }

    async fn increment(&self, grant_id: i64) -> Result<(), DatabaseError> {
        let mut tables = self.tables.lock().await;
        if let Some(grant) = tables.grants.iter_mut().find(|g| g.id == grant_id) {
            grant.monthly_limit += 1;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<AccessGrant>, DatabaseError> {
        let tables = self.tables.lock().await;
        let mut grants = tables.grants.clone();
        grants.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(grants)
    }

    async fn top_up(&self, top_up: GrantTopUp, now: DateTime<Utc>) -> Result<GrantChange, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let mut existing: Vec<&mut AccessGrant> =
            tables.grants.iter_mut().filter(|g| g.ip == top_up.ip).collect();
        newest_first(&mut existing);

        if let Some(grant) = existing.into_iter().next() {
            if top_up.description.is_some() {
                grant.description = top_up.description;
            }
            grant.expires_at = top_up.expires_at;
            grant.monthly_limit += top_up.amount;
            grant.total_loaded += top_up.amount;
            return Ok(GrantChange::ToppedUp(grant.id));
        }

        tables.next_grant_id += 1;
        let id = tables.next_grant_id;
        tables.grants.push(AccessGrant {
            id,
            ip: top_up.ip,
            description: top_up.description,
            granted_at: now,
            expires_at: top_up.expires_at,
            monthly_limit: top_up.amount,
            total_loaded: top_up.amount,
        });
        Ok(GrantChange::Created(id))
    }

    async fn update(&self, id: i64, edit: GrantEdit) -> Result<Option<AccessGrant>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let Some(grant) = tables.grants.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        if let Some(ip) = edit.ip {
            grant.ip = ip;
        }
        if edit.description.is_some() {
            grant.description = edit.description;
        }
        if let Some(expires_at) = edit.expires_at {
            grant.expires_at = expires_at;
        }
        grant.monthly_limit += edit.amount;
        grant.total_loaded += edit.amount;
        Ok(Some(grant.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let before = tables.grants.len();
        tables.grants.retain(|g| g.id != id);
        Ok(tables.grants.len() < before)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn sample(&self) -> Result<Option<BenefitRecord>, DatabaseError> {
        self.touch_records();
        Ok(self.tables.lock().await.records.first().cloned())
    }

    async fn find_latest(&self, key: &NaturalKey) -> Result<Option<BenefitRecord>, DatabaseError> {
        self.touch_records();
        let tables = self.tables.lock().await;
        Ok(latest_for_key(&tables.records, key).cloned())
    }

    async fn insert(&self, record: &BenefitRecord) -> Result<(), DatabaseError> {
        self.touch_records();
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        if tables.records.iter().any(|r| r.id == record.id) {
            return Err(DatabaseError::Unavailable(format!(
                "duplicate key value violates unique constraint on id '{}'",
                record.id
            )));
        }
        tables.records.push(record.clone());
        Ok(())
    }

    async fn upsert_by_id(&self, record: &BenefitRecord) -> Result<WriteOutcome, DatabaseError> {
        self.touch_records();
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        match tables.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(WriteOutcome::Updated(record.id.clone()))
            }
            None => {
                tables.records.push(record.clone());
                Ok(WriteOutcome::Inserted(record.id.clone()))
            }
        }
    }

    async fn upsert_by_key(&self, record: &BenefitRecord) -> Result<WriteOutcome, DatabaseError> {
        self.touch_records();
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let existing_id = latest_for_key(&tables.records, &record.natural_key()).map(|r| r.id.clone());
        match existing_id {
            Some(id) => {
                if let Some(existing) = tables.records.iter_mut().find(|r| r.id == id) {
                    *existing = BenefitRecord { id: id.clone(), ..record.clone() };
                }
                Ok(WriteOutcome::Updated(id))
            }
            None => {
                tables.records.push(record.clone());
                Ok(WriteOutcome::Inserted(record.id.clone()))
            }
        }
    }

    async fn list_by_file(&self, file_name: &str) -> Result<Vec<BenefitRecord>, DatabaseError> {
        self.touch_records();
        let tables = self.tables.lock().await;
        Ok(tables
            .records
            .iter()
            .filter(|r| r.source_file_name.as_deref() == Some(file_name))
            .cloned()
            .collect())
    }

    async fn delete_by_file(&self, file_name: &str) -> Result<u64, DatabaseError> {
        self.touch_records();
        let mut tables = self.tables.lock().await;
        let before = tables.records.len();
        tables.records.retain(|r| r.source_file_name.as_deref() != Some(file_name));
        Ok((before - tables.records.len()) as u64)
    }

    async fn delete_registered_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        self.touch_records();
        let mut tables = self.tables.lock().await;
        let before = tables.records.len();
        tables.records.retain(|r| r.registered_at >= cutoff);
        Ok((before - tables.records.len()) as u64)
    }
}
