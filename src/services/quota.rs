use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::database::models::Reservation;
use crate::database::{DatabaseError, GrantStore};

/// Per-IP query allowance on top of a [`GrantStore`]
#[derive(Clone)]
pub struct QuotaLedger {
    grants: Arc<dyn GrantStore>,
}

impl QuotaLedger {
    pub fn new(grants: Arc<dyn GrantStore>) -> Self {
        Self { grants }
    }

    /// Remaining allowance summed over every unexpired grant for `ip`
    pub async fn remaining(&self, ip: &str, now: DateTime<Utc>) -> Result<i64, DatabaseError> {
        self.grants.remaining(ip, now).await
    }

    /// Atomically take one unit before the work it pays for.
    ///
    /// `None` means the IP has nothing left; concurrent callers can never
    /// reserve more units than were available.
    pub async fn check_and_reserve(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<Reservation>, DatabaseError> {
        let reservation = self
            .grants
            .decrement(ip, now)
            .await?
            .map(|grant_id| Reservation { grant_id });

        match &reservation {
            Some(r) => tracing::debug!("Reserved one query for {} against grant {}", ip, r.grant_id),
            None => tracing::info!("Quota exhausted for {}", ip),
        }
        Ok(reservation)
    }

    /// Take one unit after the work is done. Returns `false` if nothing was left.
    pub async fn consume(&self, ip: &str, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let paid = self.grants.decrement(ip, now).await?.is_some();
        if !paid {
            tracing::warn!("No balance left to consume for {}", ip);
        }
        Ok(paid)
    }

    /// Undo a reservation whose write failed
    pub async fn release(&self, reservation: Reservation) -> Result<(), DatabaseError> {
        tracing::debug!("Releasing reservation on grant {}", reservation.grant_id);
        self.grants.increment(reservation.grant_id).await
    }
}
