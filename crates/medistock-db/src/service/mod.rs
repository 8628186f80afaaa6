//! # Pharmacy Services
//!
//! Transactional operations built on top of the repositories. This is where
//! the stock reconciliation engine and the receipt transaction manager live.
//!
//! ## Transaction Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Every Write Is One Atomic Unit                             │
//! │                                                                         │
//! │  BEGIN TRANSACTION                                                     │
//! │    fetch medicines          ← reads see a consistent snapshot          │
//! │    validate (pure core fns) ← fail here = nothing changed              │
//! │    mutate ledgers in memory                                            │
//! │    persist medicines        ← version-checked; loser rolls back        │
//! │    persist receipt/sale                                                │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Two concurrent sales cannot both pass the availability check against  │
//! │  a stale read and over-deplete a batch: the second writer's version    │
//! │  check fails and its whole transaction rolls back (retryable).         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`intake`] - stock reconciliation engine + batch maintenance
//! - [`receipts`] - receipt create / update / delete with reversal
//! - [`sales`] - pharmacy sales with atomic daily numbering
//! - [`dashboard`] - read-only rollups

use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use thiserror::Error;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::medicine;
use medistock_core::{CoreError, Medicine, RestorePolicy};

pub mod dashboard;
pub mod intake;
pub mod receipts;
pub mod sales;

pub use dashboard::{DashboardStats, MedicineStockStatus};
pub use intake::{BatchUpdate, IntakeReport, RemovedBatch};
pub use receipts::{CreateReceiptRequest, ReceiptWriteReport};
pub use sales::{CreateSaleRequest, SalesStats};

// =============================================================================
// Service Error
// =============================================================================

/// Errors returned by [`PharmacyService`] operations: a domain failure or a
/// storage failure, never a stringly-typed mixture.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Pharmacy Service
// =============================================================================

/// The pharmacy service: intake, receipts, sales and dashboards over one
/// database handle.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./medistock.db")).await?;
/// let service = PharmacyService::new(db);
///
/// let report = service.record_intake(intake).await?;
/// let receipt = service.create_receipt(request).await?;
/// ```
#[derive(Debug, Clone)]
pub struct PharmacyService {
    db: Database,
    restore_policy: RestorePolicy,
}

impl PharmacyService {
    /// Creates a service with the default (best-effort) restore policy.
    pub fn new(db: Database) -> Self {
        PharmacyService {
            db,
            restore_policy: RestorePolicy::default(),
        }
    }

    /// Overrides the restore policy applied by receipt update/delete.
    ///
    /// `Strict` refuses any edit whose reversal references a vanished batch;
    /// `BestEffort` (default) skips those restorations and reports them.
    pub fn with_restore_policy(mut self, policy: RestorePolicy) -> Self {
        self.restore_policy = policy;
        self
    }

    /// The restore policy currently in effect.
    pub fn restore_policy(&self) -> RestorePolicy {
        self.restore_policy
    }

    /// The underlying database handle (for plain repository reads).
    pub fn database(&self) -> &Database {
        &self.db
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// The prune-if-empty policy: a medicine whose last batch is gone is deleted
/// entirely rather than kept as a skeleton record ("don't keep records with
/// no stock"). Returns true when the medicine was pruned; callers must treat
/// it as gone.
///
/// Kept as a named, single-purpose function so it can be swapped for a
/// soft-delete/archive strategy without touching the reconciliation logic.
pub(crate) async fn prune_if_empty(
    conn: &mut SqliteConnection,
    medicine: &Medicine,
) -> DbResult<bool> {
    if medicine.is_depleted() {
        medicine::delete(conn, &medicine.id).await?;
        return Ok(true);
    }
    Ok(false)
}

/// Persists every touched ledger, applying [`prune_if_empty`] to each.
pub(crate) async fn persist_ledgers(
    conn: &mut SqliteConnection,
    medicines: HashMap<String, Medicine>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    for (_, mut med) in medicines {
        if !prune_if_empty(conn, &med).await? {
            med.updated_at = now;
            medicine::update(conn, &med).await?;
        }
    }
    Ok(())
}

/// Fetches the distinct medicines referenced by an id iterator into a map.
///
/// Missing ids are simply absent from the map; the pure pricing/restore
/// functions decide whether absence is an error (pricing) or a policy
/// matter (restoration).
pub(crate) async fn fetch_referenced_medicines<'a>(
    conn: &mut SqliteConnection,
    ids: impl Iterator<Item = &'a str>,
) -> DbResult<HashMap<String, Medicine>> {
    let mut medicines = HashMap::new();
    for id in ids {
        if medicines.contains_key(id) {
            continue;
        }
        if let Some(med) = medicine::fetch(conn, id).await? {
            medicines.insert(med.id.clone(), med);
        }
    }
    Ok(medicines)
}

/// UTC day bounds `[start, end)` containing `now`.
pub(crate) fn utc_day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_utc_day_bounds() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 15, 30, 45).unwrap();
        let (start, end) = utc_day_bounds(now);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 8, 8, 0, 0, 0).unwrap());
        assert!(start <= now && now < end);
    }
}
