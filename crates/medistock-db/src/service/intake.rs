//! # Stock Reconciliation Engine
//!
//! Resolves incoming stock intakes against existing records, plus the batch
//! maintenance operations (edit/remove a batch by medicine name + number).
//!
//! ## Three-Tier Matching Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Intake: (name, generic, brand, batch_number, expiry, price, qty)      │
//! │                                                                         │
//! │  1. EXACT MATCH                                                        │
//! │     medicine identity + full batch identity all equal                  │
//! │     └──► increment that batch's quantity          (MergedBatch)        │
//! │                                                                         │
//! │  2. PARTIAL MATCH                                                      │
//! │     medicine identity equal, batch identity differs                    │
//! │     └──► append a new batch to that medicine      (AppendedBatch)      │
//! │                                                                         │
//! │  3. NO MATCH                                                           │
//! │     └──► create a new medicine with one batch     (CreatedMedicine)    │
//! │                                                                         │
//! │  Same drug concept accumulates stock across deliveries while distinct  │
//! │  lots (different expiry/price) stay separately trackable, so sales     │
//! │  can deplete FIFO by batch.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::DbError;
use crate::repository::medicine;
use crate::service::{prune_if_empty, PharmacyService, ServiceResult};
use medistock_core::validation::{
    validate_batch_number, validate_intake, validate_min_stock_level, validate_name,
    validate_price_cents,
};
use medistock_core::{Batch, CoreError, IntakeOutcome, Medicine, StockIntake};

// =============================================================================
// DTOs
// =============================================================================

/// Result of a stock intake: the medicine as persisted and how the intake
/// landed on it.
#[derive(Debug, Clone)]
pub struct IntakeReport {
    pub medicine: Medicine,
    pub outcome: IntakeOutcome,
}

/// Partial update for a batch (and its medicine's mutable identity fields).
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchUpdate {
    pub generic: Option<String>,
    pub brand: Option<String>,
    pub price_cents: Option<i64>,
    pub quantity: Option<i64>,
    pub expiry_date: Option<chrono::DateTime<Utc>>,
    pub min_stock_level: Option<i64>,
}

/// Result of removing a batch.
#[derive(Debug, Clone)]
pub struct RemovedBatch {
    pub batch: Batch,
    /// True when the removed batch was the medicine's last and the whole
    /// record was pruned.
    pub medicine_deleted: bool,
}

// =============================================================================
// Operations
// =============================================================================

impl PharmacyService {
    /// Records a stock intake, reconciling it against existing records.
    ///
    /// Validation rejects the request before any mutation. The
    /// fetch-mutate-save sequence runs in one transaction; the medicine
    /// write is version-checked.
    pub async fn record_intake(&self, intake: StockIntake) -> ServiceResult<IntakeReport> {
        validate_intake(&intake).map_err(CoreError::from)?;

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;
        let now = Utc::now();

        let report = match medicine::fetch_by_identity(
            &mut tx,
            &intake.name,
            &intake.generic,
            &intake.brand,
        )
        .await?
        {
            Some(mut med) => {
                let outcome = med.merge_or_append_batch(&intake.batch_spec(), intake.quantity)?;
                med.updated_at = now;
                medicine::update(&mut tx, &med).await?;
                IntakeReport {
                    medicine: med,
                    outcome,
                }
            }
            None => {
                let mut med = Medicine::with_initial_batch(
                    medicine::generate_medicine_id(),
                    intake.name.clone(),
                    intake.generic.clone(),
                    intake.brand.clone(),
                    Batch::new(
                        intake.batch_number.clone(),
                        intake.expiry_date,
                        intake.price_cents,
                        intake.quantity,
                    ),
                    now,
                );
                med.category = intake.category.clone();
                med.form = intake.form.clone();
                med.strength = intake.strength.clone();
                if let Some(level) = intake.min_stock_level {
                    med.min_stock_level = level;
                }
                medicine::insert(&mut tx, &med).await?;
                IntakeReport {
                    medicine: med,
                    outcome: IntakeOutcome::CreatedMedicine,
                }
            }
        };

        tx.commit().await.map_err(DbError::from)?;

        info!(
            medicine_id = %report.medicine.id,
            name = %report.medicine.name,
            batch = %intake.batch_number,
            quantity = intake.quantity,
            outcome = ?report.outcome,
            stock = report.medicine.current_stock,
            "Stock intake recorded"
        );

        Ok(report)
    }

    /// Updates a batch (and medicine-level generic/brand) addressed by
    /// medicine name + batch number.
    ///
    /// Setting the quantity to zero removes the batch; if it was the last
    /// one, the medicine itself is pruned and `None` is returned.
    pub async fn update_batch(
        &self,
        name: &str,
        batch_number: &str,
        update: BatchUpdate,
    ) -> ServiceResult<Option<Medicine>> {
        validate_name("name", name).map_err(CoreError::from)?;
        validate_batch_number(batch_number).map_err(CoreError::from)?;
        if let Some(price) = update.price_cents {
            validate_price_cents(price).map_err(CoreError::from)?;
        }
        if let Some(level) = update.min_stock_level {
            validate_min_stock_level(level).map_err(CoreError::from)?;
        }

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;
        let now = Utc::now();

        let mut med = medicine::fetch_by_name_and_batch(&mut tx, name, batch_number)
            .await?
            .ok_or_else(|| CoreError::MedicineNotFound(name.to_string()))?;

        if let Some(generic) = update.generic {
            validate_name("generic", &generic).map_err(CoreError::from)?;
            med.generic = generic;
        }
        if let Some(brand) = update.brand {
            validate_name("brand", &brand).map_err(CoreError::from)?;
            med.brand = brand;
        }
        if let Some(level) = update.min_stock_level {
            med.min_stock_level = level;
        }

        {
            let medicine_id = med.id.clone();
            let batch = med
                .find_batch_mut(batch_number)
                .ok_or_else(|| CoreError::BatchNotFound {
                    medicine_id,
                    batch_number: batch_number.to_string(),
                })?;
            if let Some(price) = update.price_cents {
                batch.price_cents = price;
            }
            if let Some(expiry) = update.expiry_date {
                batch.expiry_date = expiry;
            }
        }

        if let Some(quantity) = update.quantity {
            med.set_batch_quantity(batch_number, quantity)?;
        } else {
            med.recompute_current_stock();
        }

        let result = if prune_if_empty(&mut tx, &med).await? {
            debug!(medicine_id = %med.id, "Last batch removed, medicine pruned");
            None
        } else {
            med.updated_at = now;
            medicine::update(&mut tx, &med).await?;
            Some(med)
        };

        tx.commit().await.map_err(DbError::from)?;

        info!(name = %name, batch = %batch_number, "Batch updated");
        Ok(result)
    }

    /// Removes a batch addressed by medicine name + batch number.
    ///
    /// Removing the last batch prunes the whole medicine record.
    pub async fn remove_batch(
        &self,
        name: &str,
        batch_number: &str,
    ) -> ServiceResult<RemovedBatch> {
        validate_name("name", name).map_err(CoreError::from)?;
        validate_batch_number(batch_number).map_err(CoreError::from)?;

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;
        let now = Utc::now();

        let mut med = medicine::fetch_by_name_and_batch(&mut tx, name, batch_number)
            .await?
            .ok_or_else(|| CoreError::MedicineNotFound(name.to_string()))?;

        let batch = med.remove_batch(batch_number)?;

        let medicine_deleted = if prune_if_empty(&mut tx, &med).await? {
            true
        } else {
            med.updated_at = now;
            medicine::update(&mut tx, &med).await?;
            false
        };

        tx.commit().await.map_err(DbError::from)?;

        info!(
            name = %name,
            batch = %batch_number,
            medicine_deleted,
            "Batch removed"
        );

        Ok(RemovedBatch {
            batch,
            medicine_deleted,
        })
    }
}
