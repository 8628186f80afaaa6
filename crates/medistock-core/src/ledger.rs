//! # Batch Ledger
//!
//! Mutation primitives for a medicine's batch ledger.
//!
//! ## The Ledger Is The Source Of Truth
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Batch Ledger Invariants                            │
//! │                                                                         │
//! │  Medicine "Paracetamol / Acetaminophen / BrandX"                       │
//! │  ├── Batch B1  expiry 2027-06  price 200  quantity 100                 │
//! │  └── Batch B2  expiry 2027-09  price 250  quantity  30                 │
//! │                                                                         │
//! │  current_stock = 130  ◄── ALWAYS Σ batch.quantity, recomputed after    │
//! │                           every mutation, never written on its own     │
//! │                                                                         │
//! │  • No batch quantity is ever negative                                  │
//! │  • A batch reaching exactly zero is REMOVED, not kept at zero          │
//! │  • A medicine whose last batch is removed is deleted by the caller     │
//! │    (prune-if-empty policy, see service layer)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All operations here are pure in-memory mutations. Persisting the changed
//! medicine (and pruning it when depleted) is the service layer's job, inside
//! a single database transaction.

use crate::error::{CoreError, CoreResult};
use crate::types::{Batch, BatchSpec, Medicine};

// =============================================================================
// Intake Outcome
// =============================================================================

/// How an intake landed on the ledger.
///
/// Mirrors the three-tier reconciliation policy: merge into an existing lot,
/// append a new lot, or (decided by the service layer when no medicine
/// matches) create a whole new medicine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Exact identity match - quantity added to an existing batch.
    MergedBatch,
    /// Medicine matched but batch identity differed - new batch appended.
    AppendedBatch,
    /// No medicine matched - a new record was created.
    CreatedMedicine,
}

// =============================================================================
// Ledger Operations
// =============================================================================

impl Medicine {
    /// Finds a batch by its number.
    pub fn find_batch(&self, batch_number: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.batch_number == batch_number)
    }

    /// Finds a batch by its number, mutably.
    pub fn find_batch_mut(&mut self, batch_number: &str) -> Option<&mut Batch> {
        self.batches
            .iter_mut()
            .find(|b| b.batch_number == batch_number)
    }

    /// Applies a quantity delta to a batch.
    ///
    /// ## Behavior
    /// - Result would go negative → `InsufficientStock`, ledger untouched
    /// - Result is exactly zero → batch removed from the ledger
    /// - `current_stock` recomputed after any change
    ///
    /// ## Arguments
    /// * `batch_number` - Which batch to adjust
    /// * `delta` - Negative for sales, positive for restocking/reversal
    pub fn adjust_quantity(&mut self, batch_number: &str, delta: i64) -> CoreResult<()> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.batch_number == batch_number)
            .ok_or_else(|| CoreError::BatchNotFound {
                medicine_id: self.id.clone(),
                batch_number: batch_number.to_string(),
            })?;

        let new_quantity = batch.quantity + delta;
        if new_quantity < 0 {
            return Err(CoreError::InsufficientStock {
                batch_number: batch_number.to_string(),
                available: batch.quantity,
                requested: -delta,
            });
        }

        if new_quantity == 0 {
            self.batches.retain(|b| b.batch_number != batch_number);
        } else {
            batch.quantity = new_quantity;
        }

        self.recompute_current_stock();
        Ok(())
    }

    /// Merges an intake into an existing batch or appends a new one.
    ///
    /// ## Matching
    /// - Same (batch_number, expiry, price) → quantity incremented (`MergedBatch`)
    /// - Batch number unused → new batch appended (`AppendedBatch`)
    /// - Batch number taken with different expiry/price → `DuplicateBatch`
    pub fn merge_or_append_batch(
        &mut self,
        spec: &BatchSpec,
        quantity: i64,
    ) -> CoreResult<IntakeOutcome> {
        if let Some(batch) = self.find_batch_mut(&spec.batch_number) {
            if !batch.matches_spec(spec) {
                return Err(CoreError::DuplicateBatch {
                    batch_number: spec.batch_number.clone(),
                });
            }
            batch.quantity += quantity;
            self.recompute_current_stock();
            return Ok(IntakeOutcome::MergedBatch);
        }

        self.batches.push(Batch::new(
            spec.batch_number.clone(),
            spec.expiry_date,
            spec.price_cents,
            quantity,
        ));
        self.recompute_current_stock();
        Ok(IntakeOutcome::AppendedBatch)
    }

    /// Sets a batch's quantity directly (catalog maintenance).
    ///
    /// Zero removes the batch, consistent with [`Medicine::adjust_quantity`].
    pub fn set_batch_quantity(&mut self, batch_number: &str, quantity: i64) -> CoreResult<()> {
        if quantity < 0 {
            return Err(CoreError::InsufficientStock {
                batch_number: batch_number.to_string(),
                available: self
                    .find_batch(batch_number)
                    .map(|b| b.quantity)
                    .unwrap_or(0),
                requested: quantity,
            });
        }

        let medicine_id = self.id.clone();
        let batch =
            self.find_batch_mut(batch_number)
                .ok_or_else(|| CoreError::BatchNotFound {
                    medicine_id,
                    batch_number: batch_number.to_string(),
                })?;

        if quantity == 0 {
            self.batches.retain(|b| b.batch_number != batch_number);
        } else {
            batch.quantity = quantity;
        }

        self.recompute_current_stock();
        Ok(())
    }

    /// Removes a batch from the ledger, returning it.
    pub fn remove_batch(&mut self, batch_number: &str) -> CoreResult<Batch> {
        let idx = self
            .batches
            .iter()
            .position(|b| b.batch_number == batch_number)
            .ok_or_else(|| CoreError::BatchNotFound {
                medicine_id: self.id.clone(),
                batch_number: batch_number.to_string(),
            })?;

        let removed = self.batches.remove(idx);
        self.recompute_current_stock();
        Ok(removed)
    }

    /// Recomputes `current_stock` from the batch ledger.
    ///
    /// Called internally after every mutation; public so catalog-maintenance
    /// paths that edit batch fields directly can re-establish the invariant.
    pub fn recompute_current_stock(&mut self) {
        self.current_stock = self.batches.iter().map(|b| b.quantity).sum();
    }

    /// Checks whether the ledger is empty.
    ///
    /// A depleted medicine is deleted entirely by the service layer
    /// (`prune_if_empty`): identity is not retained once stock is fully
    /// consumed.
    #[inline]
    pub fn is_depleted(&self) -> bool {
        self.batches.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn expiry(month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2027, month, 1, 0, 0, 0).unwrap()
    }

    fn medicine() -> Medicine {
        let mut med = Medicine::with_initial_batch(
            "med-1".to_string(),
            "Paracetamol".to_string(),
            "Acetaminophen".to_string(),
            "BrandX".to_string(),
            Batch::new("B1".to_string(), expiry(6), 200, 100),
            Utc::now(),
        );
        med.merge_or_append_batch(
            &BatchSpec {
                batch_number: "B2".to_string(),
                expiry_date: expiry(9),
                price_cents: 250,
            },
            30,
        )
        .unwrap();
        med
    }

    fn assert_stock_invariant(med: &Medicine) {
        let sum: i64 = med.batches.iter().map(|b| b.quantity).sum();
        assert_eq!(med.current_stock, sum, "current_stock must equal Σ batches");
    }

    #[test]
    fn test_adjust_quantity_depletes_and_recomputes() {
        let mut med = medicine();
        assert_eq!(med.current_stock, 130);

        med.adjust_quantity("B1", -40).unwrap();
        assert_eq!(med.find_batch("B1").unwrap().quantity, 60);
        assert_eq!(med.current_stock, 90);
        assert_stock_invariant(&med);
    }

    #[test]
    fn test_adjust_quantity_restores() {
        let mut med = medicine();
        med.adjust_quantity("B1", -40).unwrap();
        med.adjust_quantity("B1", 40).unwrap();

        assert_eq!(med.find_batch("B1").unwrap().quantity, 100);
        assert_eq!(med.current_stock, 130);
        assert_stock_invariant(&med);
    }

    #[test]
    fn test_over_depletion_fails_and_leaves_ledger_unchanged() {
        let mut med = medicine();
        let before = med.clone();

        let err = med.adjust_quantity("B1", -160).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                batch_number,
                available,
                requested,
            } => {
                assert_eq!(batch_number, "B1");
                assert_eq!(available, 100);
                assert_eq!(requested, 160);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(med, before);
    }

    #[test]
    fn test_depleting_to_zero_removes_batch() {
        let mut med = medicine();
        med.adjust_quantity("B2", -30).unwrap();

        assert!(med.find_batch("B2").is_none());
        assert_eq!(med.batches.len(), 1);
        assert_eq!(med.current_stock, 100);
        assert_stock_invariant(&med);
    }

    #[test]
    fn test_depleting_last_batch_marks_medicine_depleted() {
        let mut med = medicine();
        med.adjust_quantity("B1", -100).unwrap();
        med.adjust_quantity("B2", -30).unwrap();

        assert!(med.is_depleted());
        assert_eq!(med.current_stock, 0);
    }

    #[test]
    fn test_adjust_unknown_batch_fails() {
        let mut med = medicine();
        let err = med.adjust_quantity("B9", -1).unwrap_err();
        assert!(matches!(err, CoreError::BatchNotFound { .. }));
    }

    #[test]
    fn test_merge_on_exact_identity() {
        let mut med = medicine();
        let outcome = med
            .merge_or_append_batch(
                &BatchSpec {
                    batch_number: "B1".to_string(),
                    expiry_date: expiry(6),
                    price_cents: 200,
                },
                50,
            )
            .unwrap();

        assert_eq!(outcome, IntakeOutcome::MergedBatch);
        assert_eq!(med.find_batch("B1").unwrap().quantity, 150);
        assert_eq!(med.batches.len(), 2);
        assert_eq!(med.current_stock, 180);
        assert_stock_invariant(&med);
    }

    #[test]
    fn test_append_on_new_batch_number() {
        let mut med = medicine();
        let outcome = med
            .merge_or_append_batch(
                &BatchSpec {
                    batch_number: "B3".to_string(),
                    expiry_date: expiry(12),
                    price_cents: 300,
                },
                25,
            )
            .unwrap();

        assert_eq!(outcome, IntakeOutcome::AppendedBatch);
        assert_eq!(med.batches.len(), 3);
        assert_eq!(med.current_stock, 155);
        assert_stock_invariant(&med);
    }

    #[test]
    fn test_duplicate_batch_number_with_different_identity_rejected() {
        let mut med = medicine();
        let err = med
            .merge_or_append_batch(
                &BatchSpec {
                    batch_number: "B1".to_string(),
                    expiry_date: expiry(6),
                    price_cents: 999, // same number, different price
                },
                50,
            )
            .unwrap_err();

        assert!(matches!(err, CoreError::DuplicateBatch { .. }));
        assert_eq!(med.find_batch("B1").unwrap().quantity, 100);
    }

    #[test]
    fn test_set_batch_quantity() {
        let mut med = medicine();
        med.set_batch_quantity("B1", 77).unwrap();
        assert_eq!(med.find_batch("B1").unwrap().quantity, 77);
        assert_eq!(med.current_stock, 107);

        // Zero removes the batch
        med.set_batch_quantity("B1", 0).unwrap();
        assert!(med.find_batch("B1").is_none());
        assert_stock_invariant(&med);
    }

    #[test]
    fn test_remove_batch() {
        let mut med = medicine();
        let removed = med.remove_batch("B2").unwrap();
        assert_eq!(removed.quantity, 30);
        assert_eq!(med.batches.len(), 1);
        assert_eq!(med.current_stock, 100);
        assert_stock_invariant(&med);
    }

    /// Invariant holds across an arbitrary mixed operation sequence.
    #[test]
    fn test_invariant_across_operation_sequence() {
        let mut med = medicine();

        let spec_b3 = BatchSpec {
            batch_number: "B3".to_string(),
            expiry_date: expiry(3),
            price_cents: 120,
        };

        med.merge_or_append_batch(&spec_b3, 10).unwrap();
        assert_stock_invariant(&med);

        med.adjust_quantity("B1", -99).unwrap();
        assert_stock_invariant(&med);

        med.adjust_quantity("B1", -1).unwrap(); // removes B1 at zero
        assert_stock_invariant(&med);
        assert!(med.find_batch("B1").is_none());

        med.merge_or_append_batch(&spec_b3, 5).unwrap(); // merge again
        assert_stock_invariant(&med);

        med.remove_batch("B2").unwrap();
        assert_stock_invariant(&med);

        assert_eq!(med.current_stock, 15);
    }
}
