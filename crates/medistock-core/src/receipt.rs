//! # Receipt Pricing & Reversal
//!
//! The pure half of the receipt transaction manager: turning requested
//! (medicine, batch, quantity) lines into validated, priced lines, applying
//! their depletion to the batch ledgers, and reversing a prior receipt's
//! effect.
//!
//! ## Two-Phase Write Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Create / Update a Receipt                           │
//! │                                                                         │
//! │  1. price_lines()    ── validate EVERY line before touching stock      │
//! │         │               (missing medicine/batch, cumulative            │
//! │         │                availability), snapshot names + prices        │
//! │         ▼                                                              │
//! │  2. apply_lines()    ── deplete batches in request order               │
//! │         │                                                              │
//! │         ▼                                                              │
//! │  3. service layer persists medicines + receipt in ONE transaction      │
//! │                                                                         │
//! │  Update/delete first run restore_lines() to put back what the          │
//! │  previous version of the receipt took out.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pricing snapshots the unit price at transaction time. Later catalog edits
//! never retroactively change a stored receipt.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{LineRequest, Medicine, ReceiptLine};
use crate::{MAX_ITEM_QUANTITY, MAX_RECEIPT_LINES};

// =============================================================================
// Restore Policy
// =============================================================================

/// What to do when a reversal references a batch that no longer exists
/// (fully depleted, possibly with its medicine pruned).
///
/// ## Trade-off
/// `BestEffort` matches the historical behavior: stock restoration is
/// skipped for vanished batches and the skip is *reported*, not hidden.
/// `Strict` refuses the whole edit instead, guaranteeing receipts and
/// ledger history never desynchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePolicy {
    /// Fail the whole reversal when any referenced batch is gone.
    Strict,
    /// Skip restoration for vanished batches and report the skips.
    BestEffort,
}

impl Default for RestorePolicy {
    fn default() -> Self {
        RestorePolicy::BestEffort
    }
}

/// A restoration that could not be applied because its batch (or whole
/// medicine) no longer exists. Surfaced to the caller for logging or manual
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRestore {
    pub medicine_id: String,
    pub batch_number: String,
    pub quantity: i64,
}

// =============================================================================
// Priced Line
// =============================================================================

/// A validated, priced line ready to be applied and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub medicine_id: String,
    pub batch_number: String,
    pub name_snapshot: String,
    pub generic_snapshot: String,
    pub brand_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

impl PricedLine {
    /// Converts into a persistable receipt line with the given id.
    pub fn into_receipt_line(self, id: String) -> ReceiptLine {
        ReceiptLine {
            id,
            medicine_id: self.medicine_id,
            batch_number: self.batch_number,
            name_snapshot: self.name_snapshot,
            generic_snapshot: self.generic_snapshot,
            brand_snapshot: self.brand_snapshot,
            unit_price_cents: self.unit_price_cents,
            quantity: self.quantity,
            line_total_cents: self.line_total_cents,
        }
    }
}

// =============================================================================
// Pricing (validate-all-first)
// =============================================================================

/// Validates and prices every requested line against the fetched medicines.
///
/// ## Fail-Fast Contract
/// Nothing is mutated here. Every line must pass before the caller applies
/// any depletion:
/// - medicine present in `medicines` → else `MedicineNotFound`
/// - batch present in that medicine → else `BatchNotFound`
/// - quantity positive and within bounds → else `Validation`
/// - batch holds enough stock for the *cumulative* demand across all lines
///   referencing it → else `InsufficientStock` (available vs requested)
///
/// ## Why Cumulative?
/// Two lines asking 80 + 80 from a 100-unit batch each pass a naive
/// per-line check but cannot both be fulfilled. Summing demand per batch
/// catches this before any stock moves.
pub fn price_lines(
    medicines: &HashMap<String, Medicine>,
    requests: &[LineRequest],
) -> CoreResult<Vec<PricedLine>> {
    if requests.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        }
        .into());
    }
    if requests.len() > MAX_RECEIPT_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_RECEIPT_LINES as i64,
        }
        .into());
    }

    // Cumulative demand per (medicine, batch)
    let mut demand: HashMap<(&str, &str), i64> = HashMap::new();
    let mut priced = Vec::with_capacity(requests.len());

    for request in requests {
        if request.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        if request.quantity > MAX_ITEM_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_ITEM_QUANTITY,
            }
            .into());
        }

        let medicine = medicines
            .get(&request.medicine_id)
            .ok_or_else(|| CoreError::MedicineNotFound(request.medicine_id.clone()))?;

        let batch = medicine.find_batch(&request.batch_number).ok_or_else(|| {
            CoreError::BatchNotFound {
                medicine_id: medicine.id.clone(),
                batch_number: request.batch_number.clone(),
            }
        })?;

        let requested_so_far = demand
            .entry((medicine.id.as_str(), batch.batch_number.as_str()))
            .or_insert(0);
        *requested_so_far += request.quantity;

        if batch.quantity < *requested_so_far {
            return Err(CoreError::InsufficientStock {
                batch_number: batch.batch_number.clone(),
                available: batch.quantity,
                requested: *requested_so_far,
            });
        }

        priced.push(PricedLine {
            medicine_id: medicine.id.clone(),
            batch_number: batch.batch_number.clone(),
            name_snapshot: medicine.name.clone(),
            generic_snapshot: medicine.generic.clone(),
            brand_snapshot: medicine.brand.clone(),
            unit_price_cents: batch.price_cents,
            quantity: request.quantity,
            line_total_cents: batch.price_cents * request.quantity,
        });
    }

    Ok(priced)
}

/// Applies the depletion of priced lines to the ledgers, in request order.
///
/// Must only be called with the output of [`price_lines`] over the same
/// medicines map; under that contract it cannot fail, but errors are still
/// propagated rather than swallowed.
pub fn apply_lines(
    medicines: &mut HashMap<String, Medicine>,
    lines: &[PricedLine],
) -> CoreResult<()> {
    for line in lines {
        let medicine = medicines
            .get_mut(&line.medicine_id)
            .ok_or_else(|| CoreError::MedicineNotFound(line.medicine_id.clone()))?;
        medicine.adjust_quantity(&line.batch_number, -line.quantity)?;
    }
    Ok(())
}

// =============================================================================
// Reversal
// =============================================================================

/// Restores the stock a stored receipt previously took out.
///
/// For every line, attempts `adjust_quantity(+quantity)` on the referenced
/// batch. When the batch no longer exists (its medicine was pruned after
/// full depletion, or the batch itself was removed at zero):
/// - `BestEffort`: the restoration is skipped and recorded in the returned
///   list - the ONLY place in the core where a failure is deliberately not
///   propagated
/// - `Strict`: the whole reversal fails, blocking the edit
///
/// The total of a receipt is never recomputed here; reversal touches stock
/// only.
pub fn restore_lines(
    medicines: &mut HashMap<String, Medicine>,
    lines: &[ReceiptLine],
    policy: RestorePolicy,
) -> CoreResult<Vec<SkippedRestore>> {
    let mut skipped = Vec::new();

    for line in lines {
        let medicine = match medicines.get_mut(&line.medicine_id) {
            Some(m) => m,
            None => match policy {
                RestorePolicy::BestEffort => {
                    skipped.push(SkippedRestore {
                        medicine_id: line.medicine_id.clone(),
                        batch_number: line.batch_number.clone(),
                        quantity: line.quantity,
                    });
                    continue;
                }
                RestorePolicy::Strict => {
                    return Err(CoreError::MedicineNotFound(line.medicine_id.clone()))
                }
            },
        };

        if medicine.find_batch(&line.batch_number).is_none() {
            match policy {
                RestorePolicy::BestEffort => {
                    skipped.push(SkippedRestore {
                        medicine_id: line.medicine_id.clone(),
                        batch_number: line.batch_number.clone(),
                        quantity: line.quantity,
                    });
                    continue;
                }
                RestorePolicy::Strict => {
                    return Err(CoreError::BatchNotFound {
                        medicine_id: line.medicine_id.clone(),
                        batch_number: line.batch_number.clone(),
                    })
                }
            }
        }

        medicine.adjust_quantity(&line.batch_number, line.quantity)?;
    }

    Ok(skipped)
}

// =============================================================================
// Sale Totals
// =============================================================================

/// Subtotal/tax/discount accounting for a pharmacy sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

/// Computes sale totals from priced lines and flat tax/discount amounts.
///
/// `total = subtotal + tax - discount`; tax and discount must be
/// non-negative and the discount may not push the total below zero.
pub fn sale_totals(
    lines: &[PricedLine],
    tax_cents: i64,
    discount_cents: i64,
) -> CoreResult<SaleTotals> {
    if tax_cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "tax".to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }
    if discount_cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }

    let subtotal_cents: i64 = lines.iter().map(|l| l.line_total_cents).sum();
    let total_cents = subtotal_cents + tax_cents - discount_cents;

    if total_cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: subtotal_cents + tax_cents,
        }
        .into());
    }

    Ok(SaleTotals {
        subtotal_cents,
        tax_cents,
        discount_cents,
        total_cents,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Batch, BatchSpec};
    use chrono::{DateTime, TimeZone, Utc};

    fn expiry() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2027, 6, 30, 0, 0, 0).unwrap()
    }

    fn fixture() -> HashMap<String, Medicine> {
        let mut paracetamol = Medicine::with_initial_batch(
            "med-1".to_string(),
            "Paracetamol".to_string(),
            "Acetaminophen".to_string(),
            "BrandX".to_string(),
            Batch::new("B1".to_string(), expiry(), 200, 150),
            Utc::now(),
        );
        paracetamol
            .merge_or_append_batch(
                &BatchSpec {
                    batch_number: "B2".to_string(),
                    expiry_date: expiry(),
                    price_cents: 250,
                },
                30,
            )
            .unwrap();

        let ibuprofen = Medicine::with_initial_batch(
            "med-2".to_string(),
            "Ibuprofen".to_string(),
            "Ibuprofen".to_string(),
            "BrandY".to_string(),
            Batch::new("C1".to_string(), expiry(), 150, 40),
            Utc::now(),
        );

        let mut map = HashMap::new();
        map.insert(paracetamol.id.clone(), paracetamol);
        map.insert(ibuprofen.id.clone(), ibuprofen);
        map
    }

    fn request(medicine_id: &str, batch: &str, quantity: i64) -> LineRequest {
        LineRequest {
            medicine_id: medicine_id.to_string(),
            batch_number: batch.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_price_lines_snapshots_and_totals() {
        let medicines = fixture();
        let priced = price_lines(
            &medicines,
            &[request("med-1", "B1", 50), request("med-2", "C1", 2)],
        )
        .unwrap();

        assert_eq!(priced.len(), 2);
        assert_eq!(priced[0].name_snapshot, "Paracetamol");
        assert_eq!(priced[0].unit_price_cents, 200);
        assert_eq!(priced[0].line_total_cents, 10_000);
        assert_eq!(priced[1].line_total_cents, 300);

        // Pricing never mutates stock
        assert_eq!(medicines["med-1"].current_stock, 180);
    }

    #[test]
    fn test_price_lines_insufficient_stock() {
        let medicines = fixture();
        let err = price_lines(&medicines, &[request("med-1", "B1", 160)]).unwrap_err();

        match err {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 150);
                assert_eq!(requested, 160);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn test_price_lines_cumulative_demand_on_one_batch() {
        let medicines = fixture();
        // 80 + 80 = 160 > 150, even though each line alone would fit
        let err = price_lines(
            &medicines,
            &[request("med-1", "B1", 80), request("med-1", "B1", 80)],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 150,
                requested: 160,
                ..
            }
        ));
    }

    #[test]
    fn test_price_lines_rejects_unknown_medicine_and_batch() {
        let medicines = fixture();

        let err = price_lines(&medicines, &[request("med-9", "B1", 1)]).unwrap_err();
        assert!(matches!(err, CoreError::MedicineNotFound(_)));

        let err = price_lines(&medicines, &[request("med-1", "B9", 1)]).unwrap_err();
        assert!(matches!(err, CoreError::BatchNotFound { .. }));
    }

    #[test]
    fn test_price_lines_rejects_bad_quantities_and_empty_requests() {
        let medicines = fixture();

        let err = price_lines(&medicines, &[]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = price_lines(&medicines, &[request("med-1", "B1", 0)]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = price_lines(&medicines, &[request("med-1", "B1", -5)]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_apply_lines_depletes_in_order() {
        let mut medicines = fixture();
        let priced = price_lines(&medicines, &[request("med-1", "B1", 50)]).unwrap();

        apply_lines(&mut medicines, &priced).unwrap();

        let med = &medicines["med-1"];
        assert_eq!(med.find_batch("B1").unwrap().quantity, 100);
        assert_eq!(med.current_stock, 130);
    }

    #[test]
    fn test_apply_then_restore_round_trips() {
        let mut medicines = fixture();
        let before = medicines.clone();

        let priced = price_lines(
            &medicines,
            &[request("med-1", "B1", 50), request("med-2", "C1", 10)],
        )
        .unwrap();
        apply_lines(&mut medicines, &priced).unwrap();

        let lines: Vec<ReceiptLine> = priced
            .into_iter()
            .enumerate()
            .map(|(i, p)| p.into_receipt_line(format!("line-{i}")))
            .collect();

        let skipped =
            restore_lines(&mut medicines, &lines, RestorePolicy::BestEffort).unwrap();

        assert!(skipped.is_empty());
        for (id, med) in &before {
            assert_eq!(medicines[id].current_stock, med.current_stock);
            assert_eq!(medicines[id].batches, med.batches);
        }
    }

    #[test]
    fn test_restore_best_effort_skips_vanished_batch() {
        let mut medicines = fixture();

        // Deplete C1 fully; med-2 becomes depleted and would be pruned
        let priced = price_lines(&medicines, &[request("med-2", "C1", 40)]).unwrap();
        apply_lines(&mut medicines, &priced).unwrap();
        assert!(medicines["med-2"].is_depleted());
        medicines.remove("med-2"); // simulate prune_if_empty

        let lines: Vec<ReceiptLine> = priced
            .into_iter()
            .map(|p| p.into_receipt_line("line-0".to_string()))
            .collect();

        let skipped =
            restore_lines(&mut medicines, &lines, RestorePolicy::BestEffort).unwrap();

        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].batch_number, "C1");
        assert_eq!(skipped[0].quantity, 40);
    }

    #[test]
    fn test_restore_strict_fails_on_vanished_batch() {
        let mut medicines = fixture();

        let priced = price_lines(&medicines, &[request("med-2", "C1", 40)]).unwrap();
        apply_lines(&mut medicines, &priced).unwrap();
        medicines.remove("med-2");

        let lines: Vec<ReceiptLine> = priced
            .into_iter()
            .map(|p| p.into_receipt_line("line-0".to_string()))
            .collect();

        let err = restore_lines(&mut medicines, &lines, RestorePolicy::Strict).unwrap_err();
        assert!(matches!(err, CoreError::MedicineNotFound(_)));
    }

    #[test]
    fn test_sale_totals() {
        let medicines = fixture();
        let priced = price_lines(&medicines, &[request("med-1", "B1", 10)]).unwrap();

        let totals = sale_totals(&priced, 100, 50).unwrap();
        assert_eq!(totals.subtotal_cents, 2000);
        assert_eq!(totals.total_cents, 2050);

        let err = sale_totals(&priced, 0, 5000).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = sale_totals(&priced, -1, 0).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
