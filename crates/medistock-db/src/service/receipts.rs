//! # Receipt Transaction Manager
//!
//! Create, update and delete patient receipts, keeping the batch ledgers and
//! the receipt history consistent.
//!
//! ## Reverse-Then-Apply (update in place)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update_receipt(id, new_lines)                                          │
//! │                                                                         │
//! │  BEGIN TRANSACTION                                                     │
//! │    1. fetch stored receipt                                             │
//! │    2. restore_lines(stored.lines)  ← put back what it took out         │
//! │       └── vanished batch? policy decides: skip+report / fail edit      │
//! │    3. price_lines(new_lines)       ← validate ALL before mutating      │
//! │    4. apply_lines(new_lines)       ← deplete in request order          │
//! │    5. persist ledgers (version-checked, prune-if-empty)                │
//! │    6. replace receipt lines + total                                    │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  The two phases are never interleaved with other writers: the whole    │
//! │  sequence is one transaction.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::DbError;
use crate::repository::receipt::{self, generate_line_id, generate_receipt_id};
use crate::service::{
    fetch_referenced_medicines, persist_ledgers, PharmacyService, ServiceResult,
};
use medistock_core::receipt::{apply_lines, price_lines, restore_lines};
use medistock_core::validation::validate_name;
use medistock_core::{CoreError, LineRequest, Receipt, SkippedRestore};

// =============================================================================
// DTOs
// =============================================================================

/// Request to create a receipt, or to replace one in full (update).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReceiptRequest {
    pub patient_id: String,
    pub lines: Vec<LineRequest>,
    /// Defaults to now when absent.
    pub receipt_date: Option<DateTime<Utc>>,
}

/// Result of a receipt update or delete: the surviving receipt (update only)
/// plus any restorations that were skipped under the best-effort policy.
#[derive(Debug, Clone)]
pub struct ReceiptWriteReport {
    pub receipt: Receipt,
    pub skipped_restores: Vec<SkippedRestore>,
}

// =============================================================================
// Operations
// =============================================================================

impl PharmacyService {
    /// Creates a receipt, depleting the referenced batches.
    ///
    /// All lines are validated (including cumulative demand per batch)
    /// before any ledger mutation; a failure leaves everything untouched.
    pub async fn create_receipt(&self, request: CreateReceiptRequest) -> ServiceResult<Receipt> {
        validate_name("patient_id", &request.patient_id).map_err(CoreError::from)?;

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;
        let now = Utc::now();

        let mut medicines = fetch_referenced_medicines(
            &mut tx,
            request.lines.iter().map(|l| l.medicine_id.as_str()),
        )
        .await?;

        let priced = price_lines(&medicines, &request.lines)?;
        apply_lines(&mut medicines, &priced)?;
        persist_ledgers(&mut tx, medicines, now).await?;

        let lines: Vec<_> = priced
            .into_iter()
            .map(|p| p.into_receipt_line(generate_line_id()))
            .collect();

        let receipt = Receipt {
            id: generate_receipt_id(),
            patient_id: request.patient_id,
            total_cents: lines.iter().map(|l| l.line_total_cents).sum(),
            lines,
            receipt_date: request.receipt_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };

        receipt::insert(&mut tx, &receipt).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            receipt_id = %receipt.id,
            patient_id = %receipt.patient_id,
            lines = receipt.lines.len(),
            total = receipt.total_cents,
            "Receipt created"
        );

        Ok(receipt)
    }

    /// Replaces a receipt in place.
    ///
    /// First reverses the stored receipt's effect on the ledgers (per the
    /// configured restore policy), then validates and applies the new line
    /// set exactly as in create. One transaction end to end.
    pub async fn update_receipt(
        &self,
        id: &str,
        request: CreateReceiptRequest,
    ) -> ServiceResult<ReceiptWriteReport> {
        validate_name("patient_id", &request.patient_id).map_err(CoreError::from)?;

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;
        let now = Utc::now();

        let existing = receipt::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::ReceiptNotFound(id.to_string()))?;

        // Phase 1: reverse the stored lines
        let mut medicines = fetch_referenced_medicines(
            &mut tx,
            existing
                .lines
                .iter()
                .map(|l| l.medicine_id.as_str())
                .chain(request.lines.iter().map(|l| l.medicine_id.as_str())),
        )
        .await?;

        let skipped = restore_lines(&mut medicines, &existing.lines, self.restore_policy)?;
        for skip in &skipped {
            warn!(
                receipt_id = %id,
                medicine_id = %skip.medicine_id,
                batch = %skip.batch_number,
                quantity = skip.quantity,
                "Stock restoration skipped: batch no longer exists"
            );
        }

        // Phase 2: validate and apply the replacement lines
        let priced = price_lines(&medicines, &request.lines)?;
        apply_lines(&mut medicines, &priced)?;
        persist_ledgers(&mut tx, medicines, now).await?;

        let lines: Vec<_> = priced
            .into_iter()
            .map(|p| p.into_receipt_line(generate_line_id()))
            .collect();

        let receipt = Receipt {
            id: existing.id,
            patient_id: request.patient_id,
            total_cents: lines.iter().map(|l| l.line_total_cents).sum(),
            lines,
            receipt_date: request.receipt_date.unwrap_or(existing.receipt_date),
            created_at: existing.created_at,
            updated_at: now,
        };

        receipt::update(&mut tx, &receipt).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            receipt_id = %receipt.id,
            lines = receipt.lines.len(),
            total = receipt.total_cents,
            skipped = skipped.len(),
            "Receipt updated"
        );

        Ok(ReceiptWriteReport {
            receipt,
            skipped_restores: skipped,
        })
    }

    /// Deletes a receipt, restoring the stock it took out (per the
    /// configured restore policy).
    pub async fn delete_receipt(&self, id: &str) -> ServiceResult<Vec<SkippedRestore>> {
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;
        let now = Utc::now();

        let existing = receipt::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::ReceiptNotFound(id.to_string()))?;

        let mut medicines = fetch_referenced_medicines(
            &mut tx,
            existing.lines.iter().map(|l| l.medicine_id.as_str()),
        )
        .await?;

        let skipped = restore_lines(&mut medicines, &existing.lines, self.restore_policy)?;
        for skip in &skipped {
            warn!(
                receipt_id = %id,
                medicine_id = %skip.medicine_id,
                batch = %skip.batch_number,
                quantity = skip.quantity,
                "Stock restoration skipped: batch no longer exists"
            );
        }

        persist_ledgers(&mut tx, medicines, now).await?;
        receipt::delete(&mut tx, id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(receipt_id = %id, skipped = skipped.len(), "Receipt deleted");
        Ok(skipped)
    }
}
