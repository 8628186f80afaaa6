//! # Domain Types
//!
//! Core domain types used throughout MediStock.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Medicine     │   │     Receipt     │   │  PharmacySale   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name/generic/  │   │  patient_id     │   │  sale_number    │       │
//! │  │  brand identity │   │  lines          │   │  subtotal/tax/  │       │
//! │  │  current_stock  │   │  total_cents    │   │  discount/total │       │
//! │  │  batches ───────┼─┐ └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘ │                                                 │
//! │                      │ ┌─────────────────┐   ┌─────────────────┐       │
//! │                      └►│      Batch      │   │  ReceiptLine    │       │
//! │                        │  ─────────────  │   │  ─────────────  │       │
//! │                        │  batch_number   │   │  snapshots +    │       │
//! │                        │  expiry_date    │   │  unit price +   │       │
//! │                        │  price/quantity │   │  line total     │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Derived Aggregate Pattern
//! `Medicine.current_stock` duplicates `Σ batch.quantity` for fast reads.
//! It is a cached projection: every ledger mutation recomputes it, and no
//! code path ever writes it independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Batch
// =============================================================================

/// One lot of a medicine: its own expiry, price and quantity.
///
/// Unique within a medicine by `batch_number`. Quantity is never negative;
/// a batch that depletes to exactly zero is removed from the ledger rather
/// than kept as a zero-quantity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Supplier-assigned lot identifier, e.g. "B2024-117".
    pub batch_number: String,

    /// Expiry date of this lot.
    pub expiry_date: DateTime<Utc>,

    /// Unit price in cents for stock from this lot.
    pub price_cents: i64,

    /// Units currently on hand from this lot.
    pub quantity: i64,
}

impl Batch {
    /// Creates a new batch.
    pub fn new(
        batch_number: String,
        expiry_date: DateTime<Utc>,
        price_cents: i64,
        quantity: i64,
    ) -> Self {
        Batch {
            batch_number,
            expiry_date,
            price_cents,
            quantity,
        }
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether this batch has expired as of `now`.
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date <= now
    }

    /// Checks whether this batch matches a full batch identity
    /// (batch number, expiry and price all equal).
    pub fn matches_spec(&self, spec: &BatchSpec) -> bool {
        self.batch_number == spec.batch_number
            && self.expiry_date == spec.expiry_date
            && self.price_cents == spec.price_cents
    }
}

// =============================================================================
// Batch Spec
// =============================================================================

/// The identity of a batch: what makes two deliveries "the same lot".
///
/// ## Why a Separate Type?
/// Intake reconciliation compares identities without quantities. Two
/// deliveries merge only when batch number, expiry AND price all match;
/// a matching number with a different expiry or price is a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSpec {
    pub batch_number: String,
    pub expiry_date: DateTime<Utc>,
    pub price_cents: i64,
}

// =============================================================================
// Medicine
// =============================================================================

/// A medicine with its identity, classification and batch ledger.
///
/// ## Dual Identity
/// - `id`: UUID v4 - immutable, used for references from receipts/sales
/// - `(name, generic, brand)`: business identity used by intake matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, e.g. "Paracetamol 500".
    pub name: String,

    /// Generic (INN) name, e.g. "Acetaminophen".
    pub generic: String,

    /// Brand / manufacturer name.
    pub brand: String,

    /// Therapeutic category, e.g. "Analgesic".
    pub category: Option<String>,

    /// Dosage form, e.g. "tablet", "syrup".
    pub form: Option<String>,

    /// Strength, e.g. "500mg".
    pub strength: Option<String>,

    /// Reorder threshold; `current_stock <= min_stock_level` flags low stock.
    pub min_stock_level: i64,

    /// Derived aggregate: always `Σ batches.quantity`. Never authoritative
    /// on its own; recomputed transactionally on every ledger mutation.
    pub current_stock: i64,

    /// The batch ledger - source of truth for stock.
    pub batches: Vec<Batch>,

    /// When the medicine was created (first intake).
    pub created_at: DateTime<Utc>,

    /// When the medicine was last updated.
    pub updated_at: DateTime<Utc>,

    /// Optimistic-concurrency version, bumped on every persisted update.
    pub version: i64,
}

impl Medicine {
    /// Default reorder threshold for newly created medicines.
    pub const DEFAULT_MIN_STOCK_LEVEL: i64 = 10;

    /// Creates a medicine from its first stock intake, with a single batch.
    ///
    /// `current_stock` starts at the initial batch quantity.
    pub fn with_initial_batch(
        id: String,
        name: String,
        generic: String,
        brand: String,
        batch: Batch,
        now: DateTime<Utc>,
    ) -> Self {
        let current_stock = batch.quantity;
        Medicine {
            id,
            name,
            generic,
            brand,
            category: None,
            form: None,
            strength: None,
            min_stock_level: Self::DEFAULT_MIN_STOCK_LEVEL,
            current_stock,
            batches: vec![batch],
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Checks whether stock has fallen to or below the reorder threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.min_stock_level
    }

    /// Checks whether any batch in the ledger has expired as of `now`.
    pub fn has_expired_batch(&self, now: DateTime<Utc>) -> bool {
        self.batches.iter().any(|b| b.is_expired(now))
    }
}

// =============================================================================
// Stock Intake
// =============================================================================

/// A stock intake request: one delivery of one lot of one medicine.
///
/// Matched against existing records by the reconciliation engine:
/// ```text
/// 1. exact   (name, generic, brand, batch_number, expiry, price) → merge
/// 2. partial (name, generic, brand)                              → new batch
/// 3. none                                                        → new medicine
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockIntake {
    pub name: String,
    pub generic: String,
    pub brand: String,
    pub category: Option<String>,
    pub form: Option<String>,
    pub strength: Option<String>,
    /// Reorder threshold for a newly created medicine. Ignored when the
    /// intake lands on an existing record.
    pub min_stock_level: Option<i64>,
    pub batch_number: String,
    pub expiry_date: DateTime<Utc>,
    pub price_cents: i64,
    pub quantity: i64,
}

impl StockIntake {
    /// Returns the batch identity carried by this intake.
    pub fn batch_spec(&self) -> BatchSpec {
        BatchSpec {
            batch_number: self.batch_number.clone(),
            expiry_date: self.expiry_date,
            price_cents: self.price_cents,
        }
    }
}

// =============================================================================
// Line Request
// =============================================================================

/// One requested line of a receipt or sale, before pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    /// Medicine UUID.
    pub medicine_id: String,
    /// Batch to dispense from (FIFO-by-batch is the caller's choice).
    pub batch_number: String,
    /// Units requested.
    pub quantity: i64,
}

// =============================================================================
// Receipt
// =============================================================================

/// A line item on a receipt or sale.
/// Uses snapshot pattern to freeze medicine data at transaction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub id: String,
    pub medicine_id: String,
    pub batch_number: String,
    /// Medicine name at transaction time (frozen).
    pub name_snapshot: String,
    /// Generic name at transaction time (frozen).
    pub generic_snapshot: String,
    /// Brand at transaction time (frozen).
    pub brand_snapshot: String,
    /// Unit price in cents at transaction time (frozen - later catalog
    /// edits never retroactively alter historical receipts).
    pub unit_price_cents: i64,
    /// Units dispensed.
    pub quantity: i64,
    /// `unit_price_cents × quantity`.
    pub line_total_cents: i64,
}

impl ReceiptLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// A recorded dispensing transaction for a patient.
///
/// Mutable via full-item replacement and deletable; both operations restore
/// ledger state before applying a different state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub patient_id: String,
    pub lines: Vec<ReceiptLine>,
    /// Invariant: equals `Σ lines.line_total_cents`.
    pub total_cents: i64,
    pub receipt_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Receipt {
    /// Recomputes the total from the line items.
    ///
    /// Used to (re)establish the `total_cents == Σ line totals` invariant.
    pub fn computed_total(&self) -> i64 {
        self.lines.iter().map(|l| l.line_total_cents).sum()
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a pharmacy sale was paid.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Insurance,
    Credit,
}

// =============================================================================
// Pharmacy Sale
// =============================================================================

/// An over-the-counter pharmacy sale.
///
/// Same line shape as a receipt, plus subtotal/tax/discount accounting and a
/// daily-sequential sale number (`SALE-YYYYMMDD-NNNN`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacySale {
    pub id: String,
    /// Generated at persist time from an atomic per-day counter.
    pub sale_number: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub items: Vec<ReceiptLine>,
    /// `Σ items.line_total_cents`.
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    /// `subtotal + tax - discount`.
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub sale_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expiry() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2027, 6, 30, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_batch_matches_spec() {
        let batch = Batch::new("B1".to_string(), expiry(), 200, 100);

        let same = BatchSpec {
            batch_number: "B1".to_string(),
            expiry_date: expiry(),
            price_cents: 200,
        };
        assert!(batch.matches_spec(&same));

        let different_price = BatchSpec {
            price_cents: 250,
            ..same.clone()
        };
        assert!(!batch.matches_spec(&different_price));
    }

    #[test]
    fn test_batch_expiry() {
        let batch = Batch::new("B1".to_string(), expiry(), 200, 100);
        let before = Utc.with_ymd_and_hms(2027, 6, 29, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2027, 7, 1, 0, 0, 0).unwrap();

        assert!(!batch.is_expired(before));
        assert!(batch.is_expired(after));
        // Boundary: expiring exactly now counts as expired
        assert!(batch.is_expired(expiry()));
    }

    #[test]
    fn test_medicine_with_initial_batch() {
        let med = Medicine::with_initial_batch(
            "id-1".to_string(),
            "Paracetamol".to_string(),
            "Acetaminophen".to_string(),
            "BrandX".to_string(),
            Batch::new("B1".to_string(), expiry(), 200, 100),
            Utc::now(),
        );

        assert_eq!(med.current_stock, 100);
        assert_eq!(med.batches.len(), 1);
        assert_eq!(med.min_stock_level, Medicine::DEFAULT_MIN_STOCK_LEVEL);
        assert_eq!(med.version, 0);
    }

    #[test]
    fn test_low_stock_flag() {
        let mut med = Medicine::with_initial_batch(
            "id-1".to_string(),
            "Paracetamol".to_string(),
            "Acetaminophen".to_string(),
            "BrandX".to_string(),
            Batch::new("B1".to_string(), expiry(), 200, 100),
            Utc::now(),
        );

        assert!(!med.is_low_stock());
        med.min_stock_level = 100;
        assert!(med.is_low_stock());
    }

    #[test]
    fn test_receipt_computed_total() {
        let receipt = Receipt {
            id: "r-1".to_string(),
            patient_id: "p-1".to_string(),
            lines: vec![
                ReceiptLine {
                    id: "l-1".to_string(),
                    medicine_id: "m-1".to_string(),
                    batch_number: "B1".to_string(),
                    name_snapshot: "Paracetamol".to_string(),
                    generic_snapshot: "Acetaminophen".to_string(),
                    brand_snapshot: "BrandX".to_string(),
                    unit_price_cents: 200,
                    quantity: 3,
                    line_total_cents: 600,
                },
                ReceiptLine {
                    id: "l-2".to_string(),
                    medicine_id: "m-2".to_string(),
                    batch_number: "B7".to_string(),
                    name_snapshot: "Ibuprofen".to_string(),
                    generic_snapshot: "Ibuprofen".to_string(),
                    brand_snapshot: "BrandY".to_string(),
                    unit_price_cents: 150,
                    quantity: 2,
                    line_total_cents: 300,
                },
            ],
            total_cents: 900,
            receipt_date: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(receipt.computed_total(), 900);
        assert_eq!(receipt.computed_total(), receipt.total_cents);
    }
}
