//! # medistock-core: Pure Business Logic for MediStock
//!
//! This crate is the **heart** of the MediStock pharmacy backend. It contains
//! all inventory and transaction logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       MediStock Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Request Layer (out of scope)                    │   │
//! │  │     routes ──► auth ──► validation middleware ──► handlers      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             medistock-db (services + repositories)              │   │
//! │  │   record_intake, create_receipt, create_sale, dashboard_stats   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ medistock-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  ledger   │  │  receipt  │  │ validation│  │   │
//! │  │   │ Medicine  │  │ adjust    │  │ price     │  │   rules   │  │   │
//! │  │   │  Batch    │  │ merge     │  │ apply     │  │  checks   │  │   │
//! │  │   │  Receipt  │  │ recompute │  │ restore   │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Medicine, Batch, Receipt, PharmacySale, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`ledger`] - Batch ledger operations on a medicine's stock
//! - [`receipt`] - Receipt line pricing, depletion and reversal
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//! 5. **Derived Stock**: `current_stock` is always recomputed from batches,
//!    never written independently
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use medistock_core::types::{Batch, Medicine};
//!
//! let expiry = Utc.with_ymd_and_hms(2027, 6, 30, 0, 0, 0).unwrap();
//! let mut medicine = Medicine::with_initial_batch(
//!     "id-1".to_string(),
//!     "Paracetamol".to_string(),
//!     "Acetaminophen".to_string(),
//!     "BrandX".to_string(),
//!     Batch::new("B1".to_string(), expiry, 200, 100),
//!     Utc::now(),
//! );
//!
//! // Selling 40 units from batch B1 leaves 60 and keeps the aggregate in sync
//! medicine.adjust_quantity("B1", -40).unwrap();
//! assert_eq!(medicine.current_stock, 60);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod receipt;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use medistock_core::Money` instead of
// `use medistock_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::IntakeOutcome;
pub use money::Money;
pub use receipt::{PricedLine, RestorePolicy, SaleTotals, SkippedRestore};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed on a single receipt or sale.
///
/// ## Business Reason
/// Prevents runaway dispensing requests and keeps transactions reviewable.
/// Can be made configurable per-facility in future versions.
pub const MAX_RECEIPT_LINES: usize = 100;

/// Maximum quantity of a single line item or stock intake.
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g., typing 100000 instead of 100).
pub const MAX_ITEM_QUANTITY: i64 = 9_999;
