//! # Error Types
//!
//! Domain-specific error types for medistock-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  medistock-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  medistock-db errors (separate crate)                                  │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ServiceError     - CoreError | DbError union                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → request layer      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (medicine id, batch number, etc.)
//! 3. Errors are enum variants, never String
//! 4. The core never formats user-facing text; the request layer does

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Medicine cannot be found.
    ///
    /// ## When This Occurs
    /// - Medicine ID doesn't exist in the store
    /// - Medicine was pruned after its last batch depleted
    #[error("Medicine not found: {0}")]
    MedicineNotFound(String),

    /// Batch cannot be found within a medicine's ledger.
    ///
    /// ## When This Occurs
    /// - Batch number was never taken in
    /// - Batch was removed after depleting to exactly zero
    #[error("Batch {batch_number} not found for medicine {medicine_id}")]
    BatchNotFound {
        medicine_id: String,
        batch_number: String,
    },

    /// Receipt not found.
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Insufficient stock to complete a transaction.
    ///
    /// ## When This Occurs
    /// - A requested quantity (cumulative across a transaction's lines)
    ///   exceeds what the referenced batch holds
    ///
    /// ## User Workflow
    /// ```text
    /// Dispense request (qty: 160)
    ///      │
    ///      ▼
    /// Check batch B1: available=150
    ///      │
    ///      ▼
    /// InsufficientStock { batch_number: "B1", available: 150, requested: 160 }
    ///      │
    ///      ▼
    /// UI shows: "Only 150 units of batch B1 in stock"
    /// ```
    #[error("Insufficient stock in batch {batch_number}: available {available}, requested {requested}")]
    InsufficientStock {
        batch_number: String,
        available: i64,
        requested: i64,
    },

    /// A batch number collides with an existing batch whose expiry or price
    /// differ. Batch numbers are the unique batch key within a medicine, so
    /// the conflicting intake is rejected rather than stored twice.
    #[error("Batch {batch_number} already exists with a different expiry or price")]
    DuplicateBatch { batch_number: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate batch number in one request).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            batch_number: "B1".to_string(),
            available: 150,
            requested: 160,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock in batch B1: available 150, requested 160"
        );
    }

    #[test]
    fn test_batch_not_found_message() {
        let err = CoreError::BatchNotFound {
            medicine_id: "med-1".to_string(),
            batch_number: "B9".to_string(),
        };
        assert_eq!(err.to_string(), "Batch B9 not found for medicine med-1");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "patient_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
