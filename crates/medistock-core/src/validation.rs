//! # Validation Module
//!
//! Input validation utilities for MediStock.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request layer (out of scope)                                 │
//! │  ├── Type validation (deserialization - non-numeric input dies here)   │
//! │  └── Immediate caller feedback                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints (identity, batch number, sale number)          │
//! │  └── CHECK (quantity >= 0)                                             │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use medistock_core::validation::{validate_batch_number, validate_quantity};
//!
//! // Validate before any ledger mutation
//! validate_batch_number("B2024-117").unwrap();
//! validate_quantity(100).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::StockIntake;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required name-like field (medicine name, generic, brand,
/// customer name).
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most 200 characters
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a batch number.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 50 characters
/// - Should contain only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use medistock_core::validation::validate_batch_number;
///
/// assert!(validate_batch_number("B2024-117").is_ok());
/// assert!(validate_batch_number("").is_err());
/// assert!(validate_batch_number("has space").is_err());
/// ```
pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    let batch_number = batch_number.trim();

    if batch_number.is_empty() {
        return Err(ValidationError::Required {
            field: "batch_number".to_string(),
        });
    }

    if batch_number.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "batch_number".to_string(),
            max: 50,
        });
    }

    if !batch_number
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "batch_number".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (donated/free items)
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a reorder threshold.
pub fn validate_min_stock_level(level: i64) -> ValidationResult<()> {
    if level < 0 {
        return Err(ValidationError::OutOfRange {
            field: "min_stock_level".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Rules
/// - Must be a valid UUID format
/// - 36 characters with hyphens: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
///
/// ## Example
/// ```rust
/// use medistock_core::validation::validate_uuid;
///
/// assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates a full stock intake request before any mutation.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Stock Intake                                                           │
/// │                                                                         │
/// │  Delivery arrives: Paracetamol / Acetaminophen / BrandX, B1 × 100      │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_intake(...) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── name/generic/brand empty? → Error                            │
/// │       ├── bad batch number?         → Error                            │
/// │       ├── qty <= 0 or > max?        → Error                            │
/// │       ├── price < 0?                → Error                            │
/// │       │                                                                 │
/// │       └── OK → reconciliation engine may touch the ledger              │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_intake(intake: &StockIntake) -> ValidationResult<()> {
    validate_name("name", &intake.name)?;
    validate_name("generic", &intake.generic)?;
    validate_name("brand", &intake.brand)?;
    validate_batch_number(&intake.batch_number)?;
    validate_quantity(intake.quantity)?;
    validate_price_cents(intake.price_cents)?;
    if let Some(level) = intake.min_stock_level {
        validate_min_stock_level(level)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Paracetamol 500").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_batch_number() {
        assert!(validate_batch_number("B2024-117").is_ok());
        assert!(validate_batch_number("ABC123").is_ok());
        assert!(validate_batch_number("lot_7").is_ok());

        assert!(validate_batch_number("").is_err());
        assert!(validate_batch_number("has space").is_err());
        assert!(validate_batch_number(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(100).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(200).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }

    #[test]
    fn test_validate_intake() {
        let intake = StockIntake {
            name: "Paracetamol".to_string(),
            generic: "Acetaminophen".to_string(),
            brand: "BrandX".to_string(),
            category: None,
            form: None,
            strength: None,
            min_stock_level: Some(10),
            batch_number: "B1".to_string(),
            expiry_date: Utc::now(),
            price_cents: 200,
            quantity: 100,
        };
        assert!(validate_intake(&intake).is_ok());

        let bad_quantity = StockIntake {
            quantity: 0,
            ..intake.clone()
        };
        assert!(validate_intake(&bad_quantity).is_err());

        let bad_price = StockIntake {
            price_cents: -1,
            ..intake.clone()
        };
        assert!(validate_intake(&bad_price).is_err());

        let missing_brand = StockIntake {
            brand: String::new(),
            ..intake
        };
        assert!(validate_intake(&missing_brand).is_err());
    }
}
