//! # Validation Module
//!
//! Input validation helpers shared by the order model, the voucher model and
//! the dashboard request.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Host (axum extractors)                                       │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Rates in [0, 100] → InvalidRate                                   │
//! │  ├── Amounts ≥ 0 / > 0 → InvalidAmount                                 │
//! │  └── Required text, date ranges → InvalidInput                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Entity invariants (`check_invariants` inside `apply`)        │
//! │  └── Cross-field rules → InvariantViolation                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Rate;

/// Result type for field-only validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text field we accept (reasons, memos, descriptions).
pub const MAX_TEXT_LEN: usize = 500;

// =============================================================================
// Commission Validators
// =============================================================================

/// Validates a percent rate against [0, 100].
///
/// ## Example
/// ```rust
/// use broker_core::types::Rate;
/// use broker_core::validation::validate_percent_rate;
///
/// assert!(validate_percent_rate(Rate::from_bps(500)).is_ok());
/// assert!(validate_percent_rate(Rate::from_bps(10_001)).is_err());
/// ```
pub fn validate_percent_rate(rate: Rate) -> CoreResult<()> {
    if rate.bps() > Rate::MAX_PERCENT_BPS {
        return Err(CoreError::InvalidRate(ValidationError::OutOfRange {
            field: "rate".to_string(),
            min: "0".to_string(),
            max: "100".to_string(),
        }));
    }
    Ok(())
}

/// Validates a commission input that must not be negative.
///
/// Negative commission inputs (fixed amounts, bases) are reported as rate
/// errors because they can only come from a misconfigured recipient.
pub fn validate_commission_input(field: &str, amount: Money) -> CoreResult<()> {
    if amount.is_negative() {
        return Err(CoreError::InvalidRate(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        }));
    }
    Ok(())
}

// =============================================================================
// Money Validators
// =============================================================================

/// Validates an amount that must be zero or more.
pub fn validate_non_negative_amount(field: &str, amount: Money) -> CoreResult<()> {
    if amount.is_negative() {
        return Err(CoreError::InvalidAmount(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        }));
    }
    Ok(())
}

/// Validates an amount that must be strictly positive (voucher amounts).
///
/// ## Example
/// ```rust
/// use broker_core::money::Money;
/// use broker_core::validation::validate_positive_amount;
///
/// assert!(validate_positive_amount("amount", Money::from_cents(1)).is_ok());
/// assert!(validate_positive_amount("amount", Money::zero()).is_err());
/// ```
pub fn validate_positive_amount(field: &str, amount: Money) -> CoreResult<()> {
    if !amount.is_positive() {
        return Err(CoreError::InvalidAmount(ValidationError::MustBePositive {
            field: field.to_string(),
        }));
    }
    Ok(())
}

// =============================================================================
// String & Date Validators
// =============================================================================

/// Validates non-empty free text and returns it trimmed.
pub fn validate_required_text(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        });
    }
    Ok(value.to_string())
}

/// Validates an ISO 4217 style currency code (three ASCII letters).
pub fn validate_currency(code: &str) -> ValidationResult<()> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: format!("'{}' is not a three-letter code", code),
        });
    }
    Ok(())
}

/// Validates an inclusive date range.
pub fn validate_date_range(from: NaiveDate, to: NaiveDate) -> ValidationResult<()> {
    if from > to {
        return Err(ValidationError::InvalidFormat {
            field: "date_from".to_string(),
            reason: format!("{} is after {}", from, to),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
