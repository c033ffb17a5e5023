//! # Error Types
//!
//! Domain-specific error types for broker-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  broker-core errors (this file)                                        │
//! │  ├── CoreError        - Workflow / domain errors, each with a kind tag │
//! │  └── ValidationError  - Field-level input failures (the detail)        │
//! │                                                                         │
//! │  broker-api errors (in app)                                            │
//! │  └── ApiError         - What HTTP callers see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → JSON body + status    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Kind Tags
//! Every `CoreError` reports a stable [`ErrorKind`]. Hosts switch on the kind,
//! never on the message. Only [`ErrorKind::Conflict`] is retryable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// Stable, serializable tag for a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvariantViolation,
    InvalidRate,
    InvalidAmount,
    InvalidInput,
    IllegalTransition,
    NotAuthorized,
    Conflict,
    NotFound,
    DownstreamRefusal,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvariantViolation => "invariant_violation",
            ErrorKind::InvalidRate => "invalid_rate",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::IllegalTransition => "illegal_transition",
            ErrorKind::NotAuthorized => "not_authorized",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::DownstreamRefusal => "downstream_refusal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Messages are derived from the kind and the offending field only, so the
/// same failure always renders the same text.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A write would break an entity invariant.
    ///
    /// ## When This Occurs
    /// - `amount_total < untaxed_total` after an amounts edit
    /// - Recipient edit on a confirmed order
    /// - Voucher edit outside draft
    #[error("{entity} invariant violated: {reason}")]
    InvariantViolation { entity: &'static str, reason: String },

    /// Commission rate (or fixed amount) outside its allowed range.
    #[error("Invalid rate: {0}")]
    InvalidRate(ValidationError),

    /// Monetary input outside its allowed range (voucher amount, fixed amount).
    #[error("Invalid amount: {0}")]
    InvalidAmount(ValidationError),

    /// Malformed request payload.
    #[error("Invalid input: {0}")]
    InvalidInput(ValidationError),

    /// State machine verb not permitted from the current state.
    ///
    /// ## User Workflow
    /// ```text
    /// Order (commission_status = draft)
    ///      │
    ///      ▼
    /// confirm  ← only calculate/reset are legal here
    ///      │
    ///      ▼
    /// IllegalTransition { entity: "order", from: "draft", verb: "confirm" }
    /// ```
    #[error("Cannot {verb} {entity} in state {from}{}", detail_suffix(.detail))]
    IllegalTransition {
        entity: &'static str,
        from: String,
        verb: String,
        detail: Option<String>,
    },

    /// Caller lacks the capability for the verb.
    #[error("Not authorized: {reason}")]
    NotAuthorized { reason: String },

    /// Optimistic-concurrency loss on commit. Retry the whole verb.
    #[error("Conflicting update on {entity} {id}")]
    Conflict { entity: &'static str, id: String },

    /// Token, order, voucher or payout does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Downstream port (journal) refused the operation.
    #[error("{port} refused: {reason}")]
    DownstreamRefusal { port: &'static str, reason: String },
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {}", d),
        None => String::new(),
    }
}

impl CoreError {
    /// Returns the stable kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            CoreError::InvalidRate(_) => ErrorKind::InvalidRate,
            CoreError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            CoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            CoreError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            CoreError::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            CoreError::Conflict { .. } => ErrorKind::Conflict,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::DownstreamRefusal { .. } => ErrorKind::DownstreamRefusal,
        }
    }

    /// Only conflicts may be retried, and only by re-running the whole verb.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict { .. })
    }

    pub fn invariant(entity: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvariantViolation {
            entity,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::Conflict {
            entity,
            id: id.into(),
        }
    }

    pub fn illegal(entity: &'static str, from: impl fmt::Display, verb: impl fmt::Display) -> Self {
        CoreError::IllegalTransition {
            entity,
            from: from.to_string(),
            verb: verb.to_string(),
            detail: None,
        }
    }

    pub fn illegal_because(
        entity: &'static str,
        from: impl fmt::Display,
        verb: impl fmt::Display,
        detail: impl Into<String>,
    ) -> Self {
        CoreError::IllegalTransition {
            entity,
            from: from.to_string(),
            verb: verb.to_string(),
            detail: Some(detail.into()),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These carry the field-level detail; the surrounding [`CoreError`] variant
/// decides which kind the failure is reported as.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: String, max: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., not a finite number, inverted range).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl From<ValidationError> for CoreError {
    /// Field validation without a more specific kind is an input error.
    fn from(err: ValidationError) -> Self {
        CoreError::InvalidInput(err)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
