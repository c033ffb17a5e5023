//! # Shared Domain Types
//!
//! Small value types used by both the commission and the voucher side.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Shared Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Rate       │   │    Quantity     │   │   EntityRef     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  milli (i64)    │   │  id             │       │
//! │  │  500 = 5.00%    │   │  2500 = 2.5     │   │  name snapshot  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Actor       │   │   Capability    │   │   AuditEntry    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, name       │   │  payment.*      │   │  at, actor      │       │
//! │  │                 │   │  commission.*   │   │  action, from→to│       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! References to parties, products, projects etc. carry the display name as
//! it was when the reference was set, so reports render without a lookup.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};

// =============================================================================
// Rate
// =============================================================================

/// Float noise allowed when scaling a two-decimal percentage to bps.
const BPS_TOLERANCE: f64 = 1e-6;

/// Commission rate in basis points.
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000. Percent rates arrive with at most two
/// decimals (`2.5` → 250 bps), so integer bps is exact and the half-even
/// rounding in [`crate::Money::percent`] is the only rounding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 100%.
    pub const MAX_PERCENT_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Builds a rate from a percentage, rejecting anything outside [0, 100]
    /// or finer than basis points (more than two decimals).
    ///
    /// ## Example
    /// ```rust
    /// use broker_core::types::Rate;
    ///
    /// assert_eq!(Rate::try_from_percent(2.5).unwrap().bps(), 250);
    /// assert!(Rate::try_from_percent(-1.0).is_err());
    /// assert!(Rate::try_from_percent(100.01).is_err());
    /// assert!(Rate::try_from_percent(2.555).is_err());
    /// ```
    pub fn try_from_percent(pct: f64) -> Result<Self, CoreError> {
        if !pct.is_finite() {
            return Err(CoreError::InvalidRate(ValidationError::InvalidFormat {
                field: "rate".to_string(),
                reason: "not a finite number".to_string(),
            }));
        }
        if !(0.0..=100.0).contains(&pct) {
            return Err(CoreError::InvalidRate(ValidationError::OutOfRange {
                field: "rate".to_string(),
                min: "0".to_string(),
                max: "100".to_string(),
            }));
        }
        let bps = (pct * 100.0).round();
        if (pct * 100.0 - bps).abs() > BPS_TOLERANCE {
            return Err(CoreError::InvalidRate(ValidationError::InvalidFormat {
                field: "rate".to_string(),
                reason: "more than two decimal places".to_string(),
            }));
        }
        Ok(Rate(bps as u32))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// Decimal line quantity in thousandths (`2500` = 2.5 units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    pub const SCALE: i64 = 1_000;

    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * Self::SCALE)
    }

    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

// =============================================================================
// Entity Reference
// =============================================================================

/// Reference to an entity owned elsewhere (party, product, project, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EntityRef {
    pub id: String,
    /// Display name captured when the reference was set.
    pub name: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// =============================================================================
// Actor & Capability
// =============================================================================

/// The user on whose behalf a verb runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A permission checked by the identity port before a workflow verb runs.
///
/// ## Capability Table
/// ```text
/// ┌──────────────────────────┬──────────────────────────────────────────┐
/// │ payment.submit           │ create / edit / submit a voucher         │
/// │ payment.review           │ submitted → under_review                 │
/// │ payment.approve          │ under_review → approved                  │
/// │ payment.authorize        │ approved → authorized                    │
/// │ payment.reject           │ submitted|under_review|approved → reject │
/// │ payment.reset            │ any non-posted → draft                   │
/// │ payment.post             │ authorized (or unguarded approved) → post│
/// │ commission.calculate     │ configure recipients, draft → calculated │
/// │ commission.confirm       │ calculated → confirmed                   │
/// │ commission.pay           │ payout posting, confirmed → paid         │
/// │ commission.reset         │ any but paid → draft                     │
/// └──────────────────────────┴──────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Capability {
    #[serde(rename = "payment.submit")]
    PaymentSubmit,
    #[serde(rename = "payment.review")]
    PaymentReview,
    #[serde(rename = "payment.approve")]
    PaymentApprove,
    #[serde(rename = "payment.authorize")]
    PaymentAuthorize,
    #[serde(rename = "payment.reject")]
    PaymentReject,
    #[serde(rename = "payment.reset")]
    PaymentReset,
    #[serde(rename = "payment.post")]
    PaymentPost,
    #[serde(rename = "commission.calculate")]
    CommissionCalculate,
    #[serde(rename = "commission.confirm")]
    CommissionConfirm,
    #[serde(rename = "commission.pay")]
    CommissionPay,
    #[serde(rename = "commission.reset")]
    CommissionReset,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::PaymentSubmit,
        Capability::PaymentReview,
        Capability::PaymentApprove,
        Capability::PaymentAuthorize,
        Capability::PaymentReject,
        Capability::PaymentReset,
        Capability::PaymentPost,
        Capability::CommissionCalculate,
        Capability::CommissionConfirm,
        Capability::CommissionPay,
        Capability::CommissionReset,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::PaymentSubmit => "payment.submit",
            Capability::PaymentReview => "payment.review",
            Capability::PaymentApprove => "payment.approve",
            Capability::PaymentAuthorize => "payment.authorize",
            Capability::PaymentReject => "payment.reject",
            Capability::PaymentReset => "payment.reset",
            Capability::PaymentPost => "payment.post",
            Capability::CommissionCalculate => "commission.calculate",
            Capability::CommissionConfirm => "commission.confirm",
            Capability::CommissionPay => "commission.pay",
            Capability::CommissionReset => "commission.reset",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "capability".to_string(),
                reason: format!("unknown capability '{}'", s),
            })
    }
}

// =============================================================================
// Signature
// =============================================================================

/// Opaque signature blob captured when a role signs off a voucher.
///
/// Carried as standard base64 on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Signature(bytes.into())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, ValidationError> {
        STANDARD
            .decode(encoded.trim())
            .map(Signature)
            .map_err(|e| ValidationError::InvalidFormat {
                field: "signature".to_string(),
                reason: e.to_string(),
            })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Signature::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Audit Entry
// =============================================================================

/// One line of an entity's append-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuditEntry {
    #[ts(type = "string")]
    pub at: DateTime<Utc>,
    pub actor: Actor,
    /// Verb name (`confirm`, `approve`, `recipient.set`, ...).
    pub action: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub note: Option<String>,
}

impl AuditEntry {
    pub fn new(at: DateTime<Utc>, actor: &Actor, action: impl Into<String>) -> Self {
        Self {
            at,
            actor: actor.clone(),
            action: action.into(),
            from: None,
            to: None,
            note: None,
        }
    }

    pub fn transition(mut self, from: impl fmt::Display, to: impl fmt::Display) -> Self {
        self.from = Some(from.to_string());
        self.to = Some(to.to_string());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_rate_from_percent() {
        assert_eq!(Rate::try_from_percent(5.0).unwrap().bps(), 500);
        assert_eq!(Rate::try_from_percent(0.0).unwrap(), Rate::zero());
        assert_eq!(Rate::try_from_percent(100.0).unwrap().bps(), 10_000);
        assert_eq!(Rate::from_bps(250).percentage(), 2.5);
        assert_eq!(Rate::from_bps(250).to_string(), "2.50%");
    }

    #[test]
    fn test_rate_rejects_sub_basis_point_precision() {
        assert_eq!(Rate::try_from_percent(12.34).unwrap().bps(), 1234);
        assert_eq!(Rate::try_from_percent(0.01).unwrap().bps(), 1);
        for bad in [2.555, 0.001, 33.333_333] {
            let err = Rate::try_from_percent(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRate, "{bad}");
        }
    }

    #[test]
    fn test_rate_rejects_out_of_range() {
        for bad in [-0.01, 100.5, f64::NAN, f64::INFINITY] {
            let err = Rate::try_from_percent(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRate, "{bad}");
        }
    }

    #[test]
    fn test_capability_round_trips_through_str() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
            assert_eq!(
                serde_json::to_string(&cap).unwrap(),
                format!("\"{}\"", cap.as_str())
            );
        }
        assert!("payment.launch".parse::<Capability>().is_err());
    }

    #[test]
    fn test_signature_base64_on_the_wire() {
        let sig = Signature::new(b"signed-by-ayesha".to_vec());
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, "\"c2lnbmVkLWJ5LWF5ZXNoYQ==\"");
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
        assert!(serde_json::from_str::<Signature>("\"***\"").is_err());
    }

    #[test]
    fn test_audit_entry_builder() {
        let actor = Actor::new("u-1", "Ayesha");
        let entry = AuditEntry::new(Utc::now(), &actor, "confirm")
            .transition("calculated", "confirmed")
            .with_note("COMM/00001");
        assert_eq!(entry.from.as_deref(), Some("calculated"));
        assert_eq!(entry.to.as_deref(), Some("confirmed"));
        assert_eq!(entry.note.as_deref(), Some("COMM/00001"));
    }
}
