//! # Allocation Engine
//!
//! Runs the evaluator over every enabled recipient and rolls the results up
//! into [`CommissionTotals`].
//!
//! ## Roll-up
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  external_total = Σ broker, referrer, cashback, other_external          │
//! │  internal_total = Σ agents, manager, director, legacy slots             │
//! │  total_payable  = external_total + internal_total                       │
//! │                                                                         │
//! │  base_available = max(sale_value, amount_total)                         │
//! │  company_share  = max(0, base_available − total_payable)                │
//! │                                                                         │
//! │  allocation_status vs untaxed_total (±0.01):  under | full | over       │
//! │                                                                         │
//! │  total_payable > base_available  ⇒  scale = base_available / payable    │
//! │  (applied to payouts at confirm; stored amounts stay unscaled)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::commission::evaluator::evaluate;
use crate::error::CoreResult;
use crate::money::Money;
use crate::order::{Order, Slot, SlotGroup};

/// Tolerance for "full" allocation: one cent.
pub const ALLOCATION_TOLERANCE: Money = Money::from_cents(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Under,
    Full,
    Over,
}

/// Rational factor `numerator / denominator` applied to payouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PayoutScale {
    pub numerator: Money,
    pub denominator: Money,
}

impl PayoutScale {
    /// Scales an amount, flooring to the cent.
    pub fn apply(&self, amount: Money) -> Money {
        amount.scale_floor(self.numerator, self.denominator)
    }
}

/// Derived commission totals cached on the order at calculate time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionTotals {
    pub external_total: Money,
    /// Internal and legacy slots together.
    pub internal_total: Money,
    /// Legacy share of `internal_total`, for report subtotals.
    pub legacy_total: Money,
    pub total_payable: Money,
    pub base_available: Money,
    pub company_share: Money,
    pub allocation_status: AllocationStatus,
    /// `total_payable / untaxed_total × 100`, two decimals. Zero when
    /// untaxed_total is zero.
    pub allocation_percent: f64,
    /// Present only when total_payable exceeds base_available.
    pub scale: Option<PayoutScale>,
}

/// Per-slot amounts plus the totals they roll up into.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub amounts: Vec<(Slot, Money)>,
    pub totals: CommissionTotals,
}

/// Evaluates every enabled recipient and computes the totals.
pub fn allocate(order: &Order) -> CoreResult<Allocation> {
    let mut amounts = Vec::new();
    let mut external_total = Money::zero();
    let mut internal_total = Money::zero();
    let mut legacy_total = Money::zero();

    for config in order.enabled_recipients() {
        let amount = evaluate(order, config)?;
        match config.slot.group() {
            SlotGroup::External => external_total += amount,
            SlotGroup::Internal => internal_total += amount,
            SlotGroup::Legacy => {
                internal_total += amount;
                legacy_total += amount;
            }
        }
        amounts.push((config.slot, amount));
    }

    let total_payable = external_total + internal_total;
    let base_available = order
        .sale_value()
        .map_or(order.amount_total(), |v| v.max(order.amount_total()));
    let company_share = (base_available - total_payable).clamp_non_negative();

    let untaxed = order.untaxed_total();
    let allocation_status = if (total_payable - untaxed).abs() <= ALLOCATION_TOLERANCE {
        AllocationStatus::Full
    } else if total_payable > untaxed {
        AllocationStatus::Over
    } else {
        AllocationStatus::Under
    };

    let allocation_percent = total_payable.ratio_bps(untaxed) as f64 / 100.0;

    let scale = (total_payable > base_available).then_some(PayoutScale {
        numerator: base_available,
        denominator: total_payable,
    });

    Ok(Allocation {
        amounts,
        totals: CommissionTotals {
            external_total,
            internal_total,
            legacy_total,
            total_payable,
            base_available,
            company_share,
            allocation_status,
            allocation_percent,
            scale,
        },
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
