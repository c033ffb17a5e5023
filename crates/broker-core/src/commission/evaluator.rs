//! # Commission Rule Evaluator
//!
//! Turns one recipient config plus an order snapshot into a money amount.
//!
//! ## Bases by Calculation Type
//! ```text
//! ┌────────────────────────┬──────────────────────────────────────────────┐
//! │ PERCENT_OF_UNIT_PRICE  │ price_unit of the FIRST line (0 if no lines) │
//! │ PERCENT_OF_LINE_TOTAL  │ Σ price_unit × qty over all lines            │
//! │ PERCENT_OF_UNTAXED     │ order.untaxed_total                          │
//! │ PERCENT_OF_SALES_VALUE │ order.sale_value, else order.amount_total    │
//! │ FIXED                  │ fixed_amount (no base, no rate)              │
//! └────────────────────────┴──────────────────────────────────────────────┘
//!
//!   amount = base × rate / 100, rounded half-even to the cent
//! ```
//!
//! A slot without a party evaluates to zero before any input is inspected.

use crate::error::CoreResult;
use crate::money::Money;
use crate::order::{CalcType, CommissionStatus, Order, RecipientConfig, RecipientStatus, Slot, SlotGroup};
use crate::validation::{validate_commission_input, validate_percent_rate};

/// Result of evaluating one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Base the rate applied to. Zero for fixed amounts and disabled slots.
    pub base: Money,
    pub amount: Money,
}

/// Computes the commission amount for one recipient.
///
/// ## Example
/// ```rust
/// use broker_core::commission::evaluate;
/// use broker_core::order::{CalcType, NewOrder, Order, RecipientConfig, Slot};
/// use broker_core::{EntityRef, Money, Rate};
///
/// let order = Order::create("o-1", NewOrder {
///     currency: "PKR".to_string(),
///     untaxed_total: Money::from_major(1000),
///     amount_total: Money::from_major(1050),
///     ..NewOrder::default()
/// }).unwrap();
/// let broker = RecipientConfig::percent(
///     Slot::Broker,
///     Some(EntityRef::new("p-1", "Broker")),
///     CalcType::PercentOfUntaxed,
///     Rate::from_bps(500),
/// );
/// assert_eq!(evaluate(&order, &broker).unwrap(), Money::from_major(50));
/// ```
pub fn evaluate(order: &Order, config: &RecipientConfig) -> CoreResult<Money> {
    evaluate_detailed(order, config).map(|e| e.amount)
}

/// Like [`evaluate`] but also reports the base, for commission reports.
pub fn evaluate_detailed(order: &Order, config: &RecipientConfig) -> CoreResult<Evaluation> {
    if !config.is_enabled() {
        return Ok(Evaluation {
            base: Money::zero(),
            amount: Money::zero(),
        });
    }

    if config.calc_type == CalcType::Fixed {
        validate_commission_input("fixed_amount", config.fixed_amount)?;
        return Ok(Evaluation {
            base: Money::zero(),
            amount: config.fixed_amount,
        });
    }

    validate_percent_rate(config.rate)?;
    let base = base_for(order, config.calc_type);
    validate_commission_input("base", base)?;

    Ok(Evaluation {
        base,
        amount: base.percent(config.rate),
    })
}

fn base_for(order: &Order, calc_type: CalcType) -> Money {
    match calc_type {
        CalcType::PercentOfUnitPrice => order
            .lines()
            .first()
            .map(|line| line.price_unit)
            .unwrap_or_default(),
        CalcType::PercentOfLineTotal => order.lines().iter().map(|line| line.subtotal).sum(),
        CalcType::PercentOfUntaxed => order.untaxed_total(),
        CalcType::PercentOfSalesValue => order.sale_value().unwrap_or(order.amount_total()),
        CalcType::Fixed => Money::zero(),
    }
}

/// Report status of a recipient given the order's commission status.
///
/// ```text
/// draft      → draft
/// calculated → pending
/// confirmed  → broker/cashback: paid, referrer/other_external: pending,
///              internal slots: approved
/// paid       → paid
/// legacy slots are always `legacy`
/// ```
pub fn recipient_status(status: CommissionStatus, slot: Slot) -> RecipientStatus {
    if slot.group() == SlotGroup::Legacy {
        return RecipientStatus::Legacy;
    }
    match status {
        CommissionStatus::Draft => RecipientStatus::Draft,
        CommissionStatus::Calculated => RecipientStatus::Pending,
        CommissionStatus::Confirmed => match slot {
            Slot::Broker | Slot::Cashback => RecipientStatus::Paid,
            Slot::Referrer | Slot::OtherExternal => RecipientStatus::Pending,
            _ => RecipientStatus::Approved,
        },
        CommissionStatus::Paid => RecipientStatus::Paid,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::order::{Line, NewOrder};
    use crate::types::{EntityRef, Quantity, Rate};

    fn party() -> Option<EntityRef> {
        Some(EntityRef::new("p-1", "Recipient"))
    }

    fn order_with(new: NewOrder) -> Order {
        Order::create(
            "o-1",
            NewOrder {
                currency: "PKR".to_string(),
                ..new
            },
        )
        .unwrap()
    }

    fn two_line_order() -> Order {
        order_with(NewOrder {
            untaxed_total: Money::from_major(500),
            amount_total: Money::from_major(500),
            lines: vec![
                Line::new(EntityRef::new("a", "A"), Quantity::from_units(3), Money::from_major(100)),
                Line::new(EntityRef::new("b", "B"), Quantity::from_units(1), Money::from_major(200)),
            ],
            ..NewOrder::default()
        })
    }

    #[test]
    fn test_unit_price_uses_first_line_only() {
        let order = two_line_order();
        let config =
            RecipientConfig::percent(Slot::Agent1, party(), CalcType::PercentOfUnitPrice, Rate::from_bps(1000));
        assert_eq!(evaluate(&order, &config).unwrap(), Money::from_major(10));
    }

    #[test]
    fn test_line_total_sums_all_lines() {
        let order = two_line_order();
        let config =
            RecipientConfig::percent(Slot::Agent1, party(), CalcType::PercentOfLineTotal, Rate::from_bps(1000));
        let eval = evaluate_detailed(&order, &config).unwrap();
        assert_eq!(eval.base, Money::from_major(500));
        assert_eq!(eval.amount, Money::from_major(50));
    }

    #[test]
    fn test_unit_price_without_lines_is_zero() {
        let order = order_with(NewOrder::default());
        let config =
            RecipientConfig::percent(Slot::Agent1, party(), CalcType::PercentOfUnitPrice, Rate::from_bps(1000));
        assert_eq!(evaluate(&order, &config).unwrap(), Money::zero());
    }

    #[test]
    fn test_sales_value_falls_back_to_amount_total() {
        let with_value = order_with(NewOrder {
            untaxed_total: Money::from_major(2000),
            amount_total: Money::from_major(2100),
            sale_value: Some(Money::from_major(2500)),
            ..NewOrder::default()
        });
        let without_value = order_with(NewOrder {
            untaxed_total: Money::from_major(2000),
            amount_total: Money::from_major(2100),
            ..NewOrder::default()
        });
        let config =
            RecipientConfig::percent(Slot::Referrer, party(), CalcType::PercentOfSalesValue, Rate::from_bps(200));
        assert_eq!(evaluate(&with_value, &config).unwrap(), Money::from_major(50));
        assert_eq!(evaluate(&without_value, &config).unwrap(), Money::from_major(42));
    }

    #[test]
    fn test_fixed_amount_and_null_party() {
        let order = order_with(NewOrder::default());
        let fixed = RecipientConfig::fixed(Slot::Broker, party(), Money::from_major(100));
        let eval = evaluate_detailed(&order, &fixed).unwrap();
        assert_eq!(eval.amount, Money::from_major(100));
        assert_eq!(eval.base, Money::zero());

        let disabled = RecipientConfig::fixed(Slot::Broker, None, Money::from_major(100));
        assert_eq!(evaluate(&order, &disabled).unwrap(), Money::zero());
    }

    #[test]
    fn test_disabled_slot_skips_validation() {
        let order = order_with(NewOrder::default());
        let disabled = RecipientConfig::fixed(Slot::Broker, None, Money::from_cents(-5));
        assert_eq!(evaluate(&order, &disabled).unwrap(), Money::zero());

        let enabled = RecipientConfig::fixed(Slot::Broker, party(), Money::from_cents(-5));
        assert_eq!(evaluate(&order, &enabled).unwrap_err().kind(), ErrorKind::InvalidRate);

        let too_high = RecipientConfig::percent(
            Slot::Agent1,
            party(),
            CalcType::PercentOfUntaxed,
            Rate::from_bps(10_001),
        );
        assert_eq!(evaluate(&order, &too_high).unwrap_err().kind(), ErrorKind::InvalidRate);
    }

    #[test]
    fn test_half_even_on_commission() {
        let order = order_with(NewOrder {
            untaxed_total: Money::from_cents(1050),
            amount_total: Money::from_cents(1050),
            ..NewOrder::default()
        });
        let config =
            RecipientConfig::percent(Slot::Agent1, party(), CalcType::PercentOfUntaxed, Rate::from_bps(500));
        // 10.50 × 5% = 0.525 → 0.52
        assert_eq!(evaluate(&order, &config).unwrap(), Money::from_cents(52));
    }

    #[test]
    fn test_recipient_status_table() {
        use CommissionStatus::*;
        assert_eq!(recipient_status(Draft, Slot::Broker), RecipientStatus::Draft);
        assert_eq!(recipient_status(Calculated, Slot::Agent1), RecipientStatus::Pending);
        assert_eq!(recipient_status(Confirmed, Slot::Agent1), RecipientStatus::Approved);
        assert_eq!(recipient_status(Confirmed, Slot::Director), RecipientStatus::Approved);
        assert_eq!(recipient_status(Confirmed, Slot::Referrer), RecipientStatus::Pending);
        assert_eq!(recipient_status(Confirmed, Slot::OtherExternal), RecipientStatus::Pending);
        assert_eq!(recipient_status(Confirmed, Slot::Broker), RecipientStatus::Paid);
        assert_eq!(recipient_status(Confirmed, Slot::Cashback), RecipientStatus::Paid);
        assert_eq!(recipient_status(Paid, Slot::Manager), RecipientStatus::Paid);
        for status in CommissionStatus::ALL {
            assert_eq!(recipient_status(status, Slot::ManagerLegacy), RecipientStatus::Legacy);
        }
    }
}
