//! Commission report dataset, one per order.
//!
//! Consumed by the external PDF renderer, so every date is pre-formatted
//! and every amount is in cents.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::commission::allocation::AllocationStatus;
use crate::commission::evaluator::{evaluate_detailed, recipient_status};
use crate::error::CoreResult;
use crate::money::Money;
use crate::order::{CalcType, CommissionStatus, Order, RecipientStatus, Slot, SlotGroup};
use crate::types::EntityRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionReport {
    pub header: ReportHeader,
    pub recipients: Vec<ReportRecipient>,
    pub subtotals: ReportSubtotals,
    pub grand_total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportHeader {
    pub order_reference: String,
    pub customer: EntityRef,
    pub salesperson: EntityRef,
    pub currency: String,
    /// `YYYY-MM-DD`.
    pub order_date: String,
    pub commission_status: CommissionStatus,
    pub commission_reference: Option<String>,
    pub payment_date: Option<String>,
    pub untaxed_total: Money,
    pub amount_total: Money,
    pub allocation_status: Option<AllocationStatus>,
    pub company_share: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportRecipient {
    pub party: EntityRef,
    pub slot: Slot,
    pub calc_type: CalcType,
    /// Zero for fixed amounts.
    pub base: Money,
    /// Percent, e.g. `2.5`. Zero for fixed amounts.
    pub rate: f64,
    pub amount: Money,
    pub status: RecipientStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportSubtotals {
    pub external: Money,
    pub internal: Money,
    pub legacy: Money,
}

/// Builds the report for `order`.
///
/// Draft orders show live evaluations; once calculated the stored amounts
/// are reported, so the report matches what was confirmed.
pub fn build_report(order: &Order) -> CoreResult<CommissionReport> {
    let status = order.commission_status();
    let mut subtotals = ReportSubtotals::default();
    let mut recipients = Vec::new();

    for config in order.enabled_recipients() {
        let Some(party) = config.party.clone() else {
            continue;
        };
        let evaluation = evaluate_detailed(order, config)?;
        let amount = match status {
            CommissionStatus::Draft => evaluation.amount,
            _ => config.computed_amount,
        };
        match config.slot.group() {
            SlotGroup::External => subtotals.external += amount,
            SlotGroup::Internal => subtotals.internal += amount,
            SlotGroup::Legacy => subtotals.legacy += amount,
        }
        recipients.push(ReportRecipient {
            party,
            slot: config.slot,
            calc_type: config.calc_type,
            base: evaluation.base,
            rate: if config.calc_type.is_percent() {
                config.rate.percentage()
            } else {
                0.0
            },
            amount,
            status: recipient_status(status, config.slot),
        });
    }

    let totals = order.totals();
    Ok(CommissionReport {
        header: ReportHeader {
            order_reference: order.reference().to_string(),
            customer: order.customer().clone(),
            salesperson: order.salesperson().clone(),
            currency: order.currency().to_string(),
            order_date: order.order_date().format("%Y-%m-%d").to_string(),
            commission_status: status,
            commission_reference: order.commission_reference().map(str::to_string),
            payment_date: order
                .payment_date()
                .map(|d| d.format("%Y-%m-%d").to_string()),
            untaxed_total: order.untaxed_total(),
            amount_total: order.amount_total(),
            allocation_status: totals.map(|t| t.allocation_status),
            company_share: totals.map(|t| t.company_share),
        },
        recipients,
        grand_total: subtotals.external + subtotals.internal + subtotals.legacy,
        subtotals,
    })
}
