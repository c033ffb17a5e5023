//! # Commission Workflow
//!
//! Owns when commission totals become durable and when payouts exist.
//!
//! ## Transition Table
//! ```text
//! ┌────────────┬───────────┬────────────┬─────────────────────────────────┐
//! │ From       │ Verb      │ To         │ Guard / side effect             │
//! ├────────────┼───────────┼────────────┼─────────────────────────────────┤
//! │ draft      │ calculate │ calculated │ run allocation, store totals    │
//! │ draft      │ reset     │ draft      │ -                               │
//! │ calculated │ confirm   │ confirmed  │ allocation ≠ over; reference    │
//! │            │           │            │ from sequence; payouts created  │
//! │ calculated │ reset     │ draft      │ clear totals                    │
//! │ confirmed  │ confirm   │ confirmed  │ no-op                           │
//! │ confirmed  │ pay       │ paid       │ every payout posted             │
//! │ confirmed  │ reset     │ draft      │ cancel unposted payouts,        │
//! │            │           │            │ clear reference                 │
//! │ paid       │ -         │ -          │ terminal                        │
//! └────────────┴───────────┴────────────┴─────────────────────────────────┘
//! ```
//!
//! ## Verb Anatomy
//! ```text
//! require capability ─► begin session ─► load order ─► check table
//!        ─► side effects via Order::apply_effect ─► audit ─► save ─► commit
//!        ─► notify (best-effort, after commit)
//! ```
//! A failure anywhere before commit drops the session, so nothing is
//! written. Conflicts surface to the caller, who may re-run the verb.

use serde_json::json;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::commission::allocation::{allocate, AllocationStatus};
use crate::commission::report::{build_report, CommissionReport};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::order::{
    CommissionEffect, CommissionStatus, Order, OrderId, OrderMutation, PayoutOrder, PayoutState,
    RecipientConfig, Slot,
};
use crate::ports::{require_capability, Identity, Ports, Session};
use crate::types::{Actor, AuditEntry, Capability};

/// Sequence that issues commission references.
pub const COMMISSION_SEQUENCE: &str = "commission.reference";

const ENTITY: &str = "order";

// =============================================================================
// Verbs & Transition Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommissionVerb {
    Calculate,
    Confirm,
    Pay,
    Reset,
}

impl CommissionVerb {
    pub const ALL: [CommissionVerb; 4] = [
        CommissionVerb::Calculate,
        CommissionVerb::Confirm,
        CommissionVerb::Pay,
        CommissionVerb::Reset,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            CommissionVerb::Calculate => "calculate",
            CommissionVerb::Confirm => "confirm",
            CommissionVerb::Pay => "pay",
            CommissionVerb::Reset => "reset",
        }
    }

    pub const fn capability(&self) -> Capability {
        match self {
            CommissionVerb::Calculate => Capability::CommissionCalculate,
            CommissionVerb::Confirm => Capability::CommissionConfirm,
            CommissionVerb::Pay => Capability::CommissionPay,
            CommissionVerb::Reset => Capability::CommissionReset,
        }
    }

    /// Notification kind emitted after a successful run.
    const fn event(&self) -> &'static str {
        match self {
            CommissionVerb::Calculate => "commission.calculated",
            CommissionVerb::Confirm => "commission.confirmed",
            CommissionVerb::Pay => "commission.paid",
            CommissionVerb::Reset => "commission.reset",
        }
    }
}

impl fmt::Display for CommissionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommissionVerb {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommissionVerb::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "verb".to_string(),
                reason: format!("unknown commission verb '{}'", s),
            })
    }
}

/// Target state for `verb` from `from`, or `None` if the table has no row.
pub fn commission_transition(from: CommissionStatus, verb: CommissionVerb) -> Option<CommissionStatus> {
    use CommissionStatus::*;
    use CommissionVerb::*;
    match (from, verb) {
        (Draft, Calculate) => Some(Calculated),
        (Draft, CommissionVerb::Reset) => Some(Draft),
        (Calculated, Confirm) => Some(Confirmed),
        (Calculated, CommissionVerb::Reset) => Some(Draft),
        (Confirmed, Confirm) => Some(Confirmed),
        (Confirmed, Pay) => Some(CommissionStatus::Paid),
        (Confirmed, CommissionVerb::Reset) => Some(Draft),
        _ => None,
    }
}

/// Verbs with a row in the table for `from`.
pub fn permitted_commission_verbs(from: CommissionStatus) -> Vec<CommissionVerb> {
    CommissionVerb::ALL
        .iter()
        .copied()
        .filter(|verb| commission_transition(from, *verb).is_some())
        .collect()
}

// =============================================================================
// Workflow Service
// =============================================================================

/// Commission verbs for one caller.
pub struct CommissionWorkflow<'a> {
    ports: &'a Ports,
    identity: &'a dyn Identity,
}

impl<'a> CommissionWorkflow<'a> {
    pub fn new(ports: &'a Ports, identity: &'a dyn Identity) -> Self {
        Self { ports, identity }
    }

    /// Reads an order. No capability required.
    pub fn get(&self, id: &str) -> CoreResult<Order> {
        let mut session = self.ports.store.begin()?;
        let order = session.load_order(id)?;
        session.rollback();
        Ok(order)
    }

    /// Commission report dataset for one order.
    pub fn report(&self, id: &str) -> CoreResult<CommissionReport> {
        build_report(&self.get(id)?)
    }

    /// Applies an order edit on behalf of a commission manager.
    pub fn edit(&self, id: &str, mutation: OrderMutation) -> CoreResult<Order> {
        let actor = require_capability(self.identity, Capability::CommissionCalculate)?;
        let mut session = self.ports.store.begin()?;
        let mut order = session.load_order(id)?;
        let from = order.commission_status();
        let action = mutation.action();

        order.apply(mutation)?;
        order.record(
            AuditEntry::new(self.ports.clock.now(), &actor, action)
                .transition(from, order.commission_status()),
        );
        session.save_order(&order)?;
        session.commit()?;

        info!(order_id = %id, action, actor = %actor.id, "Order edited");
        Ok(order)
    }

    pub fn set_recipient(&self, id: &str, config: RecipientConfig) -> CoreResult<Order> {
        self.edit(id, OrderMutation::SetRecipient(config))
    }

    pub fn clear_recipient(&self, id: &str, slot: Slot) -> CoreResult<Order> {
        self.edit(id, OrderMutation::ClearRecipient(slot))
    }

    pub fn calculate(&self, id: &str) -> CoreResult<Order> {
        self.run(id, CommissionVerb::Calculate)
    }

    /// Idempotent: confirming a confirmed order returns it unchanged.
    pub fn confirm(&self, id: &str) -> CoreResult<Order> {
        self.run(id, CommissionVerb::Confirm)
    }

    pub fn pay(&self, id: &str) -> CoreResult<Order> {
        self.run(id, CommissionVerb::Pay)
    }

    pub fn reset(&self, id: &str) -> CoreResult<Order> {
        self.run(id, CommissionVerb::Reset)
    }

    /// Runs one verb of the transition table.
    pub fn run(&self, id: &str, verb: CommissionVerb) -> CoreResult<Order> {
        let actor = require_capability(self.identity, verb.capability())?;
        let mut session = self.ports.store.begin()?;
        let mut order = session.load_order(id)?;
        let from = order.commission_status();

        if verb == CommissionVerb::Confirm && from == CommissionStatus::Confirmed {
            debug!(order_id = %id, "Commission already confirmed");
            session.rollback();
            return Ok(order);
        }

        let to = commission_transition(from, verb)
            .ok_or_else(|| CoreError::illegal(ENTITY, from, verb))?;

        let note = match verb {
            CommissionVerb::Calculate => {
                let allocation = allocate(&order)?;
                let status = allocation.totals.allocation_status;
                order.apply_effect(CommissionEffect::Calculated {
                    amounts: allocation.amounts,
                    totals: allocation.totals,
                })?;
                Some(format!("allocation {:?}", status).to_lowercase())
            }
            CommissionVerb::Confirm => Some(self.confirm_effect(session.as_mut(), &mut order)?),
            CommissionVerb::Pay => {
                if !order.payouts_settled() {
                    return Err(CoreError::illegal_because(
                        ENTITY,
                        from,
                        verb,
                        "not every payout has been posted",
                    ));
                }
                order.apply_effect(CommissionEffect::Paid {
                    date: self.ports.clock.today(),
                })?;
                None
            }
            CommissionVerb::Reset => {
                order.apply_effect(CommissionEffect::Reset)?;
                None
            }
        };

        let mut entry = AuditEntry::new(self.ports.clock.now(), &actor, verb.as_str()).transition(from, to);
        if let Some(note) = note {
            entry = entry.with_note(note);
        }
        order.record(entry);
        session.save_order(&order)?;
        session.commit()?;

        info!(
            order_id = %id,
            verb = %verb,
            from = %from,
            to = %to,
            actor = %actor.id,
            "Commission transition"
        );
        self.ports.notify(
            verb.event(),
            json!({
                "order_id": order.id(),
                "order_reference": order.reference(),
                "commission_reference": order.commission_reference(),
                "status": to,
            }),
        );
        Ok(order)
    }

    fn confirm_effect(&self, session: &mut (dyn Session + '_), order: &mut Order) -> CoreResult<String> {
        let from = order.commission_status();
        let totals = order.totals().cloned().ok_or_else(|| {
            CoreError::illegal_because(ENTITY, from, CommissionVerb::Confirm, "totals are missing")
        })?;
        if totals.allocation_status == AllocationStatus::Over {
            return Err(CoreError::illegal_because(
                ENTITY,
                from,
                CommissionVerb::Confirm,
                format!(
                    "total payable {} exceeds untaxed total {}",
                    totals.total_payable,
                    order.untaxed_total()
                ),
            ));
        }

        let sequence = session.next_sequence(COMMISSION_SEQUENCE)?;
        let reference = format!("COMM/{:05}", sequence);

        let payouts: Vec<PayoutOrder> = order
            .enabled_recipients()
            .filter_map(|config| {
                let party = config.party.clone()?;
                let amount = match totals.scale {
                    Some(scale) => scale.apply(config.computed_amount),
                    None => config.computed_amount,
                };
                amount.is_positive().then(|| PayoutOrder {
                    id: format!("{}/{}", reference, config.slot),
                    recipient: party,
                    slot: config.slot,
                    amount,
                    origin_order: order.id().to_string(),
                    commission_reference: reference.clone(),
                    description: format!(
                        "{} commission on {} ({})",
                        config.slot.label(),
                        order.reference(),
                        reference
                    ),
                    state: PayoutState::Created,
                })
            })
            .collect();

        debug!(order_id = %order.id(), reference = %reference, payouts = payouts.len(), "Creating payouts");
        order.apply_effect(CommissionEffect::Confirmed {
            reference: reference.clone(),
            payouts,
        })?;
        Ok(reference)
    }

    /// Records that a payout was posted downstream.
    pub fn mark_payout_posted(&self, id: &str, payout_id: &str) -> CoreResult<Order> {
        let actor = require_capability(self.identity, Capability::CommissionPay)?;
        let mut session = self.ports.store.begin()?;
        let mut order = session.load_order(id)?;
        let status = order.commission_status();
        if status != CommissionStatus::Confirmed {
            return Err(CoreError::illegal(ENTITY, status, "post payout"));
        }

        order.apply_effect(CommissionEffect::PayoutPosted {
            payout_id: payout_id.to_string(),
        })?;
        order.record(
            AuditEntry::new(self.ports.clock.now(), &actor, "payout.posted").with_note(payout_id),
        );
        session.save_order(&order)?;
        session.commit()?;

        info!(order_id = %id, payout_id, "Payout posted");
        Ok(order)
    }

    /// Periodic tick: moves confirmed orders whose payouts are all posted to
    /// paid. Each order is advanced in its own session and guarded by its
    /// commission reference, so concurrent ticks advance an order once.
    pub fn advance_settled(&self) -> CoreResult<Vec<OrderId>> {
        let actor = require_capability(self.identity, Capability::CommissionPay)?;

        let candidates: Vec<(OrderId, String)> = {
            let mut session = self.ports.store.begin()?;
            let orders = session.orders()?;
            session.rollback();
            orders
                .iter()
                .filter(|o| o.commission_status() == CommissionStatus::Confirmed && o.payouts_settled())
                .filter_map(|o| Some((o.id().to_string(), o.commission_reference()?.to_string())))
                .collect()
        };

        let mut advanced = Vec::new();
        for (id, reference) in candidates {
            match self.settle_one(&actor, &id, &reference) {
                Ok(true) => advanced.push(id),
                Ok(false) => debug!(order_id = %id, "Order no longer eligible for settlement"),
                Err(e) if e.is_retryable() => {
                    debug!(order_id = %id, "Another tick settled the order first")
                }
                Err(e) => warn!(order_id = %id, error = %e, "Settlement skipped"),
            }
        }
        if !advanced.is_empty() {
            info!(count = advanced.len(), "Settled commission orders");
        }
        Ok(advanced)
    }

    fn settle_one(&self, actor: &Actor, id: &str, reference: &str) -> CoreResult<bool> {
        let mut session = self.ports.store.begin()?;
        let mut order = session.load_order(id)?;
        if order.commission_status() != CommissionStatus::Confirmed
            || order.commission_reference() != Some(reference)
            || !order.payouts_settled()
        {
            session.rollback();
            return Ok(false);
        }

        order.apply_effect(CommissionEffect::Paid {
            date: self.ports.clock.today(),
        })?;
        order.record(
            AuditEntry::new(self.ports.clock.now(), actor, CommissionVerb::Pay.as_str())
                .transition(CommissionStatus::Confirmed, CommissionStatus::Paid)
                .with_note("settled"),
        );
        session.save_order(&order)?;
        session.commit()?;

        self.ports.notify(
            CommissionVerb::Pay.event(),
            json!({
                "order_id": order.id(),
                "order_reference": order.reference(),
                "commission_reference": reference,
                "status": CommissionStatus::Paid,
            }),
        );
        Ok(true)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
