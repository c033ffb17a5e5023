//! # Order Model
//!
//! Sale orders as seen by the commission engine: totals, lines, recipient
//! slots, the commission status and the payouts created at confirmation.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order                                                                  │
//! │  ├── lines: Vec<Line>                  (owned)                          │
//! │  ├── recipients: Vec<RecipientConfig>  (owned, one per Slot)            │
//! │  ├── totals: Option<CommissionTotals>  (derived, cached at calculate)   │
//! │  ├── payouts: Vec<PayoutOrder>         (owned, created at confirm)      │
//! │  └── audit: Vec<AuditEntry>            (append-only)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Path
//! Fields are private. The only ways to change an order are
//! [`Order::apply`] (edits) and the crate-private commission effects used by
//! the workflow. Both run against a scratch copy and only swap it in once
//! [`Order::check_invariants`] passes, so a failed write leaves the order
//! untouched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::commission::allocation::{AllocationStatus, CommissionTotals};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{AuditEntry, EntityRef, Quantity, Rate};
use crate::validation::{
    validate_commission_input, validate_currency, validate_non_negative_amount,
    validate_percent_rate,
};

/// Opaque order identifier.
pub type OrderId = String;

const ENTITY: &str = "order";

// =============================================================================
// Enumerations
// =============================================================================

/// Sales lifecycle state of the order (owned by the ERP, read by analytics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    #[default]
    Draft,
    Sent,
    Sale,
    Done,
    Cancel,
}

impl OrderState {
    pub const ALL: [OrderState; 5] = [
        OrderState::Draft,
        OrderState::Sent,
        OrderState::Sale,
        OrderState::Done,
        OrderState::Cancel,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderState::Draft => "draft",
            OrderState::Sent => "sent",
            OrderState::Sale => "sale",
            OrderState::Done => "done",
            OrderState::Cancel => "cancel",
        }
    }

    /// Draft and sent orders are quotations.
    pub const fn is_quotation(&self) -> bool {
        matches!(self, OrderState::Draft | OrderState::Sent)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    No,
    ToInvoice,
    Invoiced,
    Upselling,
}

/// Commission lifecycle, driven by the commission workflow verbs.
///
/// ```text
/// draft ──calculate──► calculated ──confirm──► confirmed ──pay──► paid
///   ▲                      │                      │
///   └────────reset─────────┴────────reset─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    #[default]
    Draft,
    Calculated,
    Confirmed,
    Paid,
}

impl CommissionStatus {
    pub const ALL: [CommissionStatus; 4] = [
        CommissionStatus::Draft,
        CommissionStatus::Calculated,
        CommissionStatus::Confirmed,
        CommissionStatus::Paid,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Draft => "draft",
            CommissionStatus::Calculated => "calculated",
            CommissionStatus::Confirmed => "confirmed",
            CommissionStatus::Paid => "paid",
        }
    }

    /// Recipient, line and amount edits are only accepted before confirmation.
    pub const fn accepts_edits(&self) -> bool {
        matches!(self, CommissionStatus::Draft | CommissionStatus::Calculated)
    }

    /// A commission reference exists exactly in these states.
    pub const fn has_reference(&self) -> bool {
        matches!(self, CommissionStatus::Confirmed | CommissionStatus::Paid)
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Slots
// =============================================================================

/// How a slot's amount is grouped in totals and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SlotGroup {
    External,
    Internal,
    Legacy,
}

/// Commission recipient position on an order. Fixed enumeration.
///
/// Declaration order is report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Broker,
    Referrer,
    Cashback,
    OtherExternal,
    Agent1,
    Agent2,
    Manager,
    Director,
    ConsultantLegacy,
    ManagerLegacy,
    SecondAgentLegacy,
    DirectorLegacy,
    ExternalPartyLegacy,
}

impl Slot {
    pub const ALL: [Slot; 13] = [
        Slot::Broker,
        Slot::Referrer,
        Slot::Cashback,
        Slot::OtherExternal,
        Slot::Agent1,
        Slot::Agent2,
        Slot::Manager,
        Slot::Director,
        Slot::ConsultantLegacy,
        Slot::ManagerLegacy,
        Slot::SecondAgentLegacy,
        Slot::DirectorLegacy,
        Slot::ExternalPartyLegacy,
    ];

    pub const fn group(&self) -> SlotGroup {
        match self {
            Slot::Broker | Slot::Referrer | Slot::Cashback | Slot::OtherExternal => {
                SlotGroup::External
            }
            Slot::Agent1 | Slot::Agent2 | Slot::Manager | Slot::Director => SlotGroup::Internal,
            Slot::ConsultantLegacy
            | Slot::ManagerLegacy
            | Slot::SecondAgentLegacy
            | Slot::DirectorLegacy
            | Slot::ExternalPartyLegacy => SlotGroup::Legacy,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Slot::Broker => "broker",
            Slot::Referrer => "referrer",
            Slot::Cashback => "cashback",
            Slot::OtherExternal => "other_external",
            Slot::Agent1 => "agent1",
            Slot::Agent2 => "agent2",
            Slot::Manager => "manager",
            Slot::Director => "director",
            Slot::ConsultantLegacy => "consultant_legacy",
            Slot::ManagerLegacy => "manager_legacy",
            Slot::SecondAgentLegacy => "second_agent_legacy",
            Slot::DirectorLegacy => "director_legacy",
            Slot::ExternalPartyLegacy => "external_party_legacy",
        }
    }

    /// Human label used in payout descriptions.
    pub const fn label(&self) -> &'static str {
        match self {
            Slot::Broker => "Broker",
            Slot::Referrer => "Referrer",
            Slot::Cashback => "Cashback",
            Slot::OtherExternal => "External Party",
            Slot::Agent1 => "Agent",
            Slot::Agent2 => "Second Agent",
            Slot::Manager => "Manager",
            Slot::Director => "Director",
            Slot::ConsultantLegacy => "Consultant (legacy)",
            Slot::ManagerLegacy => "Manager (legacy)",
            Slot::SecondAgentLegacy => "Second Agent (legacy)",
            Slot::DirectorLegacy => "Director (legacy)",
            Slot::ExternalPartyLegacy => "External Party (legacy)",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::ALL
            .iter()
            .copied()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "slot".to_string(),
                reason: format!("unknown slot '{}'", s),
            })
    }
}

// =============================================================================
// Recipient Configuration
// =============================================================================

/// Base a recipient's commission is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalcType {
    PercentOfUnitPrice,
    PercentOfLineTotal,
    PercentOfUntaxed,
    PercentOfSalesValue,
    Fixed,
}

impl CalcType {
    pub const fn is_percent(&self) -> bool {
        !matches!(self, CalcType::Fixed)
    }
}

/// Per-recipient status shown on commission reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Draft,
    Pending,
    Approved,
    Paid,
    Legacy,
}

/// One recipient slot bound to a party plus its calculation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientConfig {
    pub slot: Slot,
    /// `None` disables the slot; it then contributes zero.
    pub party: Option<EntityRef>,
    pub calc_type: CalcType,
    /// Meaningful for percent variants.
    pub rate: Rate,
    /// Meaningful for [`CalcType::Fixed`].
    pub fixed_amount: Money,
    /// Stored result of the last calculation (unscaled).
    pub computed_amount: Money,
}

impl RecipientConfig {
    pub fn percent(slot: Slot, party: Option<EntityRef>, calc_type: CalcType, rate: Rate) -> Self {
        Self {
            slot,
            party,
            calc_type,
            rate,
            fixed_amount: Money::zero(),
            computed_amount: Money::zero(),
        }
    }

    pub fn fixed(slot: Slot, party: Option<EntityRef>, amount: Money) -> Self {
        Self {
            slot,
            party,
            calc_type: CalcType::Fixed,
            rate: Rate::zero(),
            fixed_amount: amount,
            computed_amount: Money::zero(),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.party.is_some()
    }

    /// Field-level checks: percent rate in [0, 100], fixed amount ≥ 0.
    pub fn validate(&self) -> CoreResult<()> {
        if self.calc_type.is_percent() {
            validate_percent_rate(self.rate)?;
        }
        validate_commission_input("fixed_amount", self.fixed_amount)
    }
}

// =============================================================================
// Lines
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub product: EntityRef,
    pub qty: Quantity,
    pub price_unit: Money,
    pub taxes: Vec<String>,
    /// `price_unit × qty`, recomputed on every write.
    pub subtotal: Money,
}

impl Line {
    pub fn new(product: EntityRef, qty: Quantity, price_unit: Money) -> Self {
        Self {
            product,
            qty,
            price_unit,
            taxes: Vec::new(),
            subtotal: price_unit.multiply_quantity(qty),
        }
    }

    pub fn with_taxes(mut self, taxes: Vec<String>) -> Self {
        self.taxes = taxes;
        self
    }
}

// =============================================================================
// Payout Orders
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PayoutState {
    Created,
    Posted,
    Cancelled,
}

/// Downstream obligation created for a recipient when commission is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutOrder {
    pub id: String,
    pub recipient: EntityRef,
    pub slot: Slot,
    pub amount: Money,
    pub origin_order: OrderId,
    /// Commission reference of the confirmation that created this payout.
    pub commission_reference: String,
    pub description: String,
    pub state: PayoutState,
}

// =============================================================================
// Order
// =============================================================================

/// Optional real-estate fields layered on top of a plain sale order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlays {
    pub booking_date: Option<NaiveDate>,
    pub sale_order_type: Option<EntityRef>,
    pub project: Option<EntityRef>,
    pub unit: Option<EntityRef>,
    pub buyer: Option<EntityRef>,
}

/// Input for [`Order::create`].
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub reference: String,
    pub customer: EntityRef,
    pub salesperson: EntityRef,
    pub currency: String,
    pub untaxed_total: Money,
    pub amount_total: Money,
    pub sale_value: Option<Money>,
    pub order_date: NaiveDate,
    pub state: OrderState,
    pub invoice_status: InvoiceStatus,
    pub invoice_amount: Option<Money>,
    pub overlays: Overlays,
    pub lines: Vec<Line>,
    pub recipients: Vec<RecipientConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    reference: String,
    customer: EntityRef,
    salesperson: EntityRef,
    currency: String,
    untaxed_total: Money,
    amount_total: Money,
    sale_value: Option<Money>,
    order_date: NaiveDate,
    state: OrderState,
    invoice_status: InvoiceStatus,
    invoice_amount: Option<Money>,
    overlays: Overlays,
    lines: Vec<Line>,
    recipients: Vec<RecipientConfig>,
    commission_status: CommissionStatus,
    commission_reference: Option<String>,
    payment_date: Option<NaiveDate>,
    totals: Option<CommissionTotals>,
    payouts: Vec<PayoutOrder>,
    audit: Vec<AuditEntry>,
}

/// Edits accepted through [`Order::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum OrderMutation {
    /// Insert or replace the config for `config.slot`.
    SetRecipient(RecipientConfig),
    ClearRecipient(Slot),
    SetLines(Vec<Line>),
    SetAmounts {
        untaxed_total: Money,
        amount_total: Money,
        sale_value: Option<Money>,
    },
    SetOverlays(Overlays),
    SetState(OrderState),
    SetInvoiceStatus {
        status: InvoiceStatus,
        invoice_amount: Option<Money>,
    },
}

impl OrderMutation {
    /// Whether the edit changes a commission input.
    fn touches_commission(&self) -> bool {
        matches!(
            self,
            OrderMutation::SetRecipient(_)
                | OrderMutation::ClearRecipient(_)
                | OrderMutation::SetLines(_)
                | OrderMutation::SetAmounts { .. }
        )
    }

    /// Audit action name.
    pub fn action(&self) -> &'static str {
        match self {
            OrderMutation::SetRecipient(_) => "recipient.set",
            OrderMutation::ClearRecipient(_) => "recipient.clear",
            OrderMutation::SetLines(_) => "lines.set",
            OrderMutation::SetAmounts { .. } => "amounts.set",
            OrderMutation::SetOverlays(_) => "overlays.set",
            OrderMutation::SetState(_) => "state.set",
            OrderMutation::SetInvoiceStatus { .. } => "invoice_status.set",
        }
    }
}

/// State changes owned by the commission workflow.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CommissionEffect {
    Calculated {
        amounts: Vec<(Slot, Money)>,
        totals: CommissionTotals,
    },
    Confirmed {
        reference: String,
        payouts: Vec<PayoutOrder>,
    },
    PayoutPosted {
        payout_id: String,
    },
    Paid {
        date: NaiveDate,
    },
    Reset,
}

impl Order {
    /// Builds a draft order and checks every invariant.
    pub fn create(id: impl Into<OrderId>, new: NewOrder) -> CoreResult<Self> {
        let currency = if new.currency.is_empty() {
            crate::DEFAULT_CURRENCY.to_string()
        } else {
            new.currency
        };
        let mut order = Order {
            id: id.into(),
            reference: new.reference,
            customer: new.customer,
            salesperson: new.salesperson,
            currency,
            untaxed_total: new.untaxed_total,
            amount_total: new.amount_total,
            sale_value: new.sale_value,
            order_date: new.order_date,
            state: new.state,
            invoice_status: new.invoice_status,
            invoice_amount: new.invoice_amount,
            overlays: new.overlays,
            lines: Vec::new(),
            recipients: Vec::new(),
            commission_status: CommissionStatus::Draft,
            commission_reference: None,
            payment_date: None,
            totals: None,
            payouts: Vec::new(),
            audit: Vec::new(),
        };
        order.set_lines(new.lines);
        for config in new.recipients {
            order.upsert_recipient(config);
        }
        order.check_invariants()?;
        Ok(order)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn customer(&self) -> &EntityRef {
        &self.customer
    }

    pub fn salesperson(&self) -> &EntityRef {
        &self.salesperson
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn untaxed_total(&self) -> Money {
        self.untaxed_total
    }

    pub fn amount_total(&self) -> Money {
        self.amount_total
    }

    pub fn sale_value(&self) -> Option<Money> {
        self.sale_value
    }

    pub fn order_date(&self) -> NaiveDate {
        self.order_date
    }

    pub fn booking_date(&self) -> Option<NaiveDate> {
        self.overlays.booking_date
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn invoice_status(&self) -> InvoiceStatus {
        self.invoice_status
    }

    pub fn invoice_amount(&self) -> Option<Money> {
        self.invoice_amount
    }

    pub fn overlays(&self) -> &Overlays {
        &self.overlays
    }

    pub fn sale_order_type(&self) -> Option<&EntityRef> {
        self.overlays.sale_order_type.as_ref()
    }

    pub fn project(&self) -> Option<&EntityRef> {
        self.overlays.project.as_ref()
    }

    pub fn unit(&self) -> Option<&EntityRef> {
        self.overlays.unit.as_ref()
    }

    pub fn buyer(&self) -> Option<&EntityRef> {
        self.overlays.buyer.as_ref()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn recipients(&self) -> &[RecipientConfig] {
        &self.recipients
    }

    pub fn recipient(&self, slot: Slot) -> Option<&RecipientConfig> {
        self.recipients.iter().find(|r| r.slot == slot)
    }

    pub fn enabled_recipients(&self) -> impl Iterator<Item = &RecipientConfig> {
        self.recipients.iter().filter(|r| r.is_enabled())
    }

    pub fn commission_status(&self) -> CommissionStatus {
        self.commission_status
    }

    pub fn commission_reference(&self) -> Option<&str> {
        self.commission_reference.as_deref()
    }

    pub fn payment_date(&self) -> Option<NaiveDate> {
        self.payment_date
    }

    pub fn totals(&self) -> Option<&CommissionTotals> {
        self.totals.as_ref()
    }

    pub fn payouts(&self) -> &[PayoutOrder] {
        &self.payouts
    }

    /// Payouts created by the current confirmation.
    pub fn active_payouts(&self) -> impl Iterator<Item = &PayoutOrder> {
        let reference = self.commission_reference.as_deref();
        self.payouts
            .iter()
            .filter(move |p| Some(p.commission_reference.as_str()) == reference)
    }

    /// True once every payout of the current confirmation has been posted.
    pub fn payouts_settled(&self) -> bool {
        self.commission_reference.is_some()
            && self.active_payouts().all(|p| p.state == PayoutState::Posted)
    }

    pub fn audit(&self) -> &[AuditEntry] {
        &self.audit
    }

    // -------------------------------------------------------------------------
    // Write path
    // -------------------------------------------------------------------------

    /// Applies an edit atomically.
    ///
    /// Commission inputs (recipients, lines, amounts) are frozen once the
    /// commission is confirmed. Editing them on a calculated order discards
    /// the stale totals and returns the commission to draft.
    pub fn apply(&mut self, mutation: OrderMutation) -> CoreResult<()> {
        self.transact(|order| {
            if mutation.touches_commission() {
                if !order.commission_status.accepts_edits() {
                    return Err(CoreError::invariant(
                        ENTITY,
                        format!(
                            "commission is {}; reset it before editing {}",
                            order.commission_status,
                            mutation.action()
                        ),
                    ));
                }
                order.discard_calculation();
            }
            match mutation {
                OrderMutation::SetRecipient(config) => {
                    config.validate()?;
                    order.upsert_recipient(config);
                }
                OrderMutation::ClearRecipient(slot) => {
                    order.recipients.retain(|r| r.slot != slot);
                }
                OrderMutation::SetLines(lines) => order.set_lines(lines),
                OrderMutation::SetAmounts {
                    untaxed_total,
                    amount_total,
                    sale_value,
                } => {
                    order.untaxed_total = untaxed_total;
                    order.amount_total = amount_total;
                    order.sale_value = sale_value;
                }
                OrderMutation::SetOverlays(overlays) => order.overlays = overlays,
                OrderMutation::SetState(state) => order.state = state,
                OrderMutation::SetInvoiceStatus {
                    status,
                    invoice_amount,
                } => {
                    order.invoice_status = status;
                    order.invoice_amount = invoice_amount;
                }
            }
            Ok(())
        })
    }

    pub(crate) fn apply_effect(&mut self, effect: CommissionEffect) -> CoreResult<()> {
        self.transact(|order| {
            match effect {
                CommissionEffect::Calculated { amounts, totals } => {
                    for config in order.recipients.iter_mut() {
                        config.computed_amount = amounts
                            .iter()
                            .find(|(slot, _)| *slot == config.slot)
                            .map(|(_, amount)| *amount)
                            .unwrap_or_default();
                    }
                    order.totals = Some(totals);
                    order.commission_status = CommissionStatus::Calculated;
                }
                CommissionEffect::Confirmed { reference, payouts } => {
                    if order.commission_reference.is_some() {
                        return Err(CoreError::invariant(
                            ENTITY,
                            "commission reference is already assigned",
                        ));
                    }
                    order.commission_reference = Some(reference);
                    order.payouts.extend(payouts);
                    order.commission_status = CommissionStatus::Confirmed;
                }
                CommissionEffect::PayoutPosted { payout_id } => {
                    let payout = order
                        .payouts
                        .iter_mut()
                        .find(|p| p.id == payout_id)
                        .ok_or_else(|| CoreError::not_found("payout", payout_id.clone()))?;
                    match payout.state {
                        PayoutState::Cancelled => {
                            return Err(CoreError::invariant(
                                ENTITY,
                                format!("payout {} is cancelled", payout_id),
                            ));
                        }
                        PayoutState::Created | PayoutState::Posted => {
                            payout.state = PayoutState::Posted;
                        }
                    }
                }
                CommissionEffect::Paid { date } => {
                    order.payment_date = Some(date);
                    order.commission_status = CommissionStatus::Paid;
                }
                CommissionEffect::Reset => {
                    for payout in order.payouts.iter_mut() {
                        if payout.state == PayoutState::Created {
                            payout.state = PayoutState::Cancelled;
                        }
                    }
                    order.commission_reference = None;
                    order.payment_date = None;
                    order.discard_calculation();
                }
            }
            Ok(())
        })
    }

    /// Appends an audit line. Always allowed.
    pub(crate) fn record(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    fn transact(&mut self, f: impl FnOnce(&mut Order) -> CoreResult<()>) -> CoreResult<()> {
        let mut next = self.clone();
        f(&mut next)?;
        next.check_invariants()?;
        *self = next;
        Ok(())
    }

    fn discard_calculation(&mut self) {
        self.totals = None;
        for config in self.recipients.iter_mut() {
            config.computed_amount = Money::zero();
        }
        self.commission_status = CommissionStatus::Draft;
    }

    fn upsert_recipient(&mut self, mut config: RecipientConfig) {
        config.computed_amount = Money::zero();
        match self.recipients.iter_mut().find(|r| r.slot == config.slot) {
            Some(existing) => *existing = config,
            None => {
                self.recipients.push(config);
                self.recipients.sort_by_key(|r| r.slot);
            }
        }
    }

    fn set_lines(&mut self, lines: Vec<Line>) {
        self.lines = lines
            .into_iter()
            .map(|mut line| {
                line.subtotal = line.price_unit.multiply_quantity(line.qty);
                line
            })
            .collect();
    }

    // -------------------------------------------------------------------------
    // Invariants
    // -------------------------------------------------------------------------

    /// Checks every order invariant.
    pub fn check_invariants(&self) -> CoreResult<()> {
        validate_currency(&self.currency).map_err(CoreError::InvalidInput)?;
        validate_non_negative_amount("untaxed_total", self.untaxed_total)?;
        if self.amount_total < self.untaxed_total {
            return Err(CoreError::invariant(
                ENTITY,
                format!(
                    "amount_total {} is below untaxed_total {}",
                    self.amount_total, self.untaxed_total
                ),
            ));
        }
        if let Some(sale_value) = self.sale_value {
            validate_non_negative_amount("sale_value", sale_value)?;
        }
        if let Some(invoice_amount) = self.invoice_amount {
            validate_non_negative_amount("invoice_amount", invoice_amount)?;
        }

        for line in &self.lines {
            if line.qty.is_negative() {
                return Err(CoreError::invariant(
                    ENTITY,
                    format!("line {} has a negative quantity", line.product.name),
                ));
            }
            validate_non_negative_amount("price_unit", line.price_unit)?;
        }

        for (i, config) in self.recipients.iter().enumerate() {
            config.validate()?;
            if self.recipients[..i].iter().any(|r| r.slot == config.slot) {
                return Err(CoreError::invariant(
                    ENTITY,
                    format!("slot {} is configured twice", config.slot),
                ));
            }
        }

        let status = self.commission_status;
        if status.has_reference() != self.commission_reference.is_some() {
            return Err(CoreError::invariant(
                ENTITY,
                format!("commission reference does not match status {}", status),
            ));
        }
        if status != CommissionStatus::Draft {
            match &self.totals {
                None => {
                    return Err(CoreError::invariant(
                        ENTITY,
                        format!("status {} requires calculated totals", status),
                    ));
                }
                Some(totals)
                    if status.has_reference()
                        && totals.allocation_status == AllocationStatus::Over =>
                {
                    return Err(CoreError::invariant(
                        ENTITY,
                        "over-allocated commission cannot be confirmed",
                    ));
                }
                Some(_) => {}
            }
        }
        if (status == CommissionStatus::Paid) != self.payment_date.is_some() {
            return Err(CoreError::invariant(
                ENTITY,
                "payment date is set exactly when commission is paid",
            ));
        }
        if self.payouts.iter().any(|p| !p.amount.is_positive()) {
            return Err(CoreError::invariant(ENTITY, "payout amounts must be positive"));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
