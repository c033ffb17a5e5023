//! # Voucher Model
//!
//! Payment and receipt vouchers with their per-role sign-offs.
//!
//! ## Role Slots
//! ```text
//! ┌──────────────┬───────────────────────────┬─────────────────────────────┐
//! │ Role         │ Filled by verb            │ Holds                       │
//! ├──────────────┼───────────────────────────┼─────────────────────────────┤
//! │ reviewer     │ review    (→ under_review)│ actor, timestamp, signature │
//! │ approver     │ approve   (→ approved)    │ actor, timestamp, signature │
//! │ authorizer   │ authorize (→ authorized)  │ actor, timestamp, signature │
//! └──────────────┴───────────────────────────┴─────────────────────────────┘
//! ```
//!
//! Reset empties every slot and the rejection reason but keeps the token
//! and the reference.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Actor, AuditEntry, EntityRef, Signature};
use crate::validation::{validate_currency, validate_positive_amount};
use crate::voucher::token::VerificationToken;

/// Opaque voucher identifier.
pub type VoucherId = String;

const ENTITY: &str = "voucher";

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VoucherKind {
    /// Outbound.
    Payment,
    /// Inbound.
    Receipt,
}

impl VoucherKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            VoucherKind::Payment => "payment",
            VoucherKind::Receipt => "receipt",
        }
    }

    pub const fn prefix(&self) -> &'static str {
        match self {
            VoucherKind::Payment => "PV",
            VoucherKind::Receipt => "RV",
        }
    }

    /// Name of the per-kind reference sequence.
    pub const fn sequence_name(&self) -> &'static str {
        match self {
            VoucherKind::Payment => "voucher.payment",
            VoucherKind::Receipt => "voucher.receipt",
        }
    }
}

impl fmt::Display for VoucherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VoucherState {
    #[default]
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Authorized,
    Posted,
    Rejected,
}

impl VoucherState {
    pub const ALL: [VoucherState; 7] = [
        VoucherState::Draft,
        VoucherState::Submitted,
        VoucherState::UnderReview,
        VoucherState::Approved,
        VoucherState::Authorized,
        VoucherState::Posted,
        VoucherState::Rejected,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            VoucherState::Draft => "draft",
            VoucherState::Submitted => "submitted",
            VoucherState::UnderReview => "under_review",
            VoucherState::Approved => "approved",
            VoucherState::Authorized => "authorized",
            VoucherState::Posted => "posted",
            VoucherState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for VoucherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalRole {
    Reviewer,
    Approver,
    Authorizer,
}

impl fmt::Display for ApprovalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApprovalRole::Reviewer => "reviewer",
            ApprovalRole::Approver => "approver",
            ApprovalRole::Authorizer => "authorizer",
        })
    }
}

/// Who signed a role slot, when, and with what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSignoff {
    pub actor: Actor,
    pub at: DateTime<Utc>,
    pub signature: Signature,
}

// =============================================================================
// Approval Policy
// =============================================================================

/// Per-kind amount at or above which a voucher needs the full chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub payment_threshold: Money,
    pub receipt_threshold: Money,
}

impl ApprovalPolicy {
    pub fn requires_approval(&self, kind: VoucherKind, amount: Money) -> bool {
        let threshold = match kind {
            VoucherKind::Payment => self.payment_threshold,
            VoucherKind::Receipt => self.receipt_threshold,
        };
        amount >= threshold
    }
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            payment_threshold: Money::from_major(100_000),
            receipt_threshold: Money::from_major(100_000),
        }
    }
}

// =============================================================================
// Voucher
// =============================================================================

/// Input for creating a voucher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVoucher {
    pub kind: VoucherKind,
    pub partner: EntityRef,
    pub amount: Money,
    pub currency: String,
    pub journal: EntityRef,
    pub date: NaiveDate,
    #[serde(default)]
    pub memo: Option<String>,
}

/// Partial update of a draft voucher. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoucherEdit {
    pub partner: Option<EntityRef>,
    pub amount: Option<Money>,
    pub currency: Option<String>,
    pub journal: Option<EntityRef>,
    pub date: Option<NaiveDate>,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoucherMutation {
    Edit(VoucherEdit),
}

/// State changes owned by the voucher workflow.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum VoucherEffect {
    Submitted { reference: Option<String> },
    SignedOff {
        role: ApprovalRole,
        signoff: RoleSignoff,
        to: VoucherState,
    },
    Posted,
    /// Journal refused a claimed posting; back to the state it was posted from.
    PostReverted { to: VoucherState },
    Rejected { reason: String },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    id: VoucherId,
    reference: Option<String>,
    kind: VoucherKind,
    partner: EntityRef,
    amount: Money,
    currency: String,
    journal: EntityRef,
    date: NaiveDate,
    memo: Option<String>,
    state: VoucherState,
    requires_approval: bool,
    verification_token: VerificationToken,
    reviewer: Option<RoleSignoff>,
    approver: Option<RoleSignoff>,
    authorizer: Option<RoleSignoff>,
    rejection_reason: Option<String>,
    audit: Vec<AuditEntry>,
}

impl Voucher {
    /// Builds a draft voucher. The token is minted by the caller.
    pub fn create(
        id: impl Into<VoucherId>,
        new: NewVoucher,
        token: VerificationToken,
        policy: &ApprovalPolicy,
    ) -> CoreResult<Self> {
        let voucher = Voucher {
            id: id.into(),
            reference: None,
            kind: new.kind,
            requires_approval: policy.requires_approval(new.kind, new.amount),
            partner: new.partner,
            amount: new.amount,
            currency: new.currency,
            journal: new.journal,
            date: new.date,
            memo: new.memo,
            state: VoucherState::Draft,
            verification_token: token,
            reviewer: None,
            approver: None,
            authorizer: None,
            rejection_reason: None,
            audit: Vec::new(),
        };
        voucher.check_invariants()?;
        Ok(voucher)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn kind(&self) -> VoucherKind {
        self.kind
    }

    pub fn partner(&self) -> &EntityRef {
        &self.partner
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn journal(&self) -> &EntityRef {
        &self.journal
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub fn state(&self) -> VoucherState {
        self.state
    }

    pub fn requires_approval(&self) -> bool {
        self.requires_approval
    }

    pub fn verification_token(&self) -> &VerificationToken {
        &self.verification_token
    }

    pub fn signoff(&self, role: ApprovalRole) -> Option<&RoleSignoff> {
        match role {
            ApprovalRole::Reviewer => self.reviewer.as_ref(),
            ApprovalRole::Approver => self.approver.as_ref(),
            ApprovalRole::Authorizer => self.authorizer.as_ref(),
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn audit(&self) -> &[AuditEntry] {
        &self.audit
    }

    // -------------------------------------------------------------------------
    // Write path
    // -------------------------------------------------------------------------

    /// Applies an edit. Only drafts accept edits; `requires_approval` is
    /// re-derived afterwards.
    pub fn apply(&mut self, mutation: VoucherMutation, policy: &ApprovalPolicy) -> CoreResult<()> {
        self.transact(|voucher| {
            if voucher.state != VoucherState::Draft {
                return Err(CoreError::invariant(
                    ENTITY,
                    format!("voucher is {}; only drafts can be edited", voucher.state),
                ));
            }
            match mutation {
                VoucherMutation::Edit(edit) => {
                    if let Some(partner) = edit.partner {
                        voucher.partner = partner;
                    }
                    if let Some(amount) = edit.amount {
                        voucher.amount = amount;
                    }
                    if let Some(currency) = edit.currency {
                        voucher.currency = currency;
                    }
                    if let Some(journal) = edit.journal {
                        voucher.journal = journal;
                    }
                    if let Some(date) = edit.date {
                        voucher.date = date;
                    }
                    if edit.memo.is_some() {
                        voucher.memo = edit.memo;
                    }
                }
            }
            voucher.requires_approval = policy.requires_approval(voucher.kind, voucher.amount);
            Ok(())
        })
    }

    pub(crate) fn apply_effect(&mut self, effect: VoucherEffect) -> CoreResult<()> {
        self.transact(|voucher| {
            match effect {
                VoucherEffect::Submitted { reference } => {
                    if let Some(reference) = reference {
                        if voucher.reference.is_some() {
                            return Err(CoreError::invariant(
                                ENTITY,
                                "reference is already assigned",
                            ));
                        }
                        voucher.reference = Some(reference);
                    }
                    voucher.state = VoucherState::Submitted;
                }
                VoucherEffect::SignedOff { role, signoff, to } => {
                    let slot = match role {
                        ApprovalRole::Reviewer => &mut voucher.reviewer,
                        ApprovalRole::Approver => &mut voucher.approver,
                        ApprovalRole::Authorizer => &mut voucher.authorizer,
                    };
                    if slot.is_some() {
                        return Err(CoreError::invariant(
                            ENTITY,
                            format!("{} has already signed", role),
                        ));
                    }
                    *slot = Some(signoff);
                    voucher.state = to;
                }
                VoucherEffect::Posted => voucher.state = VoucherState::Posted,
                VoucherEffect::PostReverted { to } => {
                    if voucher.state != VoucherState::Posted {
                        return Err(CoreError::invariant(ENTITY, "only a posted voucher can revert"));
                    }
                    voucher.state = to;
                }
                VoucherEffect::Rejected { reason } => {
                    voucher.rejection_reason = Some(reason);
                    voucher.state = VoucherState::Rejected;
                }
                VoucherEffect::Reset => {
                    voucher.reviewer = None;
                    voucher.approver = None;
                    voucher.authorizer = None;
                    voucher.rejection_reason = None;
                    voucher.state = VoucherState::Draft;
                }
            }
            Ok(())
        })
    }

    /// Appends an audit line. Allowed in every state, posted and rejected
    /// included.
    pub(crate) fn record(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    fn transact(&mut self, f: impl FnOnce(&mut Voucher) -> CoreResult<()>) -> CoreResult<()> {
        let mut next = self.clone();
        f(&mut next)?;
        next.check_invariants()?;
        *self = next;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invariants
    // -------------------------------------------------------------------------

    pub fn check_invariants(&self) -> CoreResult<()> {
        validate_positive_amount("amount", self.amount)?;
        validate_currency(&self.currency).map_err(CoreError::InvalidInput)?;
        if self.verification_token.as_str().is_empty() {
            return Err(CoreError::invariant(ENTITY, "verification token is missing"));
        }
        if self.state != VoucherState::Draft && self.reference.is_none() {
            return Err(CoreError::invariant(
                ENTITY,
                format!("{} voucher has no reference", self.state),
            ));
        }
        if (self.state == VoucherState::Rejected) != self.rejection_reason.is_some() {
            return Err(CoreError::invariant(
                ENTITY,
                "rejection reason is set exactly when rejected",
            ));
        }
        if matches!(self.state, VoucherState::Draft | VoucherState::Submitted)
            && (self.reviewer.is_some() || self.approver.is_some() || self.authorizer.is_some())
        {
            return Err(CoreError::invariant(
                ENTITY,
                format!("{} voucher cannot carry sign-offs", self.state),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
