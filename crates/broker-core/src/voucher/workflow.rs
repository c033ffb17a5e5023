//! # Voucher Workflow
//!
//! Multi-role approval over payment and receipt vouchers.
//!
//! ## State Graph
//! ```text
//!  draft ─submit─► submitted ─review─► under_review ─approve─► approved
//!    ▲                 │                   │                     │  │
//!    │                 └──────reject───────┴───────reject────────┘  │
//!    │                           ▼                          authorize│
//!    │                       rejected                                ▼
//!    │                                               authorized ─post─► posted
//!    └──────────── reset (from every state but posted) ───────────────
//!
//!  approved ─post─► posted   only when requires_approval is false
//! ```
//!
//! ## Verb → Capability → Role Slot
//! ```text
//! ┌───────────┬───────────────────┬──────────────┐
//! │ submit    │ payment.submit    │ -            │
//! │ review    │ payment.review    │ reviewer     │
//! │ approve   │ payment.approve   │ approver     │
//! │ authorize │ payment.authorize │ authorizer   │
//! │ post      │ payment.post      │ -            │
//! │ reject    │ payment.reject    │ -            │
//! │ reset     │ payment.reset     │ -            │
//! └───────────┴───────────────────┴──────────────┘
//! ```
//!
//! Posting first commits the voucher as posted, then calls the journal
//! port. Of two racing posters only one commit wins, so the journal sees a
//! voucher once. A refusal reverts the claim and the voucher is authorized
//! again.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::ports::{require_capability, Identity, Ports};
use crate::types::{Actor, AuditEntry, Capability, EntityRef, Signature};
use crate::validation::validate_required_text;
use crate::voucher::model::{
    ApprovalPolicy, ApprovalRole, NewVoucher, RoleSignoff, Voucher, VoucherEdit, VoucherEffect,
    VoucherKind, VoucherMutation, VoucherState,
};
use crate::voucher::token::{new_voucher_id, VerificationToken};

const ENTITY: &str = "voucher";

/// Commits tried when undoing a refused posting.
const REVERT_ATTEMPTS: u32 = 3;

// =============================================================================
// Verbs & Transition Graph
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoucherVerb {
    Submit,
    Review,
    Approve,
    Authorize,
    Post,
    Reject,
    Reset,
}

impl VoucherVerb {
    pub const ALL: [VoucherVerb; 7] = [
        VoucherVerb::Submit,
        VoucherVerb::Review,
        VoucherVerb::Approve,
        VoucherVerb::Authorize,
        VoucherVerb::Post,
        VoucherVerb::Reject,
        VoucherVerb::Reset,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            VoucherVerb::Submit => "submit",
            VoucherVerb::Review => "review",
            VoucherVerb::Approve => "approve",
            VoucherVerb::Authorize => "authorize",
            VoucherVerb::Post => "post",
            VoucherVerb::Reject => "reject",
            VoucherVerb::Reset => "reset",
        }
    }

    pub const fn capability(&self) -> Capability {
        match self {
            VoucherVerb::Submit => Capability::PaymentSubmit,
            VoucherVerb::Review => Capability::PaymentReview,
            VoucherVerb::Approve => Capability::PaymentApprove,
            VoucherVerb::Authorize => Capability::PaymentAuthorize,
            VoucherVerb::Post => Capability::PaymentPost,
            VoucherVerb::Reject => Capability::PaymentReject,
            VoucherVerb::Reset => Capability::PaymentReset,
        }
    }

    /// Role slot the verb signs, if any.
    pub const fn role(&self) -> Option<ApprovalRole> {
        match self {
            VoucherVerb::Review => Some(ApprovalRole::Reviewer),
            VoucherVerb::Approve => Some(ApprovalRole::Approver),
            VoucherVerb::Authorize => Some(ApprovalRole::Authorizer),
            _ => None,
        }
    }

    const fn event(&self) -> &'static str {
        match self {
            VoucherVerb::Submit => "voucher.submitted",
            VoucherVerb::Review => "voucher.reviewed",
            VoucherVerb::Approve => "voucher.approved",
            VoucherVerb::Authorize => "voucher.authorized",
            VoucherVerb::Post => "voucher.posted",
            VoucherVerb::Reject => "voucher.rejected",
            VoucherVerb::Reset => "voucher.reset",
        }
    }
}

impl fmt::Display for VoucherVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoucherVerb {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoucherVerb::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "verb".to_string(),
                reason: format!("unknown voucher verb '{}'", s),
            })
    }
}

/// Target state for `verb` from `from`.
///
/// Posting a voucher that requires approval from anywhere but `authorized`
/// is `NotAuthorized`; every other missing edge is `IllegalTransition`.
pub fn voucher_transition(
    from: VoucherState,
    verb: VoucherVerb,
    requires_approval: bool,
) -> CoreResult<VoucherState> {
    use VoucherState as S;
    use VoucherVerb as V;
    match (from, verb) {
        (S::Draft, V::Submit) => Ok(S::Submitted),
        (S::Submitted, V::Review) => Ok(S::UnderReview),
        (S::UnderReview, V::Approve) => Ok(S::Approved),
        (S::Approved, V::Authorize) => Ok(S::Authorized),
        (S::Authorized, V::Post) => Ok(S::Posted),
        (S::Approved, V::Post) if !requires_approval => Ok(S::Posted),
        (_, V::Post) if requires_approval => Err(CoreError::NotAuthorized {
            reason: format!("voucher requires approval and is {}, not authorized", from),
        }),
        (S::Submitted | S::UnderReview | S::Approved, V::Reject) => Ok(S::Rejected),
        (S::Posted, V::Reset) => Err(CoreError::illegal(ENTITY, from, verb)),
        (_, V::Reset) => Ok(S::Draft),
        _ => Err(CoreError::illegal(ENTITY, from, verb)),
    }
}

/// Verbs with an edge out of `from`.
pub fn permitted_voucher_verbs(from: VoucherState, requires_approval: bool) -> Vec<VoucherVerb> {
    VoucherVerb::ALL
        .iter()
        .copied()
        .filter(|verb| voucher_transition(from, *verb, requires_approval).is_ok())
        .collect()
}

// =============================================================================
// Settings & Views
// =============================================================================

/// Host-supplied voucher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoucherSettings {
    pub policy: ApprovalPolicy,
    /// Prefix of verification URLs, without trailing slash.
    pub base_url: String,
}

impl Default for VoucherSettings {
    fn default() -> Self {
        Self {
            policy: ApprovalPolicy::default(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// What the public verification endpoint reveals about a voucher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VerificationView {
    pub reference: Option<String>,
    pub kind: VoucherKind,
    pub amount: Money,
    pub currency: String,
    pub partner: EntityRef,
    pub state: VoucherState,
    /// `YYYY-MM-DD`.
    pub date: String,
}

impl From<&Voucher> for VerificationView {
    fn from(voucher: &Voucher) -> Self {
        Self {
            reference: voucher.reference().map(str::to_string),
            kind: voucher.kind(),
            amount: voucher.amount(),
            currency: voucher.currency().to_string(),
            partner: voucher.partner().clone(),
            state: voucher.state(),
            date: voucher.date().format("%Y-%m-%d").to_string(),
        }
    }
}

// =============================================================================
// Workflow Service
// =============================================================================

/// Extra input carried by some verbs.
enum VerbInput {
    None,
    Signature(Signature),
    Reason(String),
}

/// Voucher verbs for one caller.
pub struct VoucherWorkflow<'a> {
    ports: &'a Ports,
    identity: &'a dyn Identity,
    settings: &'a VoucherSettings,
}

impl<'a> VoucherWorkflow<'a> {
    pub fn new(ports: &'a Ports, identity: &'a dyn Identity, settings: &'a VoucherSettings) -> Self {
        Self {
            ports,
            identity,
            settings,
        }
    }

    pub fn get(&self, id: &str) -> CoreResult<Voucher> {
        let mut session = self.ports.store.begin()?;
        let voucher = session.load_voucher(id)?;
        session.rollback();
        Ok(voucher)
    }

    /// Creates a draft voucher. The verification token is minted here.
    pub fn create(&self, new: NewVoucher) -> CoreResult<Voucher> {
        let actor = require_capability(self.identity, Capability::PaymentSubmit)?;
        let id = new_voucher_id(self.ports.random.as_ref());
        let token = VerificationToken::generate(self.ports.random.as_ref());
        let mut voucher = Voucher::create(id, new, token, &self.settings.policy)?;
        voucher.record(AuditEntry::new(self.ports.clock.now(), &actor, "create"));

        let mut session = self.ports.store.begin()?;
        session.save_voucher(&voucher)?;
        session.commit()?;

        info!(
            voucher_id = %voucher.id(),
            kind = %voucher.kind(),
            amount = %voucher.amount(),
            requires_approval = voucher.requires_approval(),
            "Voucher created"
        );
        Ok(voucher)
    }

    /// Edits a draft voucher.
    pub fn edit(&self, id: &str, edit: VoucherEdit) -> CoreResult<Voucher> {
        let actor = require_capability(self.identity, Capability::PaymentSubmit)?;
        let mut session = self.ports.store.begin()?;
        let mut voucher = session.load_voucher(id)?;
        voucher.apply(VoucherMutation::Edit(edit), &self.settings.policy)?;
        voucher.record(AuditEntry::new(self.ports.clock.now(), &actor, "edit"));
        session.save_voucher(&voucher)?;
        session.commit()?;

        info!(voucher_id = %id, "Voucher edited");
        Ok(voucher)
    }

    pub fn submit(&self, id: &str) -> CoreResult<Voucher> {
        self.transition(id, VoucherVerb::Submit, VerbInput::None)
    }

    pub fn review(&self, id: &str, signature: Signature) -> CoreResult<Voucher> {
        self.transition(id, VoucherVerb::Review, VerbInput::Signature(signature))
    }

    pub fn approve(&self, id: &str, signature: Signature) -> CoreResult<Voucher> {
        self.transition(id, VoucherVerb::Approve, VerbInput::Signature(signature))
    }

    pub fn authorize(&self, id: &str, signature: Signature) -> CoreResult<Voucher> {
        self.transition(id, VoucherVerb::Authorize, VerbInput::Signature(signature))
    }

    pub fn post(&self, id: &str) -> CoreResult<Voucher> {
        self.transition(id, VoucherVerb::Post, VerbInput::None)
    }

    pub fn reject(&self, id: &str, reason: &str) -> CoreResult<Voucher> {
        self.transition(id, VoucherVerb::Reject, VerbInput::Reason(reason.to_string()))
    }

    pub fn reset(&self, id: &str) -> CoreResult<Voucher> {
        self.transition(id, VoucherVerb::Reset, VerbInput::None)
    }

    fn transition(&self, id: &str, verb: VoucherVerb, input: VerbInput) -> CoreResult<Voucher> {
        let actor = require_capability(self.identity, verb.capability())?;
        let mut session = self.ports.store.begin()?;
        let mut voucher = session.load_voucher(id)?;
        let from = voucher.state();
        let to = voucher_transition(from, verb, voucher.requires_approval())?;
        let now = self.ports.clock.now();
        let mut note = None;

        match (verb, input) {
            (VoucherVerb::Submit, _) => {
                let reference = match voucher.reference() {
                    Some(_) => None,
                    None => {
                        let kind = voucher.kind();
                        let sequence = session.next_sequence(kind.sequence_name())?;
                        Some(format!("{}/{:05}", kind.prefix(), sequence))
                    }
                };
                note = reference.clone();
                voucher.apply_effect(VoucherEffect::Submitted { reference })?;
            }
            (VoucherVerb::Review | VoucherVerb::Approve | VoucherVerb::Authorize, input) => {
                let signature = match input {
                    VerbInput::Signature(signature) if !signature.is_empty() => signature,
                    _ => {
                        return Err(ValidationError::Required {
                            field: "signature".to_string(),
                        }
                        .into())
                    }
                };
                let role = verb
                    .role()
                    .ok_or_else(|| CoreError::invariant(ENTITY, "verb has no role slot"))?;
                voucher.apply_effect(VoucherEffect::SignedOff {
                    role,
                    signoff: RoleSignoff {
                        actor: actor.clone(),
                        at: now,
                        signature,
                    },
                    to,
                })?;
            }
            // Claims the posting. The journal is called after the commit.
            (VoucherVerb::Post, _) => voucher.apply_effect(VoucherEffect::Posted)?,
            (VoucherVerb::Reject, input) => {
                let raw = match input {
                    VerbInput::Reason(reason) => reason,
                    _ => String::new(),
                };
                let reason = validate_required_text("rejection_reason", &raw)?;
                note = Some(reason.clone());
                voucher.apply_effect(VoucherEffect::Rejected { reason })?;
            }
            (VoucherVerb::Reset, _) => voucher.apply_effect(VoucherEffect::Reset)?,
        }

        let mut entry = AuditEntry::new(now, &actor, verb.as_str()).transition(from, to);
        if let Some(note) = note {
            entry = entry.with_note(note);
        }
        voucher.record(entry);
        session.save_voucher(&voucher)?;
        session.commit()?;

        if verb == VoucherVerb::Post {
            if let Err(e) = self.ports.journal.post_voucher(&voucher) {
                warn!(voucher_id = %id, error = %e, "Journal refused voucher, reverting post");
                self.revert_post(id, from, &actor, &e.to_string())?;
                return Err(CoreError::DownstreamRefusal {
                    port: "journal",
                    reason: e.to_string(),
                });
            }
        }

        info!(
            voucher_id = %id,
            verb = %verb,
            from = %from,
            to = %to,
            actor = %actor.id,
            "Voucher transition"
        );
        self.ports.notify(
            verb.event(),
            json!({
                "voucher_id": voucher.id(),
                "reference": voucher.reference(),
                "kind": voucher.kind(),
                "state": voucher.state(),
            }),
        );
        Ok(voucher)
    }

    /// Undoes a claimed posting after a journal refusal. Only the claiming
    /// caller reaches this, so a conflict here means an audit append raced.
    fn revert_post(&self, id: &str, to: VoucherState, actor: &Actor, reason: &str) -> CoreResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut session = self.ports.store.begin()?;
            let mut voucher = session.load_voucher(id)?;
            voucher.apply_effect(VoucherEffect::PostReverted { to })?;
            voucher.record(
                AuditEntry::new(self.ports.clock.now(), actor, "post.refused")
                    .transition(VoucherState::Posted, to)
                    .with_note(reason),
            );
            session.save_voucher(&voucher)?;
            match session.commit() {
                Err(e) if e.is_retryable() && attempt < REVERT_ATTEMPTS => {
                    debug!(voucher_id = %id, attempt, "Revert lost a race, retrying")
                }
                other => return other,
            }
        }
    }

    /// Looks a voucher up by verification token. Read-only, no capability.
    pub fn validate(&self, token: &str) -> CoreResult<Voucher> {
        if !VerificationToken::is_well_formed(token) {
            debug!("Malformed verification token");
            return Err(CoreError::not_found(ENTITY, "token"));
        }
        let mut session = self.ports.store.begin()?;
        let voucher = session.find_voucher_by_token(token)?;
        session.rollback();
        Ok(voucher)
    }

    /// [`Self::validate`] projected to the public view.
    pub fn verify(&self, token: &str) -> CoreResult<VerificationView> {
        self.validate(token).map(|v| VerificationView::from(&v))
    }

    /// URL rendered into the voucher's QR code.
    pub fn verification_url(&self, voucher: &Voucher) -> String {
        format!(
            "{}/payment/verify/{}",
            self.settings.base_url.trim_end_matches('/'),
            voucher.verification_token()
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ports::Clock;
    use crate::testing::{RefusingJournal, StaticIdentity, TestHarness};
    use crate::types::Actor;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn new_voucher(amount: i64) -> NewVoucher {
        NewVoucher {
            kind: VoucherKind::Payment,
            partner: EntityRef::new("p-1", "Lahore Traders"),
            amount: Money::from_major(amount),
            currency: "PKR".to_string(),
            journal: EntityRef::new("j-1", "Bank"),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            memo: None,
        }
    }

    fn settings(threshold: i64) -> VoucherSettings {
        VoucherSettings {
            policy: ApprovalPolicy {
                payment_threshold: Money::from_major(threshold),
                receipt_threshold: Money::from_major(threshold),
            },
            base_url: "https://erp.example.com/".to_string(),
        }
    }

    fn sig() -> Signature {
        Signature::new(b"signed".to_vec())
    }

    fn admin() -> StaticIdentity {
        StaticIdentity::all(Actor::new("u-admin", "Admin"))
    }

    #[test]
    fn test_graph_rows() {
        use VoucherState as S;
        use VoucherVerb as V;
        assert_eq!(permitted_voucher_verbs(S::Draft, true), vec![V::Submit, V::Reset]);
        assert_eq!(
            permitted_voucher_verbs(S::Approved, true),
            vec![V::Authorize, V::Reject, V::Reset]
        );
        assert_eq!(
            permitted_voucher_verbs(S::Approved, false),
            vec![V::Authorize, V::Post, V::Reject, V::Reset]
        );
        assert!(permitted_voucher_verbs(S::Posted, false).is_empty());
        assert_eq!(permitted_voucher_verbs(S::Rejected, true), vec![V::Reset]);
    }

    #[test]
    fn test_post_without_authorization_is_not_authorized() {
        let err = voucher_transition(VoucherState::Approved, VoucherVerb::Post, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
        let err = voucher_transition(VoucherState::Submitted, VoucherVerb::Post, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    }

    #[test]
    fn test_submit_assigns_reference_once() {
        let harness = TestHarness::new();
        let identity = admin();
        let settings = settings(1000);
        let workflow = VoucherWorkflow::new(&harness.ports, &identity, &settings);

        let voucher = workflow.create(new_voucher(500)).unwrap();
        let submitted = workflow.submit(voucher.id()).unwrap();
        assert_eq!(submitted.reference(), Some("PV/00001"));

        workflow.reject(voucher.id(), "wrong partner").unwrap();
        workflow.reset(voucher.id()).unwrap();
        let again = workflow.submit(voucher.id()).unwrap();
        assert_eq!(again.reference(), Some("PV/00001"));
        assert_eq!(again.verification_token(), voucher.verification_token());
    }

    #[test]
    fn test_reject_requires_reason() {
        let harness = TestHarness::new();
        let identity = admin();
        let settings = settings(1000);
        let workflow = VoucherWorkflow::new(&harness.ports, &identity, &settings);
        let voucher = workflow.create(new_voucher(500)).unwrap();
        workflow.submit(voucher.id()).unwrap();

        let err = workflow.reject(voucher.id(), "   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let rejected = workflow.reject(voucher.id(), "duplicate").unwrap();
        assert_eq!(rejected.rejection_reason(), Some("duplicate"));

        let err = workflow.submit(voucher.id()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    }

    #[test]
    fn test_signoff_needs_signature() {
        let harness = TestHarness::new();
        let identity = admin();
        let settings = settings(1000);
        let workflow = VoucherWorkflow::new(&harness.ports, &identity, &settings);
        let voucher = workflow.create(new_voucher(500)).unwrap();
        workflow.submit(voucher.id()).unwrap();
        let err = workflow.review(voucher.id(), Signature::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let reviewed = workflow.review(voucher.id(), sig()).unwrap();
        let signoff = reviewed.signoff(ApprovalRole::Reviewer).unwrap();
        assert_eq!(signoff.actor.id, "u-admin");
        assert_eq!(signoff.at, harness.clock.now());
    }

    #[test]
    fn test_below_threshold_posts_from_approved() {
        let harness = TestHarness::new();
        let identity = admin();
        let settings = settings(1000);
        let workflow = VoucherWorkflow::new(&harness.ports, &identity, &settings);
        let voucher = workflow.create(new_voucher(500)).unwrap();
        assert!(!voucher.requires_approval());
        workflow.submit(voucher.id()).unwrap();
        workflow.review(voucher.id(), sig()).unwrap();
        workflow.approve(voucher.id(), sig()).unwrap();
        let posted = workflow.post(voucher.id()).unwrap();
        assert_eq!(posted.state(), VoucherState::Posted);
        assert_eq!(harness.journal.posted(), vec![voucher.id().to_string()]);
    }

    #[test]
    fn test_journal_refusal_keeps_authorized() {
        let harness = TestHarness::new();
        let ports = harness.with_journal(Arc::new(RefusingJournal::default()));
        let identity = admin();
        let settings = settings(100);
        let workflow = VoucherWorkflow::new(&ports, &identity, &settings);
        let voucher = workflow.create(new_voucher(500)).unwrap();
        workflow.submit(voucher.id()).unwrap();
        workflow.review(voucher.id(), sig()).unwrap();
        workflow.approve(voucher.id(), sig()).unwrap();
        workflow.authorize(voucher.id(), sig()).unwrap();

        let err = workflow.post(voucher.id()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DownstreamRefusal);
        let stored = workflow.get(voucher.id()).unwrap();
        assert_eq!(stored.state(), VoucherState::Authorized);
        assert!(!harness.notifier.kinds().contains(&"voucher.posted".to_string()));

        let trail: Vec<&str> = stored.audit().iter().map(|e| e.action.as_str()).collect();
        assert_eq!(&trail[trail.len() - 2..], ["post", "post.refused"]);
        let refused = stored.audit().last().unwrap();
        assert_eq!(refused.from.as_deref(), Some("posted"));
        assert_eq!(refused.to.as_deref(), Some("authorized"));

        // Authorized again, so a later post is accepted.
        let ok = VoucherWorkflow::new(&harness.ports, &identity, &settings)
            .post(voucher.id())
            .unwrap();
        assert_eq!(ok.state(), VoucherState::Posted);
        assert_eq!(harness.journal.posted(), vec![voucher.id().to_string()]);
    }

    #[test]
    fn test_missing_capability() {
        let harness = TestHarness::new();
        let owner = admin();
        let settings = settings(1000);
        let voucher = VoucherWorkflow::new(&harness.ports, &owner, &settings)
            .create(new_voucher(500))
            .unwrap();

        let clerk = StaticIdentity::with(Actor::new("u-2", "Clerk"), [Capability::PaymentSubmit]);
        let workflow = VoucherWorkflow::new(&harness.ports, &clerk, &settings);
        workflow.submit(voucher.id()).unwrap();
        let err = workflow.review(voucher.id(), sig()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    }

    #[test]
    fn test_verification_lookup() {
        let harness = TestHarness::new();
        let identity = admin();
        let settings = settings(1000);
        let workflow = VoucherWorkflow::new(&harness.ports, &identity, &settings);
        let voucher = workflow.create(new_voucher(500)).unwrap();

        let url = workflow.verification_url(&voucher);
        assert_eq!(
            url,
            format!("https://erp.example.com/payment/verify/{}", voucher.verification_token())
        );
        let view = workflow.verify(voucher.verification_token().as_str()).unwrap();
        assert_eq!(view.amount, Money::from_major(500));
        assert_eq!(view.date, "2024-03-01");
        assert!(view.reference.is_none());

        let err = workflow.validate("not-a-token").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
