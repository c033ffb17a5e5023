//! Payment voucher approval chain, references and verification tokens.

use std::collections::HashSet;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::NaiveDate;

use broker_core::testing::{RendezvousClock, StaticIdentity, TestHarness};
use broker_core::voucher::{
    permitted_voucher_verbs, voucher_transition, ApprovalPolicy, ApprovalRole, NewVoucher,
    VoucherKind, VoucherState, TOKEN_BYTES,
};
use broker_core::{
    Actor, Capability, Clock, EntityRef, ErrorKind, Money, Ports, Signature, VoucherSettings,
    VoucherVerb, VoucherWorkflow,
};

// =============================================================================
// Fixtures
// =============================================================================

fn settings(threshold: Money) -> VoucherSettings {
    VoucherSettings {
        policy: ApprovalPolicy {
            payment_threshold: threshold,
            receipt_threshold: threshold,
        },
        base_url: "https://broker.example".to_string(),
    }
}

fn new_voucher(kind: VoucherKind, amount: Money) -> NewVoucher {
    NewVoucher {
        kind,
        partner: EntityRef::new("p-9", "Builder Co"),
        amount,
        currency: "PKR".to_string(),
        journal: EntityRef::new("j-bank", "Bank"),
        date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        memo: None,
    }
}

fn clerk(id: &str, capability: Capability) -> StaticIdentity {
    StaticIdentity::with(Actor::new(id, id), [capability])
}

fn sig(text: &str) -> Signature {
    Signature::new(text.as_bytes().to_vec())
}

// =============================================================================
// Happy Path
// =============================================================================

#[test]
fn test_payment_voucher_full_chain() {
    let harness = TestHarness::new();
    let settings = settings(Money::from_major(100));

    let submitter = clerk("u-submit", Capability::PaymentSubmit);
    let reviewer = clerk("u-review", Capability::PaymentReview);
    let approver = clerk("u-approve", Capability::PaymentApprove);
    let authorizer = clerk("u-authorize", Capability::PaymentAuthorize);
    let poster = clerk("u-post", Capability::PaymentPost);
    let as_submitter = VoucherWorkflow::new(&harness.ports, &submitter, &settings);
    let as_reviewer = VoucherWorkflow::new(&harness.ports, &reviewer, &settings);
    let as_approver = VoucherWorkflow::new(&harness.ports, &approver, &settings);
    let as_authorizer = VoucherWorkflow::new(&harness.ports, &authorizer, &settings);
    let as_poster = VoucherWorkflow::new(&harness.ports, &poster, &settings);

    let voucher = as_submitter
        .create(new_voucher(VoucherKind::Payment, Money::from_major(500)))
        .unwrap();
    assert!(voucher.requires_approval());
    let id = voucher.id().to_string();
    let token = voucher.verification_token().as_str().to_string();

    let submitted = as_submitter.submit(&id).unwrap();
    assert_eq!(submitted.reference(), Some("PV/00001"));

    as_reviewer.review(&id, sig("reviewed")).unwrap();
    let approved = as_approver.approve(&id, sig("approved")).unwrap();
    assert_eq!(approved.state(), VoucherState::Approved);

    let err = as_poster.post(&id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert!(harness.journal.posted().is_empty());

    as_authorizer.authorize(&id, sig("authorized")).unwrap();
    assert_eq!(as_poster.validate(&token).unwrap().state(), VoucherState::Authorized);

    let posted = as_poster.post(&id).unwrap();
    assert_eq!(posted.state(), VoucherState::Posted);
    assert_eq!(harness.journal.posted(), vec![id.clone()]);

    for (role, actor) in [
        (ApprovalRole::Reviewer, "u-review"),
        (ApprovalRole::Approver, "u-approve"),
        (ApprovalRole::Authorizer, "u-authorize"),
    ] {
        let signoff = posted.signoff(role).unwrap();
        assert_eq!(signoff.actor.id, actor);
        assert_eq!(signoff.at, harness.clock.now());
        assert!(!signoff.signature.is_empty());
    }

    // create + submit + review + approve + authorize + post
    assert_eq!(posted.audit().len(), 6);
    let found = as_poster.validate(&token).unwrap();
    assert_eq!(found.id(), id);
    assert_eq!(found.state(), VoucherState::Posted);
    assert_eq!(
        harness.notifier.kinds(),
        vec![
            "voucher.submitted",
            "voucher.reviewed",
            "voucher.approved",
            "voucher.authorized",
            "voucher.posted",
        ]
    );
}

#[test]
fn test_each_verb_needs_its_capability() {
    let harness = TestHarness::new();
    let settings = settings(Money::from_major(100));
    let submitter = clerk("u-submit", Capability::PaymentSubmit);
    let workflow = VoucherWorkflow::new(&harness.ports, &submitter, &settings);
    let voucher = workflow
        .create(new_voucher(VoucherKind::Payment, Money::from_major(500)))
        .unwrap();
    workflow.submit(voucher.id()).unwrap();

    let err = workflow.review(voucher.id(), sig("x")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    let err = workflow.reject(voucher.id(), "wrong partner").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert_eq!(workflow.get(voucher.id()).unwrap().state(), VoucherState::Submitted);
}

#[test]
fn test_reject_then_reset_keeps_reference_and_token() {
    let harness = TestHarness::new();
    let settings = settings(Money::from_major(100));
    let owner = StaticIdentity::all(Actor::new("u-owner", "Owner"));
    let workflow = VoucherWorkflow::new(&harness.ports, &owner, &settings);

    let voucher = workflow
        .create(new_voucher(VoucherKind::Receipt, Money::from_major(250)))
        .unwrap();
    let submitted = workflow.submit(voucher.id()).unwrap();
    workflow.review(voucher.id(), sig("r")).unwrap();

    let rejected = workflow.reject(voucher.id(), "amount mismatch").unwrap();
    assert_eq!(rejected.state(), VoucherState::Rejected);
    assert_eq!(rejected.rejection_reason(), Some("amount mismatch"));
    assert_eq!(
        workflow.approve(voucher.id(), sig("a")).unwrap_err().kind(),
        ErrorKind::IllegalTransition
    );

    let reset = workflow.reset(voucher.id()).unwrap();
    assert_eq!(reset.state(), VoucherState::Draft);
    assert_eq!(reset.rejection_reason(), None);
    assert!(reset.signoff(ApprovalRole::Reviewer).is_none());
    assert_eq!(reset.verification_token(), voucher.verification_token());

    let resubmitted = workflow.submit(voucher.id()).unwrap();
    assert_eq!(resubmitted.reference(), submitted.reference());
    assert_eq!(resubmitted.reference(), Some("RV/00001"));
}

#[test]
fn test_below_threshold_skips_authorization() {
    let harness = TestHarness::new();
    let settings = settings(Money::from_major(1_000));
    let owner = StaticIdentity::all(Actor::new("u-owner", "Owner"));
    let workflow = VoucherWorkflow::new(&harness.ports, &owner, &settings);

    let voucher = workflow
        .create(new_voucher(VoucherKind::Payment, Money::from_major(999)))
        .unwrap();
    assert!(!voucher.requires_approval());
    workflow.submit(voucher.id()).unwrap();
    workflow.review(voucher.id(), sig("r")).unwrap();
    workflow.approve(voucher.id(), sig("a")).unwrap();
    let posted = workflow.post(voucher.id()).unwrap();
    assert_eq!(posted.state(), VoucherState::Posted);
    assert!(posted.signoff(ApprovalRole::Authorizer).is_none());
    assert_eq!(
        workflow.reset(voucher.id()).unwrap_err().kind(),
        ErrorKind::IllegalTransition
    );
}

#[test]
fn test_qr_url_points_at_verify_endpoint() {
    let harness = TestHarness::new();
    let settings = settings(Money::from_major(100));
    let owner = StaticIdentity::all(Actor::new("u-owner", "Owner"));
    let workflow = VoucherWorkflow::new(&harness.ports, &owner, &settings);
    let voucher = workflow
        .create(new_voucher(VoucherKind::Payment, Money::from_major(5)))
        .unwrap();
    assert_eq!(
        workflow.verification_url(&voucher),
        format!("https://broker.example/payment/verify/{}", voucher.verification_token())
    );
    let view = workflow.verify(voucher.verification_token().as_str()).unwrap();
    assert_eq!(view.reference, None);
    assert_eq!(view.date, "2024-03-15");
    assert_eq!(workflow.verify("not-a-token").unwrap_err().kind(), ErrorKind::NotFound);
}

// =============================================================================
// References & Tokens
// =============================================================================

#[test]
fn test_references_are_unique_per_kind() {
    let harness = TestHarness::new();
    let settings = settings(Money::from_major(100));
    let owner = StaticIdentity::all(Actor::new("u-owner", "Owner"));
    let workflow = VoucherWorkflow::new(&harness.ports, &owner, &settings);

    let mut payments = HashSet::new();
    let mut receipts = HashSet::new();
    for i in 0..12 {
        let kind = if i % 3 == 0 {
            VoucherKind::Receipt
        } else {
            VoucherKind::Payment
        };
        let voucher = workflow.create(new_voucher(kind, Money::from_major(10))).unwrap();
        let submitted = workflow.submit(voucher.id()).unwrap();
        // Reset and resubmit must not draw a new number.
        workflow.reset(voucher.id()).unwrap();
        let again = workflow.submit(voucher.id()).unwrap();
        assert_eq!(again.reference(), submitted.reference());

        let reference = again.reference().unwrap().to_string();
        let fresh = match kind {
            VoucherKind::Payment => payments.insert(reference.clone()),
            VoucherKind::Receipt => receipts.insert(reference.clone()),
        };
        assert!(fresh, "duplicate reference {}", reference);
    }
    assert_eq!(payments.len(), 8);
    assert_eq!(receipts.len(), 4);
    assert!(payments.contains("PV/00008"));
    assert!(receipts.contains("RV/00004"));
}

#[test]
fn test_tokens_are_distinct_and_carry_256_bits() {
    let harness = TestHarness::new();
    let settings = settings(Money::from_major(100));
    let owner = StaticIdentity::all(Actor::new("u-owner", "Owner"));
    let workflow = VoucherWorkflow::new(&harness.ports, &owner, &settings);

    let mut tokens = HashSet::new();
    for _ in 0..64 {
        let voucher = workflow
            .create(new_voucher(VoucherKind::Payment, Money::from_major(1)))
            .unwrap();
        let token = voucher.verification_token().as_str().to_string();
        let bytes = URL_SAFE_NO_PAD.decode(&token).unwrap();
        assert_eq!(bytes.len(), TOKEN_BYTES);
        assert!(TOKEN_BYTES * 8 >= 256);
        assert!(tokens.insert(token));
    }
}

// =============================================================================
// Transition Matrix
// =============================================================================

#[test]
fn test_voucher_transition_matrix() {
    use VoucherState as S;
    use VoucherVerb as V;

    let guarded: [(S, &[(V, S)]); 7] = [
        (S::Draft, &[(V::Submit, S::Submitted), (V::Reset, S::Draft)]),
        (
            S::Submitted,
            &[(V::Review, S::UnderReview), (V::Reject, S::Rejected), (V::Reset, S::Draft)],
        ),
        (
            S::UnderReview,
            &[(V::Approve, S::Approved), (V::Reject, S::Rejected), (V::Reset, S::Draft)],
        ),
        (
            S::Approved,
            &[(V::Authorize, S::Authorized), (V::Reject, S::Rejected), (V::Reset, S::Draft)],
        ),
        (S::Authorized, &[(V::Post, S::Posted), (V::Reset, S::Draft)]),
        (S::Posted, &[]),
        (S::Rejected, &[(V::Reset, S::Draft)]),
    ];

    for (from, edges) in guarded {
        for verb in VoucherVerb::ALL {
            let got = voucher_transition(from, verb, true);
            match edges.iter().find(|(v, _)| *v == verb) {
                Some((_, to)) => assert_eq!(got.unwrap(), *to, "{} --{}-->", from, verb),
                None => {
                    let want = if verb == V::Post {
                        ErrorKind::NotAuthorized
                    } else {
                        ErrorKind::IllegalTransition
                    };
                    assert_eq!(got.unwrap_err().kind(), want, "{} --{}-->", from, verb);
                }
            }
        }
        let permitted: Vec<V> = edges.iter().map(|(v, _)| *v).collect();
        assert_eq!(permitted_voucher_verbs(from, true), permitted, "{}", from);
    }

    // Without the approval requirement only approved gains an edge.
    for from in VoucherState::ALL {
        let mut expected = permitted_voucher_verbs(from, true);
        if from == S::Approved {
            expected = vec![V::Authorize, V::Post, V::Reject, V::Reset];
        }
        assert_eq!(permitted_voucher_verbs(from, false), expected, "{}", from);
    }
    assert_eq!(
        voucher_transition(S::Submitted, V::Post, false).unwrap_err().kind(),
        ErrorKind::IllegalTransition
    );
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_racing_posters_reach_journal_once() {
    let harness = TestHarness::new();
    let settings = settings(Money::from_major(100));
    let submitter = clerk("u-submit", Capability::PaymentSubmit);
    let reviewer = clerk("u-review", Capability::PaymentReview);
    let approver = clerk("u-approve", Capability::PaymentApprove);
    let authorizer = clerk("u-authorize", Capability::PaymentAuthorize);
    let poster = clerk("u-post", Capability::PaymentPost);

    let as_submitter = VoucherWorkflow::new(&harness.ports, &submitter, &settings);
    let id = as_submitter
        .create(new_voucher(VoucherKind::Payment, Money::from_major(500)))
        .unwrap()
        .id()
        .to_string();
    as_submitter.submit(&id).unwrap();
    VoucherWorkflow::new(&harness.ports, &reviewer, &settings).review(&id, sig("r")).unwrap();
    VoucherWorkflow::new(&harness.ports, &approver, &settings).approve(&id, sig("a")).unwrap();
    VoucherWorkflow::new(&harness.ports, &authorizer, &settings)
        .authorize(&id, sig("z"))
        .unwrap();

    // Both posters load the authorized voucher before either commits.
    let racing = Ports {
        clock: Arc::new(RendezvousClock::new(2)),
        ..harness.ports.clone()
    };
    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let racing = &racing;
                let poster = &poster;
                let settings = &settings;
                let id = &id;
                scope.spawn(move || VoucherWorkflow::new(racing, poster, settings).post(id))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let posted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(posted, 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::Conflict);
    assert_eq!(harness.journal.posted(), vec![id.clone()]);

    // Retrying the loser finds the voucher already posted.
    let as_poster = VoucherWorkflow::new(&harness.ports, &poster, &settings);
    assert_eq!(as_poster.post(&id).unwrap_err().kind(), ErrorKind::NotAuthorized);
    assert_eq!(harness.journal.posted().len(), 1);
    let kinds = harness.notifier.kinds();
    assert_eq!(kinds.iter().filter(|k| *k == "voucher.posted").count(), 1);
}
