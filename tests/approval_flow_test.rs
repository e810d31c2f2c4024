//! End-to-end payment workflow tests against a real SQLite database,
//! with a recording notifier standing in for Telegram.

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use common::{ADMIN_ID, MEMBER_ID, RecordingNotifier, Sent, monthly_report, test_bed};
use edirpay::payments::PaymentStatus;
use edirpay::payments::approval::{DecisionAction, DecisionEvent, DecisionOutcome, apply_decision};
use edirpay::payments::intake::{AttachOutcome, IntakeOutcome, SubmitterInfo, attach_receipt, submit_report};
use edirpay::payments::tier::Tier;
use edirpay::storage::db;
use edirpay::storage::get_connection;

fn member() -> SubmitterInfo {
    SubmitterInfo {
        user_id: MEMBER_ID,
        username: Some("abebe".to_string()),
        first_name: Some("Abebe".to_string()),
    }
}

fn decision(action: DecisionAction, payment_id: i64, actor_id: i64) -> DecisionEvent {
    DecisionEvent {
        action,
        payment_id,
        actor_id,
        submitter_id: Some(MEMBER_ID),
    }
}

#[tokio::test]
async fn manual_payment_survives_submit_attach_approve() {
    let bed = test_bed();

    let outcome = submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("manual", 500.0, 0.0))
        .await
        .unwrap();
    let IntakeOutcome::AwaitingReceipt { tx_ref, total_amount } = outcome else {
        panic!("manual gateway should wait for a receipt, got {outcome:?}");
    };
    assert!(tx_ref.starts_with("#EUDE"));
    assert_eq!(total_amount, 500.0);

    // Nothing durable and nothing outbound until the receipt arrives.
    let conn = get_connection(&bed.pool).unwrap();
    assert!(db::pending_payments(&conn, 10).unwrap().is_empty());
    assert!(bed.notifier.sent().is_empty());

    let outcome = attach_receipt(&bed.pool, &bed.pending, &bed.notifier, &member(), "file-abc")
        .await
        .unwrap();
    let AttachOutcome::Bound { payment_id, .. } = outcome else {
        panic!("receipt should bind to the parked draft, got {outcome:?}");
    };

    let record = db::get_payment(&conn, payment_id).unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::AwaitApproval);
    assert_eq!(record.file_id.as_deref(), Some("file-abc"));
    assert_eq!(record.group_msg_id, Some(4242));

    // Reviewers got the receipt alongside the decision controls.
    assert!(bed.notifier.sent().contains(&Sent::Admins {
        payment_id,
        attachment: Some("file-abc".to_string()),
    }));

    let outcome = apply_decision(
        &bed.pool,
        &bed.config,
        &bed.notifier,
        decision(DecisionAction::Approve, payment_id, ADMIN_ID),
    )
    .await
    .unwrap();
    let DecisionOutcome::Approved { summary, tier, .. } = outcome else {
        panic!("expected approval, got {outcome:?}");
    };
    assert_eq!(summary.status, PaymentStatus::Approved);
    assert_eq!(tier, Tier::Basic);

    let saved = db::get_member(&conn, MEMBER_ID).unwrap().unwrap();
    assert_eq!(saved.savings, 500.0);

    // Group card edited in place, submitter told the good news.
    assert!(bed.notifier.sent().contains(&Sent::GroupEdit {
        group_msg_id: 4242,
        status: PaymentStatus::Approved,
    }));
    let texts = bed.notifier.submitter_texts(MEMBER_ID);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("approved"), "submitter message: {}", texts[0]);
}

#[tokio::test]
async fn rejection_leaves_savings_untouched() {
    let bed = test_bed();

    submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("manual", 500.0, 25.0))
        .await
        .unwrap();
    let AttachOutcome::Bound { payment_id, .. } =
        attach_receipt(&bed.pool, &bed.pending, &bed.notifier, &member(), "file-bad").await.unwrap()
    else {
        panic!("receipt should bind");
    };

    let outcome = apply_decision(
        &bed.pool,
        &bed.config,
        &bed.notifier,
        decision(DecisionAction::Reject, payment_id, ADMIN_ID),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, DecisionOutcome::Rejected { .. }));

    let conn = get_connection(&bed.pool).unwrap();
    let record = db::get_payment(&conn, payment_id).unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Rejected);
    assert_eq!(record.decided_by, Some(ADMIN_ID));

    let saved = db::get_member(&conn, MEMBER_ID).unwrap().unwrap();
    assert_eq!(saved.savings, 0.0);
    assert_eq!(saved.tier, Tier::Basic);

    // The member is invited to resubmit.
    let texts = bed.notifier.submitter_texts(MEMBER_ID);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("rejected"), "submitter message: {}", texts[0]);
}

#[tokio::test]
async fn duplicate_decision_is_a_no_op() {
    let bed = test_bed();

    submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("manual", 300.0, 0.0))
        .await
        .unwrap();
    let AttachOutcome::Bound { payment_id, .. } =
        attach_receipt(&bed.pool, &bed.pending, &bed.notifier, &member(), "file-1").await.unwrap()
    else {
        panic!("receipt should bind");
    };

    let first = apply_decision(
        &bed.pool,
        &bed.config,
        &bed.notifier,
        decision(DecisionAction::Approve, payment_id, ADMIN_ID),
    )
    .await
    .unwrap();
    assert!(matches!(first, DecisionOutcome::Approved { .. }));

    // Second press of the same button, and a late reject for good measure.
    for action in [DecisionAction::Approve, DecisionAction::Reject] {
        let again = apply_decision(&bed.pool, &bed.config, &bed.notifier, decision(action, payment_id, ADMIN_ID))
            .await
            .unwrap();
        assert!(matches!(again, DecisionOutcome::AlreadyDecided), "got {again:?}");
    }

    // Credited exactly once.
    let conn = get_connection(&bed.pool).unwrap();
    let saved = db::get_member(&conn, MEMBER_ID).unwrap().unwrap();
    assert_eq!(saved.savings, 300.0);
    assert_eq!(db::get_payment(&conn, payment_id).unwrap().unwrap().status, PaymentStatus::Approved);
}

#[tokio::test]
async fn non_admin_cannot_decide() {
    let bed = test_bed();

    submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("telebirr", 200.0, 0.0))
        .await
        .unwrap();
    let conn = get_connection(&bed.pool).unwrap();
    let payment_id = db::pending_payments(&conn, 1).unwrap()[0].id;

    let outcome = apply_decision(
        &bed.pool,
        &bed.config,
        &bed.notifier,
        decision(DecisionAction::Approve, payment_id, MEMBER_ID),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, DecisionOutcome::Unauthorized));

    let record = db::get_payment(&conn, payment_id).unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::AwaitApproval);
}

#[tokio::test]
async fn digital_gateway_skips_the_receipt_stage() {
    let bed = test_bed();

    let outcome = submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("telebirr", 450.0, 0.0))
        .await
        .unwrap();
    let IntakeOutcome::Registered { payment_id, .. } = outcome else {
        panic!("digital gateway should register immediately, got {outcome:?}");
    };

    let conn = get_connection(&bed.pool).unwrap();
    let record = db::get_payment(&conn, payment_id).unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::AwaitApproval);
    assert_eq!(record.file_id, None);

    // Admins notified without an attachment.
    assert!(bed.notifier.sent().contains(&Sent::Admins {
        payment_id,
        attachment: None,
    }));
}

#[tokio::test]
async fn stray_upload_without_a_pending_draft_is_refused() {
    let bed = test_bed();

    let outcome = attach_receipt(&bed.pool, &bed.pending, &bed.notifier, &member(), "file-stray")
        .await
        .unwrap();
    assert_eq!(outcome, AttachOutcome::NoPending);

    let conn = get_connection(&bed.pool).unwrap();
    assert!(db::pending_payments(&conn, 10).unwrap().is_empty());
    assert!(bed.notifier.sent().is_empty());
}

#[tokio::test]
async fn new_report_abandons_the_previous_draft() {
    let bed = test_bed();

    submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("manual", 100.0, 0.0))
        .await
        .unwrap();
    submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("manual", 250.0, 0.0))
        .await
        .unwrap();

    // Only the second draft survives; the receipt binds to it.
    let AttachOutcome::Bound { payment_id, .. } =
        attach_receipt(&bed.pool, &bed.pending, &bed.notifier, &member(), "file-2").await.unwrap()
    else {
        panic!("receipt should bind");
    };
    let conn = get_connection(&bed.pool).unwrap();
    let record = db::get_payment(&conn, payment_id).unwrap().unwrap();
    assert_eq!(record.total_amount, 250.0);

    // No second draft to bind to.
    let again = attach_receipt(&bed.pool, &bed.pending, &bed.notifier, &member(), "file-3")
        .await
        .unwrap();
    assert_eq!(again, AttachOutcome::NoPending);
}

#[tokio::test]
async fn fifth_approval_promotes_to_pro_with_a_celebration() {
    let bed = test_bed();

    for i in 0..5 {
        let IntakeOutcome::Registered { payment_id, .. } =
            submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("telebirr", 500.0, 0.0))
                .await
                .unwrap()
        else {
            panic!("digital gateway should register");
        };
        let outcome = apply_decision(
            &bed.pool,
            &bed.config,
            &bed.notifier,
            decision(DecisionAction::Approve, payment_id, ADMIN_ID),
        )
        .await
        .unwrap();

        let DecisionOutcome::Approved { tier, tier_raised, .. } = outcome else {
            panic!("expected approval");
        };
        if i < 4 {
            assert_eq!(tier, Tier::Basic);
            assert!(!tier_raised);
        } else {
            assert_eq!(tier, Tier::Pro);
            assert!(tier_raised);
        }
    }

    let conn = get_connection(&bed.pool).unwrap();
    let saved = db::get_member(&conn, MEMBER_ID).unwrap().unwrap();
    assert_eq!(saved.tier, Tier::Pro);
    assert_eq!(saved.savings, 2500.0);

    let tier_ups: Vec<_> = bed
        .notifier
        .sent()
        .into_iter()
        .filter(|s| matches!(s, Sent::TierUp { .. }))
        .collect();
    assert_eq!(tier_ups, vec![Sent::TierUp {
        name: "@abebe".to_string(),
        tier: "Pro".to_string(),
    }]);
}

#[tokio::test]
async fn twelfth_approval_reaches_elite() {
    let bed = test_bed();

    for _ in 0..12 {
        let IntakeOutcome::Registered { payment_id, .. } =
            submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("telebirr", 100.0, 0.0))
                .await
                .unwrap()
        else {
            panic!("digital gateway should register");
        };
        apply_decision(
            &bed.pool,
            &bed.config,
            &bed.notifier,
            decision(DecisionAction::Approve, payment_id, ADMIN_ID),
        )
        .await
        .unwrap();
    }

    let conn = get_connection(&bed.pool).unwrap();
    let saved = db::get_member(&conn, MEMBER_ID).unwrap().unwrap();
    assert_eq!(saved.tier, Tier::Elite);
    assert_eq!(saved.savings, 1200.0);

    // Basic -> Pro at the 5th, Pro -> Elite at the 12th.
    let tier_ups = bed
        .notifier
        .sent()
        .into_iter()
        .filter(|s| matches!(s, Sent::TierUp { .. }))
        .count();
    assert_eq!(tier_ups, 2);
}

#[tokio::test]
async fn savings_match_the_sum_of_approved_totals() {
    let bed = test_bed();

    let amounts = [500.0, 250.0, 125.5];
    let mut ids = Vec::new();
    for &amount in &amounts {
        let IntakeOutcome::Registered { payment_id, .. } =
            submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("cbebirr", amount, 0.0))
                .await
                .unwrap()
        else {
            panic!("digital gateway should register");
        };
        ids.push(payment_id);
    }

    // Approve the first two, reject the third.
    for &id in &ids[..2] {
        apply_decision(&bed.pool, &bed.config, &bed.notifier, decision(DecisionAction::Approve, id, ADMIN_ID))
            .await
            .unwrap();
    }
    apply_decision(&bed.pool, &bed.config, &bed.notifier, decision(DecisionAction::Reject, ids[2], ADMIN_ID))
        .await
        .unwrap();

    let conn = get_connection(&bed.pool).unwrap();
    let saved = db::get_member(&conn, MEMBER_ID).unwrap().unwrap();
    assert_eq!(saved.savings, 750.0);

    let summary = db::summary(&conn).unwrap();
    assert_eq!(summary.approved_count, 2);
    assert_eq!(summary.approved_total, 750.0);
    assert_eq!(summary.member_count, 1);
}

#[tokio::test]
async fn reviewer_fanout_survives_a_starved_pool() {
    // Single-connection pool with a short checkout timeout. Intake holds
    // the only connection across its fan-out, so recording the group
    // message reference cannot get a second one; the committed record
    // and the reviewer notification must survive anyway.
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("edir_test.sqlite");
    let pool = Pool::builder()
        .max_size(1)
        .connection_timeout(Duration::from_millis(200))
        .build(SqliteConnectionManager::file(&db_path))
        .unwrap();
    {
        let mut conn = pool.get().unwrap();
        edirpay::storage::migrations::run_migrations(&mut conn).unwrap();
    }

    let pending = edirpay::payments::pending::PendingPayments::new();
    let notifier = RecordingNotifier::with_group_message(4242);

    let outcome = submit_report(&pool, &pending, &notifier, &member(), monthly_report("telebirr", 200.0, 0.0))
        .await
        .unwrap();
    let IntakeOutcome::Registered { payment_id, .. } = outcome else {
        panic!("digital gateway should register, got {outcome:?}");
    };

    // Admins still got the review request.
    assert!(notifier.sent().contains(&Sent::Admins {
        payment_id,
        attachment: None,
    }));

    // Only the group-message reference was lost.
    let conn = get_connection(&pool).unwrap();
    let record = db::get_payment(&conn, payment_id).unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::AwaitApproval);
    assert_eq!(record.group_msg_id, None);
}

#[tokio::test]
async fn mismatched_submitter_token_is_rejected() {
    let bed = test_bed();

    submit_report(&bed.pool, &bed.pending, &bed.notifier, &member(), monthly_report("telebirr", 200.0, 0.0))
        .await
        .unwrap();
    let conn = get_connection(&bed.pool).unwrap();
    let payment_id = db::pending_payments(&conn, 1).unwrap()[0].id;

    // Token claims a different submitter than the record holds.
    let outcome = apply_decision(
        &bed.pool,
        &bed.config,
        &bed.notifier,
        DecisionEvent {
            action: DecisionAction::Approve,
            payment_id,
            actor_id: ADMIN_ID,
            submitter_id: Some(MEMBER_ID + 1),
        },
    )
    .await
    .unwrap();
    assert!(matches!(outcome, DecisionOutcome::NotFound));
    assert_eq!(db::get_payment(&conn, payment_id).unwrap().unwrap().status, PaymentStatus::AwaitApproval);
}
