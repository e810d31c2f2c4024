//! Submission intake
//!
//! Accepts validated payment reports, decides whether a receipt must
//! arrive before the record becomes reviewable, and finalizes the record
//! when it does. All writes land before any notification goes out.

use crate::core::error::AppResult;
use crate::payments::PaymentStatus;
use crate::payments::pending::PendingPayments;
use crate::payments::report::ValidatedReport;
use crate::storage::db::{self, DbPool, NewPayment};
use crate::telegram::notifications::{Notifier, PaymentSummary};

/// Identity of the member submitting a report.
#[derive(Debug, Clone)]
pub struct SubmitterInfo {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl SubmitterInfo {
    fn display_name(&self) -> String {
        if let Some(username) = &self.username {
            format!("@{username}")
        } else if let Some(first_name) = &self.first_name {
            first_name.clone()
        } else {
            self.user_id.to_string()
        }
    }
}

/// What happened to a freshly submitted report.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeOutcome {
    /// Manual gateway: the draft is parked and a receipt photo is now
    /// expected from this submitter.
    AwaitingReceipt { tx_ref: String, total_amount: f64 },
    /// Digital gateway: the record is already under review.
    Registered { payment_id: i64, tx_ref: String },
}

/// What happened to an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachOutcome {
    /// The file bound to the submitter's pending draft; the record is
    /// now under review.
    Bound { payment_id: i64, tx_ref: String },
    /// Stray upload: nothing was waiting for a receipt from this user.
    NoPending,
}

/// Take in a validated payment report.
///
/// Manual gateways park a draft in the pending holder (explicitly
/// abandoning any earlier unresolved draft from the same member) and
/// return [`IntakeOutcome::AwaitingReceipt`]. Digital gateways insert
/// the record directly in AWAIT_APPROVAL and notify the reviewers.
pub async fn submit_report(
    pool: &DbPool,
    pending: &PendingPayments,
    notifier: &dyn Notifier,
    submitter: &SubmitterInfo,
    report: ValidatedReport,
) -> AppResult<IntakeOutcome> {
    let conn = db::get_connection(pool)?;
    db::upsert_member(
        &conn,
        submitter.user_id,
        submitter.username.as_deref(),
        submitter.first_name.as_deref(),
    )?;

    if report.gateway.requires_receipt() {
        let tx_ref = report.tx_ref.clone();
        let total_amount = report.total_amount;
        if let Some(abandoned) = pending.park(submitter.user_id, report) {
            log::info!(
                "Member {} abandoned pending submission {} by starting a new one",
                submitter.user_id,
                abandoned.report.tx_ref
            );
        }
        return Ok(IntakeOutcome::AwaitingReceipt { tx_ref, total_amount });
    }

    // Digital gateway: no attachment step, straight to review.
    let payment_id = db::insert_payment(&conn, &new_payment(submitter.user_id, &report, None))?;
    let record = db::get_payment(&conn, payment_id)?
        .ok_or_else(|| anyhow::anyhow!("payment {payment_id} vanished after insert"))?;
    let tx_ref = record.tx_ref.clone();
    let summary = PaymentSummary::from_record(&record, submitter.display_name());

    announce_and_review(pool, notifier, &summary, None).await;

    Ok(IntakeOutcome::Registered { payment_id, tx_ref })
}

/// Bind an uploaded file to the submitter's pending draft.
///
/// The holder's `take` is atomic, so even a burst of photos from the
/// same member finalizes exactly one record; the rest see
/// [`AttachOutcome::NoPending`].
pub async fn attach_receipt(
    pool: &DbPool,
    pending: &PendingPayments,
    notifier: &dyn Notifier,
    submitter: &SubmitterInfo,
    file_id: &str,
) -> AppResult<AttachOutcome> {
    let Some(draft) = pending.take(submitter.user_id) else {
        return Ok(AttachOutcome::NoPending);
    };
    debug_assert!(draft.status().can_transition_to(PaymentStatus::AwaitApproval));

    let conn = db::get_connection(pool)?;
    db::upsert_member(
        &conn,
        submitter.user_id,
        submitter.username.as_deref(),
        submitter.first_name.as_deref(),
    )?;

    let payment_id = db::insert_payment(&conn, &new_payment(submitter.user_id, &draft.report, Some(file_id)))?;
    let record = db::get_payment(&conn, payment_id)?
        .ok_or_else(|| anyhow::anyhow!("payment {payment_id} vanished after insert"))?;
    let tx_ref = record.tx_ref.clone();
    let summary = PaymentSummary::from_record(&record, submitter.display_name());

    announce_and_review(pool, notifier, &summary, Some(file_id)).await;

    Ok(AttachOutcome::Bound { payment_id, tx_ref })
}

fn new_payment(user_id: i64, report: &ValidatedReport, file_id: Option<&str>) -> NewPayment {
    NewPayment {
        tx_ref: report.tx_ref.clone(),
        user_id,
        gateway: report.gateway,
        purpose: report.purpose.clone(),
        period: report.period.clone(),
        amount: report.amount,
        penalty: report.penalty,
        total_amount: report.total_amount,
        pay_for: report.pay_for.clone(),
        guarantors: report.guarantors.clone(),
        file_id: file_id.map(str::to_string),
        status: PaymentStatus::AwaitApproval,
    }
}

/// Group announcement plus reviewer fan-out. Runs strictly after the
/// record committed, so nothing here may fail the operation; a failure
/// only costs the group-message reference or a notification.
async fn announce_and_review(pool: &DbPool, notifier: &dyn Notifier, summary: &PaymentSummary, attachment: Option<&str>) {
    if let Some(group_msg_id) = notifier.announce_to_group(summary).await {
        match db::get_connection(pool) {
            Ok(conn) => {
                if let Err(e) = db::set_group_message(&conn, summary.payment_id, group_msg_id) {
                    log::warn!("Failed to record group message for payment {}: {}", summary.payment_id, e);
                }
            }
            Err(e) => {
                log::warn!("No connection to record group message for payment {}: {}", summary.payment_id, e);
            }
        }
    }
    notifier.notify_admins(summary, attachment).await;
}
