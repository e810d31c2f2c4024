//! Approval engine
//!
//! Turns an admin's inline-button press into a guarded state transition
//! plus its side effects. Decisions arrive as callback tokens, get parsed
//! into a [`DecisionEvent`], and flow through [`apply_decision`], the one
//! place a payment record can reach a terminal state.
//!
//! Ordering is persist-first, notify-second: the database transition
//! commits before any message goes out, and notification failures never
//! undo it.

use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::error::AppResult;
use crate::payments::PaymentStatus;
use crate::payments::tier::Tier;
use crate::storage::db::{self, DbPool};
use crate::telegram::markdown::{escape_amount, escape_markdown_v2};
use crate::telegram::notifications::{Notifier, PaymentSummary};

/// What the admin pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionAction {
    Approve,
    Reject,
}

impl DecisionAction {
    fn as_str(self) -> &'static str {
        match self {
            DecisionAction::Approve => "approve",
            DecisionAction::Reject => "reject",
        }
    }

    fn verdict(self) -> PaymentStatus {
        match self {
            DecisionAction::Approve => PaymentStatus::Approved,
            DecisionAction::Reject => PaymentStatus::Rejected,
        }
    }
}

/// A single inbound decision, independent of any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionEvent {
    pub action: DecisionAction,
    pub payment_id: i64,
    /// Who pressed the button; checked against the admin set.
    pub actor_id: i64,
    /// Submitter id embedded in the token, cross-checked against the
    /// record as defense in depth.
    pub submitter_id: Option<i64>,
}

/// Callback token format: `pay:<action>:<payment_id>:<submitter_id>`.
/// The payment id makes tokens collision-free per record.
pub fn encode_callback(action: DecisionAction, payment_id: i64, submitter_id: i64) -> String {
    format!("pay:{}:{payment_id}:{submitter_id}", action.as_str())
}

/// Parse a callback token back into its parts. Returns `None` for
/// anything that is not a well-formed decision token.
pub fn parse_callback(data: &str) -> Option<(DecisionAction, i64, Option<i64>)> {
    let mut parts = data.split(':');
    if parts.next() != Some("pay") {
        return None;
    }
    let action = match parts.next()? {
        "approve" => DecisionAction::Approve,
        "reject" => DecisionAction::Reject,
        _ => return None,
    };
    let payment_id = parts.next()?.parse::<i64>().ok()?;
    let submitter_id = match parts.next() {
        Some(raw) => Some(raw.parse::<i64>().ok()?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((action, payment_id, submitter_id))
}

/// Result of applying a decision. Everything except the first two
/// variants is a locally recovered no-op.
#[derive(Debug)]
pub enum DecisionOutcome {
    /// Transition applied; savings credited and tier recomputed.
    Approved {
        summary: PaymentSummary,
        tier: Tier,
        tier_raised: bool,
        decided_by: i64,
    },
    /// Transition applied; no monetary side effects.
    Rejected { summary: PaymentSummary, decided_by: i64 },
    /// The record is already terminal (duplicate or stale callback).
    AlreadyDecided,
    /// Unknown payment id, or the token's submitter cross-check failed.
    NotFound,
    /// The actor is not in the admin set. No state change.
    Unauthorized,
}

/// Apply an admin decision to a payment record.
///
/// The status guard and the mutation run as one atomic unit in
/// [`db::decide_payment`]; two admins racing on the same record produce
/// exactly one effective transition and one `AlreadyDecided`.
pub async fn apply_decision(
    pool: &DbPool,
    config: &Arc<AppConfig>,
    notifier: &dyn Notifier,
    event: DecisionEvent,
) -> AppResult<DecisionOutcome> {
    if !config.is_admin(event.actor_id) {
        log::warn!(
            "Unauthorized decision attempt by {} on payment {}",
            event.actor_id,
            event.payment_id
        );
        return Ok(DecisionOutcome::Unauthorized);
    }

    let mut conn = db::get_connection(pool)?;

    let Some(record) = db::get_payment(&conn, event.payment_id)? else {
        return Ok(DecisionOutcome::NotFound);
    };
    if let Some(expected) = event.submitter_id {
        if expected != record.user_id {
            log::warn!(
                "Submitter cross-check failed on payment {}: token says {}, record says {}",
                record.id,
                expected,
                record.user_id
            );
            return Ok(DecisionOutcome::NotFound);
        }
    }

    let Some(applied) = db::decide_payment(
        &mut conn,
        event.payment_id,
        event.action.verdict(),
        event.actor_id,
        &config.tiers,
    )?
    else {
        return Ok(DecisionOutcome::AlreadyDecided);
    };

    let submitter_name = db::get_member(&conn, applied.payment.user_id)?
        .map(|m| m.display_name())
        .unwrap_or_else(|| applied.payment.user_id.to_string());
    let summary = PaymentSummary::from_record(&applied.payment, submitter_name);

    // State is committed; everything from here on is best-effort.
    match event.action {
        DecisionAction::Approve => {
            let tier = applied.new_tier.unwrap_or(Tier::Basic);
            notifier
                .notify_submitter(summary.submitter_id, &approved_text(&summary, tier))
                .await;
            if let Some(group_msg_id) = applied.payment.group_msg_id {
                notifier.edit_group_announcement(group_msg_id, &summary).await;
            }
            if applied.tier_raised {
                notifier.announce_tier_up(&summary.submitter_name, tier.label()).await;
            }
            Ok(DecisionOutcome::Approved {
                summary,
                tier,
                tier_raised: applied.tier_raised,
                decided_by: event.actor_id,
            })
        }
        DecisionAction::Reject => {
            notifier
                .notify_submitter(summary.submitter_id, &rejected_text(&summary))
                .await;
            if let Some(group_msg_id) = applied.payment.group_msg_id {
                notifier.edit_group_announcement(group_msg_id, &summary).await;
            }
            Ok(DecisionOutcome::Rejected {
                summary,
                decided_by: event.actor_id,
            })
        }
    }
}

fn approved_text(summary: &PaymentSummary, tier: Tier) -> String {
    format!(
        "✅ *Payment approved\\!*\n\
         Ref: {tx_ref}\n\
         Your payment of {total} birr has been verified and added to your savings\\. Thank you\\!\n\
         🏅 Current tier: {tier}",
        tx_ref = escape_markdown_v2(&summary.tx_ref),
        total = escape_amount(summary.total_amount),
        tier = escape_markdown_v2(tier.label()),
    )
}

fn rejected_text(summary: &PaymentSummary) -> String {
    format!(
        "❌ *Payment rejected*\n\
         Ref: {tx_ref}\n\
         The receipt could not be verified\\. Please check the details and submit the form again\\.",
        tx_ref = escape_markdown_v2(&summary.tx_ref),
    )
}
