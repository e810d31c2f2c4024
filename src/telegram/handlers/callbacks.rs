//! Decision callback handler.
//!
//! Parses the approve/reject token, hands it to the approval engine, and
//! reflects the outcome back onto the admin's message so concurrent
//! admins never act on a stale control.

use teloxide::prelude::*;

use super::types::{HandlerDeps, HandlerError};
use crate::payments::approval::{self, DecisionEvent, DecisionOutcome};

pub(super) async fn handle_decision_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some((action, payment_id, submitter_id)) = approval::parse_callback(data) else {
        // Not a decision token; some other keyboard.
        return Ok(());
    };

    let event = DecisionEvent {
        action,
        payment_id,
        actor_id: q.from.id.0 as i64,
        submitter_id,
    };
    let outcome = approval::apply_decision(&deps.db_pool, &deps.config, deps.notifier.as_ref(), event).await?;

    let ack = match &outcome {
        DecisionOutcome::Approved { .. } | DecisionOutcome::Rejected { .. } => "Done",
        DecisionOutcome::AlreadyDecided => "Already processed.",
        DecisionOutcome::NotFound => "Unknown payment.",
        DecisionOutcome::Unauthorized => "You are not authorized to do this.",
    };
    if let Err(e) = bot.answer_callback_query(q.id.clone()).text(ack).await {
        log::warn!("Failed to answer callback query: {}", e);
    }

    // Rewrite the admin-facing message so the buttons disappear and the
    // final outcome is visible.
    let (verdict_line, decided_by) = match &outcome {
        DecisionOutcome::Approved { decided_by, .. } => ("✅ Approved", *decided_by),
        DecisionOutcome::Rejected { decided_by, .. } => ("❌ Rejected", *decided_by),
        _ => return Ok(()),
    };

    let admin_name = q.from.username.as_ref().map(|u| format!("@{u}")).unwrap_or_else(|| q.from.first_name.clone());

    if let Some(message) = q.message.as_ref() {
        let chat_id = message.chat().id;
        let message_id = message.id();
        let original = message
            .regular_message()
            .and_then(|m| m.caption().or_else(|| m.text()))
            .unwrap_or_default();
        let updated = format!("{original}\n\n🏁 Decision: {verdict_line}\n👤 Admin: {admin_name} ({decided_by})");

        let had_caption = message.regular_message().is_some_and(|m| m.caption().is_some());
        let edit = if had_caption {
            bot.edit_message_caption(chat_id, message_id).caption(updated).await.map(|_| ())
        } else {
            bot.edit_message_text(chat_id, message_id, updated).await.map(|_| ())
        };
        if let Err(e) = edit {
            log::warn!("Failed to edit admin message for payment {}: {}", payment_id, e);
        }
    }

    Ok(())
}
