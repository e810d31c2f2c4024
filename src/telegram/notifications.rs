//! Outbound notification fan-out.
//!
//! The payment workflow talks to Telegram only through the [`Notifier`]
//! trait, so intake and approval stay unit testable without a transport.
//! Every method is best-effort: a failed delivery is logged and
//! swallowed, never escalated, and never rolls back a state transition
//! that already committed.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode};

use crate::core::AppConfig;
use crate::payments::PaymentStatus;
use crate::payments::approval::{DecisionAction, encode_callback};
use crate::storage::db::PaymentRecord;
use crate::telegram::markdown::{escape_amount, escape_markdown_v2};

/// Human-readable view of a payment record, as far as notifications need
/// one.
#[derive(Debug, Clone)]
pub struct PaymentSummary {
    pub payment_id: i64,
    pub tx_ref: String,
    pub submitter_id: i64,
    pub submitter_name: String,
    pub purpose: String,
    pub period: Option<String>,
    pub amount: f64,
    pub penalty: f64,
    pub total_amount: f64,
    pub guarantors: Vec<String>,
    pub status: PaymentStatus,
}

impl PaymentSummary {
    pub fn from_record(record: &PaymentRecord, submitter_name: String) -> Self {
        Self {
            payment_id: record.id,
            tx_ref: record.tx_ref.clone(),
            submitter_id: record.user_id,
            submitter_name,
            purpose: record.purpose.clone(),
            period: record.period.clone(),
            amount: record.amount,
            penalty: record.penalty,
            total_amount: record.total_amount,
            guarantors: record.guarantors.clone(),
            status: record.status,
        }
    }

    fn status_line(&self) -> &'static str {
        match self.status {
            PaymentStatus::AwaitingAttachment => "📷 Awaiting receipt",
            PaymentStatus::AwaitApproval => "⏳ Pending review",
            PaymentStatus::Approved => "✅ Approved",
            PaymentStatus::Rejected => "❌ Rejected",
        }
    }
}

/// Group report card, edited in place when the status changes.
pub fn format_report_card(summary: &PaymentSummary) -> String {
    let penalty = if summary.penalty > 0.0 {
        format!("{} birr", escape_amount(summary.penalty))
    } else {
        "none".to_string()
    };
    let mut card = format!(
        "📋 *Payment report {tx_ref}*\n\
         👤 *Member:* {name}\n\
         🎯 *Purpose:* {purpose}\n\
         📅 *Period:* {period}\n\
         💰 *Amount:* {total} birr\n\
         ⚠️ *Penalty:* {penalty}",
        tx_ref = escape_markdown_v2(&summary.tx_ref),
        name = escape_markdown_v2(&summary.submitter_name),
        purpose = escape_markdown_v2(&summary.purpose),
        period = escape_markdown_v2(summary.period.as_deref().unwrap_or("n/a")),
        total = escape_amount(summary.total_amount),
        penalty = penalty,
    );
    if !summary.guarantors.is_empty() {
        card.push_str(&format!(
            "\n🤝 *Guarantors:* {}",
            escape_markdown_v2(&summary.guarantors.join(", ")),
        ));
    }
    card.push_str(&format!("\n🏁 *Status:* {}", summary.status_line()));
    card
}

/// Caption shown to admins next to the approve/reject controls.
fn format_admin_caption(summary: &PaymentSummary) -> String {
    format!(
        "🚨 *New payment report*\n\
         🆔 {tx_ref}\n\
         👤 {name}\n\
         💰 {total} birr\n\
         🎯 {purpose}",
        tx_ref = escape_markdown_v2(&summary.tx_ref),
        name = escape_markdown_v2(&summary.submitter_name),
        total = escape_amount(summary.total_amount),
        purpose = escape_markdown_v2(&summary.purpose),
    )
}

/// Inline approve/reject controls sent with every admin notification.
pub fn decision_keyboard(payment_id: i64, submitter_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Approve", encode_callback(DecisionAction::Approve, payment_id, submitter_id)),
        InlineKeyboardButton::callback("❌ Reject", encode_callback(DecisionAction::Reject, payment_id, submitter_id)),
    ]])
}

/// Fan-out contract the payment workflow depends on.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the payment (with receipt photo, if any) and decision
    /// controls to every configured admin.
    async fn notify_admins(&self, summary: &PaymentSummary, attachment: Option<&str>);

    /// Tell the submitter something. Fails silently if they blocked
    /// the bot.
    async fn notify_submitter(&self, user_id: i64, text: &str);

    /// Post the report card to the shared group, returning the message
    /// id for later in-place edits. `None` when no group is configured
    /// or the send failed.
    async fn announce_to_group(&self, summary: &PaymentSummary) -> Option<i64>;

    /// Rewrite a previous group announcement to reflect the new status.
    /// Editing a deleted or unknown message must not fail the workflow.
    async fn edit_group_announcement(&self, group_msg_id: i64, summary: &PaymentSummary);

    /// Celebrate a tier promotion in the shared group.
    async fn announce_tier_up(&self, submitter_name: &str, tier_label: &str);
}

/// Production notifier backed by the Telegram Bot API.
pub struct TelegramNotifier {
    bot: Bot,
    config: Arc<AppConfig>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, config: Arc<AppConfig>) -> Self {
        Self { bot, config }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_admins(&self, summary: &PaymentSummary, attachment: Option<&str>) {
        let caption = format_admin_caption(summary);
        let keyboard = decision_keyboard(summary.payment_id, summary.submitter_id);

        for &admin_id in &self.config.admin_ids {
            let chat_id = ChatId(admin_id);
            let result = match attachment {
                Some(file_id) => self
                    .bot
                    .send_photo(chat_id, InputFile::file_id(FileId(file_id.to_string())))
                    .caption(caption.clone())
                    .parse_mode(ParseMode::MarkdownV2)
                    .reply_markup(keyboard.clone())
                    .await
                    .map(|_| ()),
                None => self
                    .bot
                    .send_message(chat_id, caption.clone())
                    .parse_mode(ParseMode::MarkdownV2)
                    .reply_markup(keyboard.clone())
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = result {
                log::error!("Admin notification failed for {}: {}", admin_id, e);
            }
        }
    }

    async fn notify_submitter(&self, user_id: i64, text: &str) {
        if let Err(e) = self
            .bot
            .send_message(ChatId(user_id), text)
            .parse_mode(ParseMode::MarkdownV2)
            .await
        {
            log::warn!("Submitter notification failed for {}: {}", user_id, e);
        }
    }

    async fn announce_to_group(&self, summary: &PaymentSummary) -> Option<i64> {
        let group_id = self.config.group_chat_id?;
        match self
            .bot
            .send_message(ChatId(group_id), format_report_card(summary))
            .parse_mode(ParseMode::MarkdownV2)
            .await
        {
            Ok(msg) => Some(i64::from(msg.id.0)),
            Err(e) => {
                log::warn!("Group announcement failed for {}: {}", summary.tx_ref, e);
                None
            }
        }
    }

    async fn edit_group_announcement(&self, group_msg_id: i64, summary: &PaymentSummary) {
        let Some(group_id) = self.config.group_chat_id else {
            return;
        };
        let Ok(msg_id) = i32::try_from(group_msg_id) else {
            return;
        };
        if let Err(e) = self
            .bot
            .edit_message_text(ChatId(group_id), teloxide::types::MessageId(msg_id), format_report_card(summary))
            .parse_mode(ParseMode::MarkdownV2)
            .await
        {
            // The announcement may have been deleted; that is fine.
            log::warn!("Group edit failed for {}: {}", summary.tx_ref, e);
        }
    }

    async fn announce_tier_up(&self, submitter_name: &str, tier_label: &str) {
        let Some(group_id) = self.config.group_chat_id else {
            return;
        };
        let text = format!(
            "🌟 *Tier promotion\\!*\nMember {} has reached the *{}* tier\\. 🎉",
            escape_markdown_v2(submitter_name),
            escape_markdown_v2(tier_label),
        );
        if let Err(e) = self
            .bot
            .send_message(ChatId(group_id), text)
            .parse_mode(ParseMode::MarkdownV2)
            .await
        {
            log::warn!("Tier-up announcement failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn summary(status: PaymentStatus) -> PaymentSummary {
        PaymentSummary {
            payment_id: 9,
            tx_ref: "#EUDE7412".to_string(),
            submitter_id: 7,
            submitter_name: "@abebe".to_string(),
            purpose: "Monthly Fee".to_string(),
            period: Some("2026-08".to_string()),
            amount: 500.0,
            penalty: 25.0,
            total_amount: 525.0,
            guarantors: vec![],
            status,
        }
    }

    #[test]
    fn report_card_reflects_status() {
        let pending = format_report_card(&summary(PaymentStatus::AwaitApproval));
        assert!(pending.contains("⏳ Pending review"));
        assert!(pending.contains("\\#EUDE7412"));
        assert!(pending.contains("525 birr"));

        let approved = format_report_card(&summary(PaymentStatus::Approved));
        assert!(approved.contains("✅ Approved"));
    }

    #[test]
    fn report_card_lists_guarantors_when_present() {
        let mut s = summary(PaymentStatus::AwaitApproval);
        assert!(!format_report_card(&s).contains("Guarantors"));

        s.guarantors = vec!["@kebede".to_string(), "@almaz".to_string()];
        let card = format_report_card(&s);
        assert!(card.contains("🤝 *Guarantors:* @kebede, @almaz"));
    }

    #[test]
    fn admin_caption_escapes_dynamic_fields() {
        let mut s = summary(PaymentStatus::AwaitApproval);
        s.purpose = "fee (august)".to_string();
        let caption = format_admin_caption(&s);
        assert!(caption.contains("fee \\(august\\)"));
        assert_eq!(caption.matches("birr").count(), 1);
    }
}
