//! Mini-app payload handler.
//!
//! The payment form runs inside Telegram as a web app and delivers its
//! result through `web_app_data`. Malformed payloads get a generic retry
//! prompt and mutate nothing.

use teloxide::prelude::*;

use super::types::{HandlerDeps, HandlerError, submitter_from_message};
use crate::payments::intake::{self, IntakeOutcome};
use crate::payments::report::WebAppPayload;

const RETRY_PROMPT: &str = "❌ Could not process the report. Please open the form and try again.";

pub(super) async fn handle_web_app_data(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(web_app_data) = msg.web_app_data() else {
        return Ok(());
    };

    let payload = match WebAppPayload::parse(&web_app_data.data) {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("Malformed web_app_data from {}: {}", msg.chat.id.0, e);
            bot.send_message(msg.chat.id, RETRY_PROMPT).await?;
            return Ok(());
        }
    };

    let report = match payload {
        WebAppPayload::PaymentReport(report) => report,
        WebAppPayload::Unknown => {
            log::info!("Ignoring unknown web_app_data payload from {}", msg.chat.id.0);
            return Ok(());
        }
    };

    let report = match report.validate() {
        Ok(report) => report,
        Err(reason) => {
            log::warn!("Invalid payment report from {}: {}", msg.chat.id.0, reason);
            bot.send_message(msg.chat.id, RETRY_PROMPT).await?;
            return Ok(());
        }
    };

    let submitter = submitter_from_message(msg);
    let outcome = intake::submit_report(
        &deps.db_pool,
        &deps.pending,
        deps.notifier.as_ref(),
        &submitter,
        report,
    )
    .await?;

    let reply = match outcome {
        IntakeOutcome::AwaitingReceipt { tx_ref, total_amount } => format!(
            "✅ Your payment of {total_amount} birr is recorded (ref: {tx_ref}).\n📷 Now send a photo of the receipt."
        ),
        IntakeOutcome::Registered { tx_ref, .. } => {
            format!("🚀 Payment registered (ref: {tx_ref}) and sent for review. You'll be notified of the decision.")
        }
    };
    bot.send_message(msg.chat.id, reply).await?;

    Ok(())
}
