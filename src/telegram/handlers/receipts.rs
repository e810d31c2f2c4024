//! Receipt upload handler.
//!
//! A photo or document from a member only means something if they have a
//! pending submission; stray uploads are turned away without creating
//! anything.

use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{HandlerDeps, HandlerError, submitter_from_message};
use crate::payments::intake::{self, AttachOutcome};

/// Largest photo size, or the document itself.
pub(super) fn extract_file_id(msg: &Message) -> Option<String> {
    msg.photo()
        .and_then(|sizes| sizes.last())
        .map(|p| p.file.id.0.clone())
        .or_else(|| msg.document().map(|d| d.file.id.0.clone()))
}

pub(super) async fn handle_receipt_upload(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(file_id) = extract_file_id(msg) else {
        return Ok(());
    };

    let submitter = submitter_from_message(msg);
    let outcome = intake::attach_receipt(
        &deps.db_pool,
        &deps.pending,
        deps.notifier.as_ref(),
        &submitter,
        &file_id,
    )
    .await?;

    let reply = match outcome {
        AttachOutcome::Bound { tx_ref, .. } => {
            format!("📩 Receipt received (ref: {tx_ref}). You'll get a message once it is reviewed. Thank you!")
        }
        AttachOutcome::NoPending => "❌ Please submit the payment form first, then send the receipt.".to_string(),
    };
    bot.send_message(msg.chat.id, reply).await?;

    Ok(())
}
