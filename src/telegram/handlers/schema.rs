//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;
use teloxide::utils::command::BotCommands;

use super::callbacks::handle_decision_callback;
use super::commands::{
    handle_approve_member_command, handle_backup_command, handle_pending_command, handle_report_command,
    handle_start_command, handle_status_command, handle_summary_command,
};
use super::receipts::handle_receipt_upload;
use super::types::{HandlerDeps, HandlerError};
use super::webapp::handle_web_app_data;
use crate::telegram::bot::Command;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Returns a handler tree for teloxide's Dispatcher. The same schema is
/// used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_webapp = deps.clone();
    let deps_vetting = deps.clone();
    let deps_commands = deps.clone();
    let deps_receipts = deps.clone();
    let deps_callbacks = deps.clone();

    dptree::entry()
        // Mini-app payloads must be matched before plain messages
        .branch(web_app_handler(deps_webapp))
        // Hidden admin command (not in the Command enum)
        .branch(approve_member_handler(deps_vetting))
        .branch(command_handler(deps_commands))
        .branch(receipt_handler(deps_receipts))
        .branch(callback_handler(deps_callbacks))
}

/// Handler for payment reports arriving from the mini-app form
fn web_app_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.web_app_data().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_web_app_data(&bot, &msg, &deps).await {
                    log::error!("Web-app report handler failed for chat {}: {}", msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, "❌ Something went wrong. Please try again.")
                        .await;
                }
                Ok(())
            }
        })
}

/// Handler for the hidden /approve_member admin command
fn approve_member_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| {
            msg.text()
                .map(|text| text.starts_with("/approve_member"))
                .unwrap_or(false)
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_approve_member_command(&bot, &msg, &deps).await {
                    log::error!("/approve_member handler failed for chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        })
}

/// Handler for bot commands (/start, /status, admin reports)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start => handle_start_command(&bot, &msg, &deps).await?,
                    Command::Help => {
                        bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
                    }
                    Command::Status => handle_status_command(&bot, &msg, &deps).await?,
                    Command::Pending => handle_pending_command(&bot, &msg, &deps).await?,
                    Command::Report => handle_report_command(&bot, &msg, &deps).await?,
                    Command::Summary => handle_summary_command(&bot, &msg, &deps).await?,
                    Command::Backup => handle_backup_command(&bot, &msg, &deps).await?,
                }
                Ok(())
            }
        },
    ))
}

/// Handler for receipt photos and documents sent in private chat
fn receipt_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private() && (msg.photo().is_some() || msg.document().is_some()))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_receipt_upload(&bot, &msg, &deps).await {
                    log::error!("Receipt handler failed for chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        })
}

/// Handler for approve/reject inline keyboard buttons
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = handle_decision_callback(&bot, &q, &deps).await {
                log::error!("Decision callback failed for user {}: {}", q.from.id, e);
            }
            Ok(())
        }
    })
}
