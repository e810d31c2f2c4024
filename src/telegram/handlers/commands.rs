//! Command handler implementations (/start, /status, admin reports).

use teloxide::prelude::*;
use teloxide::types::{InputFile, Message};

use super::types::{HandlerDeps, HandlerError, submitter_from_message};
use crate::storage::db::{self, MemberStatus, ReportRow};
use crate::storage::{backup, get_connection};
use crate::telegram::bot::member_keyboard;

pub(super) async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let submitter = submitter_from_message(msg);
    {
        let conn = get_connection(&deps.db_pool)?;
        db::upsert_member(
            &conn,
            submitter.user_id,
            submitter.username.as_deref(),
            submitter.first_name.as_deref(),
        )?;
    }

    let first_name = msg.from.as_ref().map(|u| u.first_name.as_str()).unwrap_or("there");
    let mut welcome = format!(
        "Hi {first_name}! 👋\nWelcome to the edir savings bot.\n\n\
         Use the button below to submit a payment report. Manual payments need a receipt photo afterwards."
    );
    if deps.config.is_admin(submitter.user_id) {
        welcome.push_str("\n\n⚙️ Admin commands: /pending, /report, /summary, /backup");
    }

    let mut request = bot.send_message(msg.chat.id, welcome);
    if let Some(keyboard) = member_keyboard(&deps.config) {
        request = request.reply_markup(keyboard);
    }
    request.await?;

    Ok(())
}

pub(super) async fn handle_status_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let submitter = submitter_from_message(msg);
    let conn = get_connection(&deps.db_pool)?;

    let Some(member) = db::get_member(&conn, submitter.user_id)? else {
        bot.send_message(msg.chat.id, "You are not registered yet. Send /start first.")
            .await?;
        return Ok(());
    };
    let history = db::approved_history(&conn, submitter.user_id)?;

    bot.send_message(
        msg.chat.id,
        format!(
            "📊 Your status\n\
             💰 Savings: {:.2} birr\n\
             ✅ Approved payments: {}\n\
             🏅 Tier: {}",
            member.savings,
            history.count,
            member.tier.label(),
        ),
    )
    .await?;

    Ok(())
}

/// Admin gate shared by the reporting commands. Non-admins get a short
/// refusal and nothing else.
async fn require_admin(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<bool, HandlerError> {
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0);
    if deps.config.is_admin(user_id) {
        return Ok(true);
    }
    bot.send_message(msg.chat.id, "You are not allowed to do this.").await?;
    Ok(false)
}

/// Hidden admin command: `/approve_member <user_id>` marks a member as
/// vetted. Member vetting is independent of any payment decision.
pub(super) async fn handle_approve_member_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !require_admin(bot, msg, deps).await? {
        return Ok(());
    }
    let user_id = msg
        .text()
        .and_then(|t| t.strip_prefix("/approve_member"))
        .and_then(|rest| rest.trim().parse::<i64>().ok());
    let Some(user_id) = user_id else {
        bot.send_message(msg.chat.id, "Usage: /approve_member <user_id>").await?;
        return Ok(());
    };

    let conn = get_connection(&deps.db_pool)?;
    let reply = if db::set_member_status(&conn, user_id, MemberStatus::Approved)? {
        format!("✅ Member {user_id} marked as approved.")
    } else {
        format!("No member with id {user_id}.")
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

pub(super) async fn handle_pending_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !require_admin(bot, msg, deps).await? {
        return Ok(());
    }
    let conn = get_connection(&deps.db_pool)?;
    let rows = db::pending_payments(&conn, 50)?;
    if rows.is_empty() {
        bot.send_message(msg.chat.id, "No payments awaiting a decision.").await?;
        return Ok(());
    }
    let text = format!("📑 Awaiting decision ({})\n\n{}", rows.len(), format_rows(&rows));
    bot.send_message(msg.chat.id, clamp(text)).await?;
    Ok(())
}

pub(super) async fn handle_report_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !require_admin(bot, msg, deps).await? {
        return Ok(());
    }
    let conn = get_connection(&deps.db_pool)?;
    let rows = db::approved_payments(&conn, 100)?;
    if rows.is_empty() {
        bot.send_message(msg.chat.id, "No approved payments yet.").await?;
        return Ok(());
    }
    let text = format!("📈 Approved payments (last {})\n\n{}", rows.len(), format_rows(&rows));
    bot.send_message(msg.chat.id, clamp(text)).await?;
    Ok(())
}

pub(super) async fn handle_summary_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !require_admin(bot, msg, deps).await? {
        return Ok(());
    }
    let conn = get_connection(&deps.db_pool)?;
    let summary = db::summary(&conn)?;
    bot.send_message(
        msg.chat.id,
        format!(
            "📊 Overall summary\n\
             👥 Members: {}\n\
             ✅ Approved payments: {}\n\
             💰 Total collected: {:.2} birr",
            summary.member_count, summary.approved_count, summary.approved_total,
        ),
    )
    .await?;
    Ok(())
}

pub(super) async fn handle_backup_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !require_admin(bot, msg, deps).await? {
        return Ok(());
    }
    bot.send_message(msg.chat.id, "⏳ Creating backup...").await?;
    match backup::create_backup(&deps.config.database_path) {
        Ok(path) => {
            bot.send_document(msg.chat.id, InputFile::file(path))
                .caption("💾 Edir database backup. Keep a copy somewhere safe.")
                .await?;
        }
        Err(e) => {
            log::error!("Backup failed: {}", e);
            bot.send_message(msg.chat.id, "Backup failed; see logs.").await?;
        }
    }
    Ok(())
}

fn format_rows(rows: &[ReportRow]) -> String {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            format!(
                "{}. {} {} - {:.2} birr ({})",
                i + 1,
                row.tx_ref,
                row.username.as_deref().map(|u| format!("@{u}")).unwrap_or_default(),
                row.total_amount,
                row.purpose,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Telegram caps messages at 4096 chars; truncate long reports.
fn clamp(text: String) -> String {
    const LIMIT: usize = 4000;
    if text.len() <= LIMIT {
        return text;
    }
    let mut cut = LIMIT;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &text[..cut])
}
