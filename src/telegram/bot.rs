//! Bot construction, command definitions, and keyboards.

use teloxide::prelude::*;
use teloxide::types::{ButtonRequest, KeyboardButton, KeyboardMarkup, WebAppInfo};
use teloxide::utils::command::BotCommands;
use url::Url;

use crate::core::AppConfig;

/// Bot commands shown in the Telegram command menu.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Edir member commands:")]
pub enum Command {
    #[command(description = "register and show the main menu")]
    Start,
    #[command(description = "show available commands")]
    Help,
    #[command(description = "your savings and current tier")]
    Status,
    #[command(description = "payments awaiting a decision (admins only)")]
    Pending,
    #[command(description = "recent approved payments (admins only)")]
    Report,
    #[command(description = "overall collection summary (admins only)")]
    Summary,
    #[command(description = "send a database backup (admins only)")]
    Backup,
}

/// Create the bot from `BOT_TOKEN`, falling back to teloxide's
/// default `TELOXIDE_TOKEN` variable.
pub fn create_bot() -> Bot {
    match std::env::var("BOT_TOKEN") {
        Ok(token) => Bot::new(token),
        Err(_) => Bot::from_env(),
    }
}

/// Reply keyboard shown to members: a web-app button opening the
/// payment report form, when a mini-app URL is configured.
pub fn member_keyboard(config: &AppConfig) -> Option<KeyboardMarkup> {
    let url = config.mini_app_url.as_deref()?;
    let url = match Url::parse(url) {
        Ok(url) => url,
        Err(e) => {
            log::warn!("Invalid MINI_APP_URL {url:?}: {e}");
            return None;
        }
    };

    let button = KeyboardButton::new("📱 Submit a payment report").request(ButtonRequest::WebApp(WebAppInfo { url }));
    Some(KeyboardMarkup::new(vec![vec![button]]).resize_keyboard())
}
