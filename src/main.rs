use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::utils::command::BotCommands;
use tokio::time::interval;

use edirpay::core::{AppConfig, web_server};
use edirpay::payments::pending::PendingPayments;
use edirpay::storage::backup::create_backup;
use edirpay::storage::create_pool;
use edirpay::telegram::bot::Command;
use edirpay::telegram::{HandlerDeps, TelegramNotifier, create_bot, schema};

/// Main entry point for the edir bot.
///
/// # Errors
/// Returns an error if initialization fails (configuration, database, bot
/// token).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    pretty_env_logger::init_timed();

    log::info!("Starting edir bot...");

    let config = Arc::new(AppConfig::from_env()?);
    log::info!(
        "Configured admins: {}, group announcements: {}",
        config.admin_ids.len(),
        if config.group_chat_id.is_some() { "on" } else { "off" },
    );

    let db_pool = Arc::new(create_pool(&config.database_path)?);

    // Health endpoint for the hosting platform
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = web_server::start_health_server(health_port).await {
            log::error!("Health server error: {}", e);
        }
    });

    let bot = create_bot();

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    // Periodic database backup, shipped to the first admin
    match (config.backup_admin(), config.backup_period()) {
        (Some(backup_admin), Some(period)) => {
            let bot_backup = bot.clone();
            let db_path = config.database_path.clone();
            tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.tick().await; // first tick fires immediately, skip it
                loop {
                    ticker.tick().await;
                    match create_backup(&db_path) {
                        Ok(path) => {
                            log::info!("Automatic backup created: {}", path.display());
                            if let Err(e) = bot_backup
                                .send_document(ChatId(backup_admin), InputFile::file(path))
                                .caption("💾 Scheduled edir database backup.")
                                .await
                            {
                                log::error!("Failed to send backup to admin {}: {}", backup_admin, e);
                            }
                        }
                        Err(e) => log::error!("Failed to create automatic backup: {}", e),
                    }
                }
            });
            log::info!("Backup scheduler started (every {} hours)", config.backup_interval_hours);
        }
        (None, _) => log::warn!("No admins configured for backups"),
        (_, None) => log::info!("Backup scheduler disabled (BACKUP_INTERVAL_HOURS=0)"),
    }

    let pending = Arc::new(PendingPayments::new());
    let notifier = Arc::new(TelegramNotifier::new(bot.clone(), Arc::clone(&config)));
    let deps = HandlerDeps::new(db_pool, config, pending, notifier);

    log::info!("Bot is running");

    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
