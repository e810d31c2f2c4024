//! Application configuration
//!
//! Everything the bot reads from the environment is collected into one
//! [`AppConfig`] built at startup and passed into handlers through
//! [`crate::telegram::HandlerDeps`]. Handlers never read ambient
//! environment variables.

use std::env;
use std::time::Duration;

use crate::core::error::{AppError, AppResult};
use crate::payments::tier::TierThresholds;

/// Immutable runtime configuration, constructed once in `main`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Telegram user ids allowed to approve/reject payments.
    pub admin_ids: Vec<i64>,
    /// Shared group chat for payment announcements. Announcements are
    /// skipped entirely when unset.
    pub group_chat_id: Option<i64>,
    /// URL of the hosted mini-app form shown on the member keyboard.
    pub mini_app_url: Option<String>,
    /// Path to the SQLite database file.
    pub database_path: String,
    /// Port for the hosting platform's health check server.
    pub health_port: u16,
    /// Interval between automatic database backups, in hours. Zero
    /// disables the scheduler.
    pub backup_interval_hours: u64,
    /// Tier thresholds applied by the tier calculator.
    pub tiers: TierThresholds,
}

impl AppConfig {
    /// Build the configuration from environment variables.
    ///
    /// `ADMIN_IDS` is required (comma-separated Telegram user ids);
    /// everything else has a sensible default. `BOT_TOKEN` is read
    /// directly by teloxide and deliberately not duplicated here.
    pub fn from_env() -> AppResult<Self> {
        let admin_ids = parse_id_list(&env::var("ADMIN_IDS").unwrap_or_default());
        if admin_ids.is_empty() {
            return Err(AppError::Config(
                "ADMIN_IDS is not set; at least one admin id is required".to_string(),
            ));
        }

        let group_chat_id = parse_group_chat_id(env::var("GROUP_CHAT_ID").ok().as_deref())?;

        let health_port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("Invalid PORT value: {raw}")))?,
            Err(_) => 3000,
        };

        let backup_interval_hours = env::var("BACKUP_INTERVAL_HOURS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(12);

        Ok(Self {
            admin_ids,
            group_chat_id,
            mini_app_url: env::var("MINI_APP_URL").ok().filter(|s| !s.is_empty()),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "edirpay.sqlite".to_string()),
            health_port,
            backup_interval_hours,
            tiers: TierThresholds::from_env(),
        })
    }

    /// Whether the given Telegram user id is an authorized admin.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// The admin that receives database backups (first in the list).
    pub fn backup_admin(&self) -> Option<i64> {
        self.admin_ids.first().copied()
    }

    /// Cadence of the automatic backup task, or `None` when the
    /// scheduler is disabled. A zero duration must never reach
    /// `tokio::time::interval`, which panics on it.
    pub fn backup_period(&self) -> Option<Duration> {
        (self.backup_interval_hours > 0).then(|| Duration::from_secs(self.backup_interval_hours * 60 * 60))
    }
}

fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',').filter_map(|part| part.trim().parse::<i64>().ok()).collect()
}

/// Unset or blank means "no group". A value that is set but does not
/// parse is a configuration mistake, not an implicit opt-out.
fn parse_group_chat_id(raw: Option<&str>) -> AppResult<Option<i64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("Invalid GROUP_CHAT_ID value: {value}"))),
    }
}
