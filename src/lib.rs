//! EdirPay - Telegram bot for an edir community savings association
//!
//! Members report contributions through a Telegram mini-app form, attach
//! receipts for manual payments, and admins approve or reject each report
//! from an inline keyboard. Approved payments credit the member's savings
//! balance and feed the membership tier calculation.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, and the health endpoint
//! - `storage`: Database pool, migrations, and backups
//! - `payments`: Report validation, intake, pending receipts, approval, tiers
//! - `telegram`: Bot handlers and notifications

pub mod core;
pub mod payments;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{AppConfig, AppError, AppResult};
pub use payments::pending::PendingPayments;
pub use storage::{DbConnection, DbPool, create_pool, get_connection};
pub use telegram::{HandlerDeps, Notifier, TelegramNotifier, create_bot, schema};
