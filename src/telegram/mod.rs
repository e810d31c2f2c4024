//! Telegram bot integration and handlers

pub mod bot;
pub mod handlers;
pub mod markdown;
pub mod notifications;

// Re-exports for convenience
pub use bot::{Command, create_bot, member_keyboard};
pub use handlers::{HandlerDeps, HandlerError, schema};
pub use notifications::{Notifier, PaymentSummary, TelegramNotifier};
