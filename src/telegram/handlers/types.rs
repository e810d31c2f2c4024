//! Handler types and dependencies.

use std::sync::Arc;

use teloxide::types::Message;

use crate::core::AppConfig;
use crate::payments::intake::SubmitterInfo;
use crate::payments::pending::PendingPayments;
use crate::storage::db::DbPool;
use crate::telegram::notifications::Notifier;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies injected into every handler. Built once in `main`;
/// tests construct their own with a recording notifier.
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub pending: Arc<PendingPayments>,
    pub notifier: Arc<dyn Notifier>,
}

impl HandlerDeps {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: Arc<AppConfig>,
        pending: Arc<PendingPayments>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db_pool,
            config,
            pending,
            notifier,
        }
    }
}

/// Extract the submitting member's identity from a Telegram message.
pub fn submitter_from_message(msg: &Message) -> SubmitterInfo {
    SubmitterInfo {
        user_id: msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(msg.chat.id.0),
        username: msg.from.as_ref().and_then(|u| u.username.clone()),
        first_name: msg.from.as_ref().map(|u| u.first_name.clone()),
    }
}
