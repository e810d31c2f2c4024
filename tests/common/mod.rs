//! Shared fixtures for integration tests: a throwaway database pool and
//! a notifier that records every outbound message instead of sending it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use edirpay::core::AppConfig;
use edirpay::payments::PaymentStatus;
use edirpay::payments::pending::PendingPayments;
use edirpay::payments::report::{PaymentReport, ValidatedReport};
use edirpay::payments::tier::TierThresholds;
use edirpay::storage::{DbPool, create_pool};
use edirpay::telegram::{Notifier, PaymentSummary};

pub const ADMIN_ID: i64 = 1_062_635_928;
pub const MEMBER_ID: i64 = 7_777_001;
pub const GROUP_ID: i64 = -1_001_234_567;

/// Everything the payment workflow needs, wired against a temp database.
pub struct TestBed {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub pending: PendingPayments,
    pub notifier: RecordingNotifier,
    _dir: TempDir,
}

pub fn test_bed() -> TestBed {
    let dir = TempDir::new().expect("create temp dir");
    let db_path = dir.path().join("edir_test.sqlite");
    let db_path = db_path.to_str().expect("utf-8 temp path").to_string();
    let pool = create_pool(&db_path).expect("create pool");

    let config = Arc::new(AppConfig {
        admin_ids: vec![ADMIN_ID],
        group_chat_id: Some(GROUP_ID),
        mini_app_url: None,
        database_path: db_path,
        health_port: 0,
        backup_interval_hours: 12,
        tiers: TierThresholds::default(),
    });

    TestBed {
        pool,
        config,
        pending: PendingPayments::new(),
        notifier: RecordingNotifier::with_group_message(4242),
        _dir: dir,
    }
}

/// A validated monthly-fee report, the common case in these tests.
pub fn monthly_report(gateway: &str, amount: f64, penalty: f64) -> ValidatedReport {
    PaymentReport {
        gateway: gateway.to_string(),
        purpose: "Monthly Fee".to_string(),
        period: Some("2026-08".to_string()),
        amount,
        penalty: Some(penalty),
        total_amount: Some(amount + penalty),
        pay_for: None,
        guarantors: None,
        tx_ref: None,
    }
    .validate()
    .expect("valid report")
}

/// One recorded outbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Admins {
        payment_id: i64,
        attachment: Option<String>,
    },
    Submitter {
        user_id: i64,
        text: String,
    },
    GroupAnnouncement {
        payment_id: i64,
        status: PaymentStatus,
    },
    GroupEdit {
        group_msg_id: i64,
        status: PaymentStatus,
    },
    TierUp {
        name: String,
        tier: String,
    },
}

/// Notifier that records calls instead of talking to Telegram.
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    group_msg_id: Option<i64>,
}

impl RecordingNotifier {
    pub fn with_group_message(group_msg_id: i64) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            group_msg_id: Some(group_msg_id),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("notifier lock").clone()
    }

    pub fn submitter_texts(&self, user_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Submitter { user_id: uid, text } if uid == user_id => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, entry: Sent) {
        self.sent.lock().expect("notifier lock").push(entry);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_admins(&self, summary: &PaymentSummary, attachment: Option<&str>) {
        self.record(Sent::Admins {
            payment_id: summary.payment_id,
            attachment: attachment.map(str::to_string),
        });
    }

    async fn notify_submitter(&self, user_id: i64, text: &str) {
        self.record(Sent::Submitter {
            user_id,
            text: text.to_string(),
        });
    }

    async fn announce_to_group(&self, summary: &PaymentSummary) -> Option<i64> {
        self.record(Sent::GroupAnnouncement {
            payment_id: summary.payment_id,
            status: summary.status,
        });
        self.group_msg_id
    }

    async fn edit_group_announcement(&self, group_msg_id: i64, summary: &PaymentSummary) {
        self.record(Sent::GroupEdit {
            group_msg_id,
            status: summary.status,
        });
    }

    async fn announce_tier_up(&self, submitter_name: &str, tier_label: &str) {
        self.record(Sent::TierUp {
            name: submitter_name.to_string(),
            tier: tier_label.to_string(),
        });
    }
}
